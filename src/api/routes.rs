//! Route definitions for the API.

use axum::{
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::handlers;
use crate::AppState;

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::pre_check,
        handlers::post_check,
        handlers::log_check,
        handlers::list_audit,
        handlers::audit_range,
        handlers::correct_status,
        handlers::get_metrics,
        handlers::health_check,
    ),
    components(schemas(
        crate::api::types::CheckRequest,
        crate::api::types::CheckResponse,
        crate::api::types::LogCheckRequest,
        crate::api::types::LogCheckResponse,
        crate::api::types::ListAuditQuery,
        crate::api::types::ListAuditResponse,
        crate::api::types::AuditRangeQuery,
        crate::api::types::AuditRangeResponse,
        crate::api::types::CorrectStatusRequest,
        crate::api::types::MetricsResponse,
        crate::api::types::HealthResponse,
        crate::domain::Content,
        crate::domain::CheckType,
        crate::domain::GuardType,
        crate::domain::Status,
        crate::domain::CheckResult,
        crate::domain::AuditRecord,
        crate::domain::SafetyLog,
        crate::domain::ProcessingStatus,
        crate::domain::MetricsSnapshot,
        crate::domain::HealthReport,
    )),
    tags(
        (name = "guards", description = "Guard check and logging endpoints"),
        (name = "audit", description = "Audit trail queries and corrections"),
        (name = "metrics", description = "Guard metrics"),
        (name = "health", description = "Health and status endpoints")
    ),
    info(
        title = "Gatekeeper Core API",
        version = "0.1.0",
        description = "Safety guardrail pipeline for generative video - gates prompts and rendered artifacts",
        license(name = "MIT")
    )
)]
pub struct ApiDoc;

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Guard checks
        .route("/v1/guards/pre/check", post(handlers::pre_check))
        .route("/v1/guards/post/check", post(handlers::post_check))
        .route("/v1/guards/:guard/log", post(handlers::log_check))
        // Audit trail
        .route("/v1/audit", get(handlers::list_audit))
        .route("/v1/audit/range", get(handlers::audit_range))
        .route("/v1/audit/:id/status", patch(handlers::correct_status))
        // Metrics and health
        .route("/v1/metrics", get(handlers::get_metrics))
        .route("/v1/health", get(handlers::health_check))
        .with_state(state)
        // OpenAPI docs
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
