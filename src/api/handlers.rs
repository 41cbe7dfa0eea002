//! HTTP request handlers.

use std::time::{Duration, Instant};

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use uuid::Uuid;

use crate::api::types::{
    AuditRangeQuery, AuditRangeResponse, CheckRequest, CheckResponse, CorrectStatusRequest,
    HealthResponse, ListAuditQuery, ListAuditResponse, LogCheckRequest, LogCheckResponse,
    MetricsResponse,
};
use crate::domain::{CheckOptions, GuardType, SafetyLog, Status};
use crate::engine::Guard;
use crate::error::GuardError;
use crate::AppState;

const MAX_PAGE_SIZE: i64 = 100;

fn check_options(request: &CheckRequest) -> CheckOptions {
    CheckOptions {
        cache_ttl: request.cache_ttl_secs.map(Duration::from_secs),
        threshold_overrides: request.threshold_overrides.clone(),
        generation_id: request.generation_id,
        model_id: request.model_id,
    }
}

/// Evaluate a prompt before generation starts.
#[utoipa::path(
    post,
    path = "/v1/guards/pre/check",
    tag = "guards",
    request_body = CheckRequest,
    responses(
        (status = 200, description = "Check completed", body = CheckResponse),
        (status = 400, description = "Invalid request"),
        (status = 502, description = "Evaluation failed")
    )
)]
pub async fn pre_check(
    State(state): State<AppState>,
    Json(request): Json<CheckRequest>,
) -> Result<Json<CheckResponse>, GuardError> {
    let started = Instant::now();
    let options = check_options(&request);
    let status = state.pre_guard.check(&request.content, &options).await?;

    Ok(Json(CheckResponse {
        guard_type: GuardType::PreGuard,
        status,
        duration_ms: started.elapsed().as_millis() as u64,
    }))
}

/// Evaluate a rendered artifact before it ships.
#[utoipa::path(
    post,
    path = "/v1/guards/post/check",
    tag = "guards",
    request_body = CheckRequest,
    responses(
        (status = 200, description = "Check completed", body = CheckResponse),
        (status = 400, description = "Invalid request"),
        (status = 502, description = "Evaluation failed")
    )
)]
pub async fn post_check(
    State(state): State<AppState>,
    Json(request): Json<CheckRequest>,
) -> Result<Json<CheckResponse>, GuardError> {
    let started = Instant::now();
    let options = check_options(&request);
    let status = state.post_guard.check(&request.content, &options).await?;

    Ok(Json(CheckResponse {
        guard_type: GuardType::PostGuard,
        status,
        duration_ms: started.elapsed().as_millis() as u64,
    }))
}

/// Durably log a completed check for a guard stage.
#[utoipa::path(
    post,
    path = "/v1/guards/{guard}/log",
    tag = "guards",
    params(("guard" = String, Path, description = "Guard stage: pre or post")),
    request_body = LogCheckRequest,
    responses(
        (status = 200, description = "Check logged", body = LogCheckResponse),
        (status = 400, description = "Unknown guard stage"),
        (status = 500, description = "Persistence failed")
    )
)]
pub async fn log_check(
    State(state): State<AppState>,
    Path(guard): Path<String>,
    Json(request): Json<LogCheckRequest>,
) -> Result<Json<LogCheckResponse>, GuardError> {
    let guard_type: GuardType = guard.parse().map_err(GuardError::BadRequest)?;

    let guard: &dyn Guard = match guard_type {
        GuardType::PreGuard => state.pre_guard.as_ref(),
        GuardType::PostGuard => state.post_guard.as_ref(),
    };
    guard
        .log_check(
            request.generation_id,
            request.model_id,
            request.status,
            &request.details,
        )
        .await?;

    Ok(Json(LogCheckResponse {
        check_id: request.details.check_id,
        message: "Check logged".to_string(),
    }))
}

/// List persisted safety logs, newest first.
#[utoipa::path(
    get,
    path = "/v1/audit",
    tag = "audit",
    params(
        ("guard_type" = Option<String>, Query, description = "Filter by guard stage"),
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("limit" = Option<i64>, Query, description = "Page size (max 100)"),
        ("offset" = Option<i64>, Query, description = "Page offset")
    ),
    responses(
        (status = 200, description = "Safety logs", body = ListAuditResponse),
        (status = 400, description = "Invalid filter")
    )
)]
pub async fn list_audit(
    State(state): State<AppState>,
    Query(query): Query<ListAuditQuery>,
) -> Result<Json<ListAuditResponse>, GuardError> {
    let guard_type = query
        .guard_type
        .as_deref()
        .map(str::parse::<GuardType>)
        .transpose()
        .map_err(GuardError::BadRequest)?;
    let status = query
        .status
        .as_deref()
        .map(str::parse::<Status>)
        .transpose()
        .map_err(GuardError::BadRequest)?;

    let limit = query.limit.clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.max(0);

    let logs = state
        .repository
        .list_safety_logs(guard_type, status, limit, offset)
        .await?;

    Ok(Json(ListAuditResponse {
        total: logs.len(),
        logs,
        limit,
        offset,
    }))
}

/// Query the in-memory audit index for both guard stages.
#[utoipa::path(
    get,
    path = "/v1/audit/range",
    tag = "audit",
    params(
        ("start" = String, Query, description = "Inclusive range start, RFC 3339"),
        ("end" = String, Query, description = "Inclusive range end, RFC 3339")
    ),
    responses(
        (status = 200, description = "Audit records in range", body = AuditRangeResponse),
        (status = 400, description = "Invalid range"),
        (status = 503, description = "Audit index unavailable")
    )
)]
pub async fn audit_range(
    State(state): State<AppState>,
    Query(query): Query<AuditRangeQuery>,
) -> Result<Json<AuditRangeResponse>, GuardError> {
    if query.start > query.end {
        return Err(GuardError::BadRequest(
            "range start must not be after range end".to_string(),
        ));
    }

    let mut records = state.pre_metrics.audit_in_range(query.start, query.end)?;
    records.extend(state.post_metrics.audit_in_range(query.start, query.end)?);
    records.sort_by_key(|r| r.timestamp);

    Ok(Json(AuditRangeResponse {
        total: records.len(),
        records,
    }))
}

/// Correct the status of a persisted record after review.
#[utoipa::path(
    patch,
    path = "/v1/audit/{id}/status",
    tag = "audit",
    params(("id" = Uuid, Path, description = "Safety log ID")),
    request_body = CorrectStatusRequest,
    responses(
        (status = 200, description = "Status corrected", body = SafetyLog),
        (status = 400, description = "Transition not permitted"),
        (status = 404, description = "Safety log not found")
    )
)]
pub async fn correct_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<CorrectStatusRequest>,
) -> Result<Json<SafetyLog>, GuardError> {
    let log = state.repository.correct_status(id, request.status).await?;
    Ok(Json(log))
}

/// Metrics snapshots for both guard stages.
#[utoipa::path(
    get,
    path = "/v1/metrics",
    tag = "metrics",
    responses((status = 200, description = "Current metrics", body = MetricsResponse))
)]
pub async fn get_metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        pre_guard: state.pre_metrics.snapshot(),
        post_guard: state.post_metrics.snapshot(),
    })
}

/// Health check endpoint. Reports degraded subsystems, never errors.
#[utoipa::path(
    get,
    path = "/v1/health",
    tag = "health",
    responses((status = 200, description = "Service health", body = HealthResponse))
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = sqlx::query("SELECT 1")
        .fetch_one(state.repository.pool())
        .await
        .is_ok();
    let pre_guard = state.pre_guard.health_check().await;
    let post_guard = state.post_guard.health_check().await;

    let healthy = database && pre_guard.all_healthy() && post_guard.all_healthy();

    Json(HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database,
        pre_guard,
        post_guard,
        timestamp: Utc::now().to_rfc3339(),
    })
}
