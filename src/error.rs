//! Error types for Gatekeeper Core.
//!
//! Defines a unified error type that maps cleanly to HTTP responses.
//! The taxonomy separates failures that must propagate (evaluation,
//! audit persistence) from failures the decision path absorbs
//! (cache, metrics).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Unified error type for guardrail operations.
#[derive(Debug, Error)]
pub enum GuardError {
    /// A scorer could not produce a result. Propagated to the caller;
    /// never converted into a default status (fail-closed).
    #[error("Evaluation failed: {0}")]
    Evaluation(String),

    /// An audit record could not be durably written. Propagated, never
    /// swallowed - audit completeness is a compliance requirement.
    #[error("Audit persistence failed: {0}")]
    Persistence(String),

    /// Cache read/write failed. Logged at the call site and treated as
    /// a miss; must not surface on the decision path.
    #[error("Cache error: {0}")]
    Cache(String),

    /// Metrics recording failed. Logged at the call site; must not
    /// surface on the decision path.
    #[error("Metrics error: {0}")]
    Metrics(String),

    /// Invalid guard configuration (threshold out of [0,1], weights not
    /// summing to 1.0, inverted cutoffs). Raised at construction.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),
}

impl GuardError {
    /// Build an evaluation error from any displayable cause.
    pub fn evaluation(cause: impl std::fmt::Display) -> Self {
        GuardError::Evaluation(cause.to_string())
    }

    /// Build a persistence error from any displayable cause.
    pub fn persistence(cause: impl std::fmt::Display) -> Self {
        GuardError::Persistence(cause.to_string())
    }

    /// Build a cache error from any displayable cause.
    pub fn cache(cause: impl std::fmt::Display) -> Self {
        GuardError::Cache(cause.to_string())
    }
}

/// Error response body for API clients.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for GuardError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            GuardError::Evaluation(msg) => {
                // Log the actual error but don't expose scorer internals
                tracing::error!(error = %msg, "Evaluation error");
                (
                    StatusCode::BAD_GATEWAY,
                    "EVALUATION_ERROR",
                    "Content evaluation could not be completed".to_string(),
                    None,
                )
            }
            GuardError::Persistence(msg) => {
                tracing::error!(error = %msg, "Audit persistence error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "PERSISTENCE_ERROR",
                    "Audit record could not be persisted".to_string(),
                    None,
                )
            }
            GuardError::Cache(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "CACHE_ERROR",
                "Decision cache unavailable".to_string(),
                Some(msg.clone()),
            ),
            GuardError::Metrics(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "METRICS_ERROR",
                "Metrics subsystem unavailable".to_string(),
                Some(msg.clone()),
            ),
            GuardError::Configuration(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIG_ERROR",
                "Configuration error".to_string(),
                Some(msg.clone()),
            ),
            GuardError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone(), None),
            GuardError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone(), None)
            }
        };

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for guardrail operations.
pub type GuardResult<T> = Result<T, GuardError>;
