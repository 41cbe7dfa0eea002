//! API request and response types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{
    AuditRecord, CheckResult, CheckType, Content, GuardType, HealthReport, MetricsSnapshot,
    SafetyLog, Status,
};

// ==================== Guard checks ====================

/// Request to evaluate content through a guard.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckRequest {
    /// The content to evaluate.
    pub content: Content,
    /// Generation this check belongs to, if known.
    #[serde(default)]
    pub generation_id: Option<Uuid>,
    /// Model that produced (or will produce) the content.
    #[serde(default)]
    pub model_id: Option<Uuid>,
    /// Override the configured cache TTL, in seconds.
    #[serde(default)]
    pub cache_ttl_secs: Option<u64>,
    /// Per-call pass-threshold overrides, each in [0,1]. Recognized
    /// by the pre-guard endpoint only; the post-guard endpoint
    /// rejects them.
    #[serde(default)]
    pub threshold_overrides: BTreeMap<CheckType, f64>,
}

/// Response from a guard check.
#[derive(Debug, Serialize, ToSchema)]
pub struct CheckResponse {
    /// Which guard stage evaluated the content.
    pub guard_type: GuardType,
    /// The tri-state decision.
    pub status: Status,
    /// End-to-end latency of this call in milliseconds.
    pub duration_ms: u64,
}

// ==================== Audit logging ====================

/// Request to durably log a completed check.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LogCheckRequest {
    pub generation_id: Uuid,
    pub model_id: Uuid,
    pub status: Status,
    /// The scorer result backing the decision.
    pub details: CheckResult,
}

/// Response after logging a check.
#[derive(Debug, Serialize, ToSchema)]
pub struct LogCheckResponse {
    pub check_id: Uuid,
    pub message: String,
}

// ==================== Audit queries ====================

/// Query parameters for listing persisted safety logs.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ListAuditQuery {
    /// Filter by guard stage.
    #[serde(default)]
    pub guard_type: Option<String>,
    /// Filter by decision status.
    #[serde(default)]
    pub status: Option<String>,
    /// Maximum number of results.
    #[serde(default = "default_limit")]
    pub limit: i64,
    /// Offset for pagination.
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

/// Response for listing persisted safety logs.
#[derive(Debug, Serialize, ToSchema)]
pub struct ListAuditResponse {
    pub logs: Vec<SafetyLog>,
    pub total: usize,
    pub limit: i64,
    pub offset: i64,
}

/// Query parameters for the in-memory audit range query.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AuditRangeQuery {
    /// Inclusive range start (RFC 3339).
    pub start: chrono::DateTime<chrono::Utc>,
    /// Inclusive range end (RFC 3339).
    pub end: chrono::DateTime<chrono::Utc>,
}

/// Response for the in-memory audit range query.
#[derive(Debug, Serialize, ToSchema)]
pub struct AuditRangeResponse {
    pub records: Vec<AuditRecord>,
    pub total: usize,
}

/// Request to correct the status of a persisted record on review.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CorrectStatusRequest {
    /// The corrected status.
    pub status: Status,
}

// ==================== Metrics ====================

/// Aggregate metrics for both guard stages.
#[derive(Debug, Serialize, ToSchema)]
pub struct MetricsResponse {
    pub pre_guard: MetricsSnapshot,
    pub post_guard: MetricsSnapshot,
}

// ==================== Health ====================

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
    /// Database connectivity.
    pub database: bool,
    /// Pre-guard subsystem health.
    pub pre_guard: HealthReport,
    /// Post-guard subsystem health.
    pub post_guard: HealthReport,
    /// Timestamp.
    pub timestamp: String,
}
