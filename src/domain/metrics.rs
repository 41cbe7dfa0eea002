//! Metrics domain types.
//!
//! Snapshot and health shapes reported by the guards; the live
//! counters themselves live in the engine.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Point-in-time view of a guard's counters.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MetricsSnapshot {
    /// Total number of checks evaluated.
    pub total_checks: u64,
    /// Checks that resolved to Pass.
    pub passed_checks: u64,
    /// Checks that resolved to Fail.
    pub failed_checks: u64,
    /// Checks that resolved to Warning.
    pub warning_checks: u64,
    /// Decisions served from the cache.
    pub cache_hits: u64,
    /// Scorer invocations that ended in error.
    pub scorer_failures: u64,
    /// passed / total, 0.0 when no checks have run.
    pub pass_rate: f64,
    /// Mean end-to-end check latency in milliseconds.
    pub average_latency_ms: f64,
}

/// Per-subsystem health report.
///
/// Reported without raising: an unreachable dependency shows up as
/// `false`, never as an error.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct HealthReport {
    /// Whether the scorer dependency is reachable.
    pub classifier: bool,
    /// Whether the decision cache is usable.
    pub cache: bool,
    /// Whether the metrics subsystem is usable.
    pub metrics: bool,
}

impl HealthReport {
    /// True when every subsystem reports healthy.
    pub fn all_healthy(&self) -> bool {
        self.classifier && self.cache && self.metrics
    }
}
