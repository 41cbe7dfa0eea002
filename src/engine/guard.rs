//! Guard contract and shared guard plumbing.
//!
//! Both guard variants implement [`Guard`]: evaluate content to a
//! tri-state status, durably log a check, and report subsystem
//! health. Shared side-effect helpers live here so the two variants
//! only differ in their scorer fan-out and aggregation policy.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::{
    AuditRecord, CheckOptions, CheckResult, Content, GuardType, HealthReport, ProcessingStatus,
    SafetyLog, Status,
};
use crate::engine::cache::{fingerprint, CachedDecision, DecisionCache};
use crate::engine::metrics::GuardMetrics;
use crate::engine::scorer::ContentScorer;
use crate::error::{GuardError, GuardResult};

/// Durable sink for audit records.
///
/// Implemented by the repository; the write must be durable before
/// `record` returns successfully.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn record(&self, log: &SafetyLog) -> GuardResult<()>;
}

/// The contract both guard variants expose to the generation pipeline.
#[async_trait]
pub trait Guard: Send + Sync {
    /// Which stage this guard implements.
    fn guard_type(&self) -> GuardType;

    /// Evaluate content to a tri-state status.
    ///
    /// Fail-closed: inability to complete the evaluation is an error,
    /// never a default status.
    async fn check(&self, content: &Content, options: &CheckOptions) -> GuardResult<Status>;

    /// Durably persist one audit record for a completed check.
    ///
    /// Fails with a persistence error if the record cannot be
    /// recorded; there is no best-effort degradation here.
    async fn log_check(
        &self,
        generation_id: Uuid,
        model_id: Uuid,
        status: Status,
        details: &CheckResult,
    ) -> GuardResult<()>;

    /// Report per-subsystem health without raising.
    async fn health_check(&self) -> HealthReport;
}

/// Injected collaborators shared by both guard variants.
#[derive(Clone)]
pub struct GuardServices {
    pub scorer: Arc<dyn ContentScorer>,
    pub cache: Arc<dyn DecisionCache>,
    pub metrics: Arc<GuardMetrics>,
    pub audit: Arc<dyn AuditStore>,
}

impl GuardServices {
    /// Consult the cache for a prior decision. Any cache failure is
    /// logged and treated as a miss.
    ///
    /// `policy_tag` identifies the policy the decision is made under;
    /// the same content checked under different thresholds must not
    /// replay a prior decision.
    pub(crate) async fn lookup_cached(
        &self,
        guard_type: GuardType,
        policy_tag: &str,
        content: &Content,
    ) -> Option<(String, Option<CachedDecision>)> {
        let key = match fingerprint(content) {
            Ok(fp) => format!("{}:{}:{}", guard_type, policy_tag, fp),
            Err(e) => {
                tracing::warn!(error = %e, "Fingerprinting failed, skipping cache");
                return None;
            }
        };

        match self.cache.get(&key).await {
            Ok(hit) => Some((key, hit)),
            Err(e) => {
                tracing::warn!(error = %e, "Cache read failed, treating as miss");
                Some((key, None))
            }
        }
    }

    /// Store a decision in the cache. Write failures are logged and
    /// swallowed: the decision already happened and must not be lost
    /// or retried because of a cache fault.
    pub(crate) async fn store_decision(
        &self,
        key: &str,
        status: Status,
        details: serde_json::Value,
        ttl: Duration,
    ) {
        let decision = CachedDecision { status, details };
        if let Err(e) = self.cache.set(key, decision, ttl).await {
            tracing::warn!(error = %e, "Cache write failed, decision not cached");
        }
    }

    /// Append one audit record per scorer result to the in-memory
    /// index. Index failures degrade to a log line.
    pub(crate) fn index_results(
        &self,
        guard_type: GuardType,
        status: Status,
        options: &CheckOptions,
        results: &[&CheckResult],
    ) {
        for result in results {
            let record = AuditRecord {
                check_id: result.check_id,
                check_type: result.check_type,
                guard_type,
                generation_id: options.generation_id,
                model_id: options.model_id,
                status,
                details: serde_json::to_value(result).unwrap_or_else(|_| serde_json::json!({})),
                timestamp: Utc::now(),
            };
            if let Err(e) = self.metrics.append_audit(record) {
                tracing::warn!(error = %e, "Audit index append failed");
            }
        }
    }

    /// Build and durably persist a safety log entry.
    pub(crate) async fn persist_check(
        &self,
        guard_type: GuardType,
        generation_id: Uuid,
        model_id: Uuid,
        status: Status,
        details: &CheckResult,
    ) -> GuardResult<()> {
        let details_value = serde_json::to_value(details)
            .map_err(|e| GuardError::persistence(format!("details serialization: {}", e)))?;

        let now = Utc::now();
        let log = SafetyLog {
            id: details.check_id,
            generation_id,
            model_id,
            guard_type,
            check_type: details.check_type,
            status,
            details: details_value,
            processing_status: ProcessingStatus::Completed,
            timestamp: now,
            created_at: now,
            updated_at: now,
        };

        self.audit.record(&log).await
    }

    /// Probe the three subsystems without raising.
    pub(crate) async fn health(&self) -> HealthReport {
        HealthReport {
            classifier: self.scorer.healthy().await,
            cache: self.cache.healthy().await,
            metrics: self.metrics.healthy(),
        }
    }
}
