//! Pre-generation guard - gates prompts before the render starts.
//!
//! Scores ContentSafety and HarmfulContent concurrently and
//! thresholds each signal independently. Disagreement between the two
//! signals is a soft warning rather than an outright block; the
//! stricter judgment is deferred to the richer post-generation
//! evaluation.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    CheckOptions, CheckResult, CheckType, Content, GuardType, HealthReport, Status,
};
use crate::engine::guard::{Guard, GuardServices};
use crate::engine::thresholds::ThresholdSet;
use crate::error::GuardResult;

/// The input-stage guard.
pub struct PreGuard {
    services: GuardServices,
    thresholds: ThresholdSet,
    default_ttl: Duration,
}

impl PreGuard {
    pub fn new(services: GuardServices, thresholds: ThresholdSet, default_ttl: Duration) -> Self {
        Self {
            services,
            thresholds,
            default_ttl,
        }
    }

    /// Combine the two independent pass/fail signals.
    fn aggregate(content_safety_passed: bool, harmful_content_passed: bool) -> Status {
        match (content_safety_passed, harmful_content_passed) {
            (true, true) => Status::Pass,
            (false, false) => Status::Fail,
            _ => Status::Warning,
        }
    }
}

#[async_trait]
impl Guard for PreGuard {
    fn guard_type(&self) -> GuardType {
        GuardType::PreGuard
    }

    async fn check(&self, content: &Content, options: &CheckOptions) -> GuardResult<Status> {
        let started = Instant::now();

        let thresholds = if options.threshold_overrides.is_empty() {
            self.thresholds.clone()
        } else {
            self.thresholds.with_overrides(&options.threshold_overrides)?
        };

        let cached = self
            .services
            .lookup_cached(GuardType::PreGuard, &thresholds.cache_tag(), content)
            .await;
        if let Some((_, Some(hit))) = &cached {
            self.services.metrics.record_cache_hit();
            tracing::debug!(status = %hit.status, "Pre-guard cache hit");
            return Ok(hit.status);
        }

        // Both scorer calls are issued before either resolves; the
        // first hard error aborts the whole check (fail-closed).
        let scored = tokio::try_join!(
            self.services.scorer.score(
                CheckType::ContentSafety,
                content,
                thresholds.threshold(CheckType::ContentSafety),
            ),
            self.services.scorer.score(
                CheckType::HarmfulContent,
                content,
                thresholds.threshold(CheckType::HarmfulContent),
            ),
        );

        let (content_safety, harmful_content) = match scored {
            Ok(results) => results,
            Err(e) => {
                self.services.metrics.record_scorer_failure();
                tracing::error!(error = %e, "Pre-guard scorer failed");
                return Err(e);
            }
        };

        let status = Self::aggregate(
            thresholds.passes(CheckType::ContentSafety, content_safety.score),
            thresholds.passes(CheckType::HarmfulContent, harmful_content.score),
        );

        let latency_ms = started.elapsed().as_millis() as u64;
        self.services.metrics.record_check(status, latency_ms);
        self.services.index_results(
            GuardType::PreGuard,
            status,
            options,
            &[&content_safety, &harmful_content],
        );

        if let Some((key, _)) = cached {
            let ttl = options.cache_ttl.unwrap_or(self.default_ttl);
            let details = serde_json::json!({
                "check_results": [content_safety, harmful_content],
            });
            self.services.store_decision(&key, status, details, ttl).await;
        }

        tracing::info!(
            guard_type = %GuardType::PreGuard,
            status = %status,
            content_safety_score = content_safety.score,
            harmful_content_score = harmful_content.score,
            latency_ms,
            "Pre-guard check complete"
        );

        Ok(status)
    }

    async fn log_check(
        &self,
        generation_id: Uuid,
        model_id: Uuid,
        status: Status,
        details: &CheckResult,
    ) -> GuardResult<()> {
        self.services
            .persist_check(GuardType::PreGuard, generation_id, model_id, status, details)
            .await
    }

    async fn health_check(&self) -> HealthReport {
        self.services.health().await
    }
}
