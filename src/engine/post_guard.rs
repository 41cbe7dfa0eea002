//! Post-generation guard - the final gate before an artifact ships.
//!
//! Scores ContentSafety, FaceDetection and HarmfulContent
//! concurrently and blends them into one weighted aggregate mapped
//! through two cutoffs, giving operators a single strictness knob
//! instead of three independent ones.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    CheckOptions, CheckResult, CheckType, Content, GuardType, HealthReport, Status,
};
use crate::engine::alerts::{Alert, AlertChannel, ErrorCategory};
use crate::engine::guard::{Guard, GuardServices};
use crate::engine::thresholds::AggregationPolicy;
use crate::error::{GuardError, GuardResult};

/// The output-stage guard.
pub struct PostGuard {
    services: GuardServices,
    policy: AggregationPolicy,
    alerts: AlertChannel,
    default_ttl: Duration,
}

impl PostGuard {
    pub fn new(
        services: GuardServices,
        policy: AggregationPolicy,
        alerts: AlertChannel,
        default_ttl: Duration,
    ) -> Self {
        Self {
            services,
            policy,
            alerts,
            default_ttl,
        }
    }

    /// Categorize a failure, log it, and escalate classifier/unknown
    /// categories to the alert channel. Escalation never blocks and
    /// never fails the check call.
    fn handle_failure(&self, error: &GuardError) {
        let category = ErrorCategory::of(error);
        tracing::error!(
            category = %category,
            error = %error,
            "Post-guard scorer failed"
        );
        if category.escalates() {
            self.alerts.notify(Alert::new(
                category,
                GuardType::PostGuard,
                error.to_string(),
            ));
        }
    }
}

#[async_trait]
impl Guard for PostGuard {
    fn guard_type(&self) -> GuardType {
        GuardType::PostGuard
    }

    async fn check(&self, content: &Content, options: &CheckOptions) -> GuardResult<Status> {
        let started = Instant::now();

        // Per-type threshold overrides have no meaning for the
        // weighted aggregate; rejecting beats silently ignoring.
        if !options.threshold_overrides.is_empty() {
            return Err(GuardError::BadRequest(
                "threshold overrides apply to the pre-generation stage only".to_string(),
            ));
        }

        let cached = self
            .services
            .lookup_cached(GuardType::PostGuard, &self.policy.cache_tag(), content)
            .await;
        if let Some((_, Some(hit))) = &cached {
            self.services.metrics.record_cache_hit();
            tracing::debug!(status = %hit.status, "Post-guard cache hit");
            return Ok(hit.status);
        }

        // All three scorer calls in flight together; the first hard
        // error aborts the whole check.
        let scored = tokio::try_join!(
            self.services
                .scorer
                .score(CheckType::ContentSafety, content, self.policy.high()),
            self.services
                .scorer
                .score(CheckType::FaceDetection, content, self.policy.high()),
            self.services
                .scorer
                .score(CheckType::HarmfulContent, content, self.policy.high()),
        );

        let (content_safety, face_detection, harmful_content) = match scored {
            Ok(results) => results,
            Err(e) => {
                self.services.metrics.record_scorer_failure();
                self.handle_failure(&e);
                return Err(e);
            }
        };

        let aggregate = self.policy.aggregate(
            content_safety.score,
            face_detection.score,
            harmful_content.score,
        );
        let status = self.policy.classify(aggregate);

        let latency_ms = started.elapsed().as_millis() as u64;
        self.services.metrics.record_check(status, latency_ms);
        self.services.index_results(
            GuardType::PostGuard,
            status,
            options,
            &[&content_safety, &face_detection, &harmful_content],
        );

        if let Some((key, _)) = cached {
            let ttl = options.cache_ttl.unwrap_or(self.default_ttl);
            let details = serde_json::json!({
                "aggregate": aggregate,
                "check_results": [content_safety, face_detection, harmful_content],
            });
            self.services.store_decision(&key, status, details, ttl).await;
        }

        tracing::info!(
            guard_type = %GuardType::PostGuard,
            status = %status,
            aggregate,
            latency_ms,
            "Post-guard check complete"
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
            .persist_check(GuardType::PostGuard, generation_id, model_id, status, details)
            .await
    }

    async fn health_check(&self) -> HealthReport {
        self.services.health().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PostGuardConfig;
    use crate::engine::guard::testing::{make_services, FailingScorer, StaticScorer};
    use std::sync::Arc;

    fn policy(high: f64, low: f64) -> AggregationPolicy {
        AggregationPolicy::new(&PostGuardConfig {
            high_threshold: high,
            low_threshold: low,
            ..PostGuardConfig::default()
        })
        .unwrap()
    }

    fn make_guard(scorer: Arc<StaticScorer>, high: f64, low: f64) -> PostGuard {
        let (alerts, _receiver) = AlertChannel::new(16);
        PostGuard::new(
            make_services(scorer),
            policy(high, low),
            alerts,
            Duration::from_secs(3600),
        )
    }

    fn artifact() -> Content {
        Content::artifact("s3://renders/clip-001.mp4", "video/mp4")
    }

    #[tokio::test]
    async fn test_perfect_scores_pass() {
        let scorer = Arc::new(StaticScorer::new(&[
            (CheckType::ContentSafety, 1.0),
            (CheckType::FaceDetection, 1.0),
            (CheckType::HarmfulContent, 1.0),
        ]));
        let guard = make_guard(Arc::clone(&scorer), 1.0, 0.5);

        let status = guard.check(&artifact(), &CheckOptions::default()).await.unwrap();
        assert_eq!(status, Status::Pass);
        assert_eq!(scorer.invocation_count(), 3);
    }

    #[tokio::test]
    async fn test_uniform_half_scores_fail() {
        let scorer = Arc::new(StaticScorer::new(&[
            (CheckType::ContentSafety, 0.5),
            (CheckType::FaceDetection, 0.5),
            (CheckType::HarmfulContent, 0.5),
        ]));
        let guard = make_guard(scorer, 0.9, 0.7);

        let status = guard.check(&artifact(), &CheckOptions::default()).await.unwrap();
        assert_eq!(status, Status::Fail);
    }

    #[tokio::test]
    async fn test_middling_aggregate_warns() {
        // 0.4*0.9 + 0.3*0.7 + 0.3*0.8 = 0.81
        let scorer = Arc::new(StaticScorer::new(&[
            (CheckType::ContentSafety, 0.9),
            (CheckType::FaceDetection, 0.7),
            (CheckType::HarmfulContent, 0.8),
        ]));
        let guard = make_guard(scorer, 0.9, 0.7);

        let status = guard.check(&artifact(), &CheckOptions::default()).await.unwrap();
        assert_eq!(status, Status::Warning);
    }

    #[tokio::test]
    async fn test_scorer_failure_escalates_to_alert_channel() {
        let (alerts, mut receiver) = AlertChannel::new(16);
        let services = make_services(Arc::new(FailingScorer));
        let guard = PostGuard::new(
            services,
            policy(0.9, 0.7),
            alerts,
            Duration::from_secs(3600),
        );

        let result = guard.check(&artifact(), &CheckOptions::default()).await;
        assert!(matches!(result, Err(GuardError::Evaluation(_))));

        let alert = receiver.recv().await.unwrap();
        assert_eq!(alert.category, ErrorCategory::ClassifierError);
        assert_eq!(alert.guard_type, GuardType::PostGuard);
    }

    #[tokio::test]
    async fn test_check_succeeds_when_alert_channel_is_full() {
        // Channel of capacity 1 with no receiver draining it
        let (alerts, receiver) = AlertChannel::new(1);
        drop(receiver);
        let services = make_services(Arc::new(FailingScorer));
        let guard = PostGuard::new(
            services,
            policy(0.9, 0.7),
            alerts,
            Duration::from_secs(3600),
        );

        // The error still propagates; the dropped alert does not panic
        // or block the call.
        let result = guard.check(&artifact(), &CheckOptions::default()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_threshold_overrides_rejected() {
        let scorer = Arc::new(StaticScorer::new(&[
            (CheckType::ContentSafety, 1.0),
            (CheckType::FaceDetection, 1.0),
            (CheckType::HarmfulContent, 1.0),
        ]));
        let guard = make_guard(Arc::clone(&scorer), 0.9, 0.7);

        let mut overrides = std::collections::BTreeMap::new();
        overrides.insert(CheckType::ContentSafety, 0.5);
        let options = CheckOptions {
            threshold_overrides: overrides,
            ..CheckOptions::default()
        };

        let result = guard.check(&artifact(), &options).await;
        assert!(matches!(result, Err(GuardError::BadRequest(_))));
        // Rejected before any scoring
        assert_eq!(scorer.invocation_count(), 0);
    }

    #[tokio::test]
    async fn test_repeat_check_hits_cache() {
        let scorer = Arc::new(StaticScorer::new(&[
            (CheckType::ContentSafety, 1.0),
            (CheckType::FaceDetection, 1.0),
            (CheckType::HarmfulContent, 1.0),
        ]));
        let guard = make_guard(Arc::clone(&scorer), 0.9, 0.7);

        let content = artifact();
        guard.check(&content, &CheckOptions::default()).await.unwrap();
        guard.check(&content, &CheckOptions::default()).await.unwrap();

        assert_eq!(scorer.invocation_count(), 3);
    }

    #[tokio::test]
    async fn test_pre_and_post_decisions_do_not_share_cache_entries() {
        // Same content fingerprint, different guard stage: the cache
        // key is namespaced by guard type.
        let scorer = Arc::new(StaticScorer::new(&[
            (CheckType::ContentSafety, 1.0),
            (CheckType::FaceDetection, 1.0),
            (CheckType::HarmfulContent, 1.0),
        ]));
        let services = make_services(Arc::clone(&scorer) as Arc<_>);
        let (alerts, _rx) = AlertChannel::new(4);
        let post = PostGuard::new(
            services.clone(),
            policy(0.9, 0.7),
            alerts,
            Duration::from_secs(3600),
        );
        let pre = crate::engine::pre_guard::PreGuard::new(
            services,
            crate::engine::thresholds::ThresholdSet::new(
                &crate::config::ThresholdConfig::default(),
            )
            .unwrap(),
            Duration::from_secs(3600),
        );

        let content = Content::prompt("shared content");
        post.check(&content, &CheckOptions::default()).await.unwrap();
        // Pre-guard must not see the post-guard entry: it scores anew.
        pre.check(&content, &CheckOptions::default()).await.unwrap();

        assert_eq!(scorer.invocation_count(), 5);
    }
}
