//! Scorer facade - the boundary to the opaque content-scoring models.
//!
//! The guards treat a scorer as a possibly slow, possibly failing
//! dependency that returns a confidence score in [0,1] per check type.
//! A scorer raises a typed error rather than returning a sentinel
//! score; timeouts are this boundary's responsibility, not the
//! guards'.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ClassifierConfig;
use crate::domain::{CheckResult, CheckType, Content};
use crate::error::{GuardError, GuardResult};

/// Uniform scoring capability over the six check types.
///
/// Implementations must be safe to call concurrently for different
/// check types on the same content.
#[async_trait]
pub trait ContentScorer: Send + Sync {
    /// Score `content` for one check type.
    ///
    /// `threshold` is the pass threshold the guard will apply; it is
    /// stamped into the result so audit details are self-contained.
    async fn score(
        &self,
        check_type: CheckType,
        content: &Content,
        threshold: f64,
    ) -> GuardResult<CheckResult>;

    /// Whether the scoring backend is currently reachable.
    async fn healthy(&self) -> bool;
}

fn finish_result(
    check_type: CheckType,
    score: f64,
    threshold: f64,
    started: Instant,
    detail: BTreeMap<String, serde_json::Value>,
) -> CheckResult {
    CheckResult {
        check_type,
        score,
        threshold,
        check_id: Uuid::new_v4(),
        duration_ms: started.elapsed().as_millis() as u64,
        detail,
    }
}

// ==================== Heuristic scorer ====================

/// Deterministic keyword/metadata scorer.
///
/// Used in development and tests where no classifier service is
/// available. Scores start from a safe baseline and drop for each
/// flagged term found in the scannable text.
pub struct HeuristicScorer {
    /// Additional flagged terms applied to every check type.
    extra_terms: Vec<String>,
}

const BASELINE_SCORE: f64 = 0.95;
const HIT_PENALTY: f64 = 0.3;
const FLOOR_SCORE: f64 = 0.05;

impl HeuristicScorer {
    pub fn new(extra_terms: Vec<String>) -> Self {
        Self { extra_terms }
    }

    fn flagged_terms(check_type: CheckType) -> &'static [&'static str] {
        match check_type {
            CheckType::ContentSafety => &["gore", "graphic violence", "explicit"],
            CheckType::FaceDetection => &["celebrity", "deepfake"],
            CheckType::HarmfulContent => &["weapon", "self-harm", "attack"],
            CheckType::BiasCheck => &["slur", "stereotype"],
            CheckType::PrivacyCheck => &["home address", "passport", "ssn"],
            CheckType::ComplianceCheck => &["copyright", "trademark"],
        }
    }

    fn matches(&self, check_type: CheckType, text: &str) -> Vec<String> {
        let text_lower = text.to_lowercase();
        let mut hits: Vec<String> = Self::flagged_terms(check_type)
            .iter()
            .filter(|term| text_lower.contains(*term))
            .map(|term| term.to_string())
            .collect();
        hits.extend(
            self.extra_terms
                .iter()
                .filter(|term| text_lower.contains(&term.to_lowercase()))
                .cloned(),
        );
        hits
    }
}

#[async_trait]
impl ContentScorer for HeuristicScorer {
    async fn score(
        &self,
        check_type: CheckType,
        content: &Content,
        threshold: f64,
    ) -> GuardResult<CheckResult> {
        let started = Instant::now();

        // Face detection reads artifact metadata rather than text
        if check_type == CheckType::FaceDetection {
            let contains_faces = content
                .metadata()
                .get("contains_faces")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            let score = if contains_faces { 0.2 } else { BASELINE_SCORE };
            let mut detail = BTreeMap::new();
            detail.insert(
                "contains_faces".to_string(),
                serde_json::json!(contains_faces),
            );
            return Ok(finish_result(check_type, score, threshold, started, detail));
        }

        let hits = self.matches(check_type, &content.scannable_text());
        let score = (BASELINE_SCORE - HIT_PENALTY * hits.len() as f64).max(FLOOR_SCORE);

        let mut detail = BTreeMap::new();
        detail.insert("scorer".to_string(), serde_json::json!("heuristic"));
        if !hits.is_empty() {
            detail.insert("flagged_terms".to_string(), serde_json::json!(hits));
        }

        Ok(finish_result(check_type, score, threshold, started, detail))
    }

    async fn healthy(&self) -> bool {
        true
    }
}

// ==================== Remote classifier ====================

/// Request sent to the classifier service.
#[derive(Debug, Serialize)]
struct ScoreRequest<'a> {
    check_type: CheckType,
    content: &'a Content,
}

/// Response from the classifier service.
#[derive(Debug, Deserialize)]
struct ScoreResponse {
    score: f64,
    #[serde(default)]
    detail: BTreeMap<String, serde_json::Value>,
}

/// HTTP client for the external classifier service.
pub struct RemoteScorer {
    endpoint: String,
    api_key: String,
    client: Client,
}

impl RemoteScorer {
    /// Build a client for `endpoint` with the configured request
    /// timeout. The timeout bounds every scorer call so a stalled
    /// classifier cannot hang a check.
    pub fn new(endpoint: String, config: &ClassifierConfig) -> GuardResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GuardError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            endpoint,
            api_key: config.api_key.clone(),
            client,
        })
    }
}

#[async_trait]
impl ContentScorer for RemoteScorer {
    async fn score(
        &self,
        check_type: CheckType,
        content: &Content,
        threshold: f64,
    ) -> GuardResult<CheckResult> {
        let started = Instant::now();

        let request = ScoreRequest {
            check_type,
            content,
        };

        let response = self
            .client
            .post(format!("{}/v1/score", self.endpoint))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| GuardError::evaluation(format!("classifier request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GuardError::Evaluation(format!(
                "classifier returned {}: {}",
                status, body
            )));
        }

        let scored: ScoreResponse = response
            .json()
            .await
            .map_err(|e| GuardError::evaluation(format!("classifier response: {}", e)))?;

        if !(0.0..=1.0).contains(&scored.score) || scored.score.is_nan() {
            return Err(GuardError::Evaluation(format!(
                "classifier returned score {} outside [0,1] for {}",
                scored.score, check_type
            )));
        }

        Ok(finish_result(
            check_type,
            scored.score,
            threshold,
            started,
            scored.detail,
        ))
    }

    async fn healthy(&self) -> bool {
        match self
            .client
            .get(format!("{}/healthz", self.endpoint))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::warn!(error = %e, "Classifier health probe failed");
                false
            }
        }
    }
}

// ==================== Retry middleware ====================

/// Explicit retry wrapper composed around a scorer.
///
/// Retries evaluation failures with linear backoff; the retry policy
/// is visible at the construction site instead of hidden behind an
/// annotation.
pub struct RetryingScorer {
    inner: Arc<dyn ContentScorer>,
    max_attempts: u32,
    backoff: Duration,
}

impl RetryingScorer {
    pub fn new(inner: Arc<dyn ContentScorer>, max_attempts: u32) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            backoff: Duration::from_millis(100),
        }
    }
}

#[async_trait]
impl ContentScorer for RetryingScorer {
    async fn score(
        &self,
        check_type: CheckType,
        content: &Content,
        threshold: f64,
    ) -> GuardResult<CheckResult> {
        let mut last_error = None;

        for attempt in 1..=self.max_attempts {
            match self.inner.score(check_type, content, threshold).await {
                Ok(result) => return Ok(result),
                Err(e @ GuardError::Evaluation(_)) => {
                    tracing::warn!(
                        check_type = %check_type,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Scorer attempt failed"
                    );
                    last_error = Some(e);
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.backoff * attempt).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error
            .unwrap_or_else(|| GuardError::Evaluation("scorer produced no result".to_string())))
    }

    async fn healthy(&self) -> bool {
        self.inner.healthy().await
    }
}
