//! Configuration module for Gatekeeper Core.
//!
//! Loads configuration from YAML files and environment variables.
//! Raw config values are validated into engine policy types
//! (ThresholdSet, AggregationPolicy) at startup; validation failures
//! make the service refuse to start.

use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub guards: GuardsConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Guard policy configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GuardsConfig {
    /// Per-check-type pass thresholds, each in [0,1].
    #[serde(default)]
    pub thresholds: ThresholdConfig,
    /// Post-guard aggregation weights and cutoffs.
    #[serde(default)]
    pub post: PostGuardConfig,
    /// Default TTL for cached decisions, in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Maximum number of audit records retained in the in-memory index.
    #[serde(default = "default_audit_retention")]
    pub audit_retention: usize,
    /// Capacity of the alert side-channel queue.
    #[serde(default = "default_alert_capacity")]
    pub alert_capacity: usize,
}

/// Per-check-type pass thresholds.
#[derive(Debug, Clone, Deserialize)]
pub struct ThresholdConfig {
    pub content_safety: f64,
    pub face_detection: f64,
    pub harmful_content: f64,
    pub bias_check: f64,
    pub privacy_check: f64,
    pub compliance_check: f64,
}

/// Post-guard weighted aggregation configuration.
///
/// Weights must sum to 1.0 and `high_threshold` must exceed
/// `low_threshold`; both checked when the engine policy is built.
#[derive(Debug, Clone, Deserialize)]
pub struct PostGuardConfig {
    pub content_safety_weight: f64,
    pub face_detection_weight: f64,
    pub harmful_content_weight: f64,
    pub high_threshold: f64,
    pub low_threshold: f64,
}

/// Remote classifier configuration.
///
/// When `endpoint` is unset the service falls back to the built-in
/// heuristic scorer (development and tests).
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_classifier_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

fn default_audit_retention() -> usize {
    10_000
}

fn default_alert_capacity() -> usize {
    256
}

fn default_classifier_timeout_secs() -> u64 {
    10
}

fn default_retry_attempts() -> u32 {
    2
}

impl Config {
    /// Load configuration from files and environment.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (GATEKEEPER_*)
    /// 2. config/local.yaml (if exists)
    /// 3. config/default.yaml
    pub fn load() -> Result<Self, ConfigError> {
        let config = ConfigLoader::builder()
            // Start with default config
            .add_source(File::with_name("config/default").required(false))
            // Layer on local overrides
            .add_source(File::with_name("config/local").required(false))
            // Layer on environment variables with GATEKEEPER_ prefix
            .add_source(
                Environment::with_prefix("GATEKEEPER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl Default for GuardsConfig {
    fn default() -> Self {
        Self {
            thresholds: ThresholdConfig::default(),
            post: PostGuardConfig::default(),
            cache_ttl_secs: default_cache_ttl_secs(),
            audit_retention: default_audit_retention(),
            alert_capacity: default_alert_capacity(),
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            content_safety: 0.8,
            face_detection: 0.7,
            harmful_content: 0.9,
            bias_check: 0.7,
            privacy_check: 0.7,
            compliance_check: 0.7,
        }
    }
}

impl Default for PostGuardConfig {
    fn default() -> Self {
        Self {
            content_safety_weight: 0.4,
            face_detection_weight: 0.3,
            harmful_content_weight: 0.3,
            high_threshold: 0.9,
            low_threshold: 0.7,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: String::new(),
            timeout_secs: default_classifier_timeout_secs(),
            retry_attempts: default_retry_attempts(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_guards_config() {
        let config = GuardsConfig::default();
        assert_eq!(config.cache_ttl_secs, 3600);
        assert_eq!(config.thresholds.content_safety, 0.8);
        assert_eq!(config.thresholds.harmful_content, 0.9);
    }

    #[test]
    fn test_default_post_weights_sum_to_one() {
        let post = PostGuardConfig::default();
        let sum = post.content_safety_weight
            + post.face_detection_weight
            + post.harmful_content_weight;
        assert!((sum - 1.0).abs() < 1e-9);
        assert!(post.high_threshold > post.low_threshold);
    }
}
