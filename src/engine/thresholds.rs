//! Threshold policy - validated pass/fail thresholds per check type.
//!
//! Constructed once at startup from configuration and immutable
//! thereafter. Out-of-range values are rejected at construction, so a
//! guard never runs with an invalid policy.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use crate::config::{PostGuardConfig, ThresholdConfig};
use crate::domain::CheckType;
use crate::error::{GuardError, GuardResult};

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Immutable per-check-type pass thresholds, each in [0,1].
#[derive(Debug, Clone)]
pub struct ThresholdSet {
    thresholds: [f64; 6],
}

impl ThresholdSet {
    /// Build a threshold set, rejecting any value outside [0,1].
    pub fn new(config: &ThresholdConfig) -> GuardResult<Self> {
        let thresholds = [
            (CheckType::ContentSafety, config.content_safety),
            (CheckType::FaceDetection, config.face_detection),
            (CheckType::HarmfulContent, config.harmful_content),
            (CheckType::BiasCheck, config.bias_check),
            (CheckType::PrivacyCheck, config.privacy_check),
            (CheckType::ComplianceCheck, config.compliance_check),
        ];

        let mut table = [0.0; 6];
        for (check_type, value) in thresholds {
            validate_unit_interval(&format!("threshold for {}", check_type), value)?;
            table[check_type.index()] = value;
        }

        Ok(Self { thresholds: table })
    }

    /// The threshold configured for a check type.
    pub fn threshold(&self, check_type: CheckType) -> f64 {
        self.thresholds[check_type.index()]
    }

    /// Pure decision function: does `score` pass the threshold for
    /// `check_type`?
    pub fn passes(&self, check_type: CheckType, score: f64) -> bool {
        score >= self.threshold(check_type)
    }

    /// Derive a new set with per-call overrides applied.
    ///
    /// Overrides are validated the same way as configured values.
    pub fn with_overrides(&self, overrides: &BTreeMap<CheckType, f64>) -> GuardResult<Self> {
        let mut table = self.thresholds;
        for (&check_type, &value) in overrides {
            validate_unit_interval(&format!("threshold override for {}", check_type), value)?;
            table[check_type.index()] = value;
        }
        Ok(Self { thresholds: table })
    }

    /// Short stable digest of the effective thresholds.
    ///
    /// Folded into cache keys: a decision is only valid for the
    /// policy it was made under, so sets with different thresholds
    /// must never share a cache entry.
    pub fn cache_tag(&self) -> String {
        policy_tag(&self.thresholds)
    }
}

/// Post-guard aggregation policy: signal weights and decision cutoffs.
///
/// Weights must sum to 1.0; `high` must exceed `low`; all values in
/// [0,1]. Validated at construction.
#[derive(Debug, Clone)]
pub struct AggregationPolicy {
    content_safety_weight: f64,
    face_detection_weight: f64,
    harmful_content_weight: f64,
    high_threshold: f64,
    low_threshold: f64,
}

impl AggregationPolicy {
    /// Build an aggregation policy, validating weights and cutoffs.
    pub fn new(config: &PostGuardConfig) -> GuardResult<Self> {
        validate_unit_interval("content_safety_weight", config.content_safety_weight)?;
        validate_unit_interval("face_detection_weight", config.face_detection_weight)?;
        validate_unit_interval("harmful_content_weight", config.harmful_content_weight)?;
        validate_unit_interval("high_threshold", config.high_threshold)?;
        validate_unit_interval("low_threshold", config.low_threshold)?;

        let sum = config.content_safety_weight
            + config.face_detection_weight
            + config.harmful_content_weight;
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(GuardError::Configuration(format!(
                "aggregation weights must sum to 1.0, got {}",
                sum
            )));
        }

        if config.high_threshold <= config.low_threshold {
            return Err(GuardError::Configuration(format!(
                "high_threshold ({}) must exceed low_threshold ({})",
                config.high_threshold, config.low_threshold
            )));
        }

        Ok(Self {
            content_safety_weight: config.content_safety_weight,
            face_detection_weight: config.face_detection_weight,
            harmful_content_weight: config.harmful_content_weight,
            high_threshold: config.high_threshold,
            low_threshold: config.low_threshold,
        })
    }

    /// Weighted blend of the three post-generation signals.
    pub fn aggregate(
        &self,
        content_safety: f64,
        face_detection: f64,
        harmful_content: f64,
    ) -> f64 {
        self.content_safety_weight * content_safety
            + self.face_detection_weight * face_detection
            + self.harmful_content_weight * harmful_content
    }

    /// The pass cutoff for the aggregate score.
    pub fn high(&self) -> f64 {
        self.high_threshold
    }

    /// The fail cutoff for the aggregate score.
    pub fn low(&self) -> f64 {
        self.low_threshold
    }

    /// Short stable digest of the weights and cutoffs, for cache keys.
    pub fn cache_tag(&self) -> String {
        policy_tag(&[
            self.content_safety_weight,
            self.face_detection_weight,
            self.harmful_content_weight,
            self.high_threshold,
            self.low_threshold,
        ])
    }

    /// Map an aggregate score through the two cutoffs.
    pub fn classify(&self, aggregate: f64) -> crate::domain::Status {
        use crate::domain::Status;

        if aggregate >= self.high_threshold {
            Status::Pass
        } else if aggregate >= self.low_threshold {
            Status::Warning
        } else {
            Status::Fail
        }
    }
}

fn policy_tag(values: &[f64]) -> String {
    let mut hasher = Sha256::new();
    for value in values {
        hasher.update(value.to_bits().to_be_bytes());
    }
    hex::encode(&hasher.finalize()[..8])
}

fn validate_unit_interval(name: &str, value: f64) -> GuardResult<()> {
    if !(0.0..=1.0).contains(&value) || value.is_nan() {
        return Err(GuardError::Configuration(format!(
            "{} must be in [0,1], got {}",
            name, value
        )));
    }
    Ok(())
}
