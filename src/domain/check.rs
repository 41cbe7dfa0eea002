//! Check-related domain types.
//!
//! The vocabulary of the guardrail pipeline: which signal was scored,
//! which stage scored it, and what the decision was.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// The kind of safety signal a scorer produces.
///
/// Closed set; drives which scorer and which threshold applies.
/// Ordered so it can key sorted maps (threshold overrides).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum CheckType {
    ContentSafety,
    FaceDetection,
    HarmfulContent,
    BiasCheck,
    PrivacyCheck,
    ComplianceCheck,
}

impl CheckType {
    /// All check types, in a fixed order.
    pub const ALL: [CheckType; 6] = [
        CheckType::ContentSafety,
        CheckType::FaceDetection,
        CheckType::HarmfulContent,
        CheckType::BiasCheck,
        CheckType::PrivacyCheck,
        CheckType::ComplianceCheck,
    ];

    /// Stable index into threshold tables.
    pub(crate) fn index(self) -> usize {
        match self {
            CheckType::ContentSafety => 0,
            CheckType::FaceDetection => 1,
            CheckType::HarmfulContent => 2,
            CheckType::BiasCheck => 3,
            CheckType::PrivacyCheck => 4,
            CheckType::ComplianceCheck => 5,
        }
    }
}

impl std::fmt::Display for CheckType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckType::ContentSafety => write!(f, "content_safety"),
            CheckType::FaceDetection => write!(f, "face_detection"),
            CheckType::HarmfulContent => write!(f, "harmful_content"),
            CheckType::BiasCheck => write!(f, "bias_check"),
            CheckType::PrivacyCheck => write!(f, "privacy_check"),
            CheckType::ComplianceCheck => write!(f, "compliance_check"),
        }
    }
}

impl std::str::FromStr for CheckType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "content_safety" => Ok(CheckType::ContentSafety),
            "face_detection" => Ok(CheckType::FaceDetection),
            "harmful_content" => Ok(CheckType::HarmfulContent),
            "bias_check" => Ok(CheckType::BiasCheck),
            "privacy_check" => Ok(CheckType::PrivacyCheck),
            "compliance_check" => Ok(CheckType::ComplianceCheck),
            _ => Err(format!("Unknown check type: {}", s)),
        }
    }
}

/// Which guard stage produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GuardType {
    /// Input stage, runs on the prompt before generation.
    PreGuard,
    /// Output stage, runs on the rendered artifact before release.
    PostGuard,
}

impl std::fmt::Display for GuardType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GuardType::PreGuard => write!(f, "pre_guard"),
            GuardType::PostGuard => write!(f, "post_guard"),
        }
    }
}

impl std::str::FromStr for GuardType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pre_guard" | "pre" => Ok(GuardType::PreGuard),
            "post_guard" | "post" => Ok(GuardType::PostGuard),
            _ => Err(format!("Unknown guard type: {}", s)),
        }
    }
}

/// Tri-state outcome of a guard check.
///
/// Deliberately not ordered: Warning is a distinct policy outcome for
/// partial disagreement among signals, not a midpoint between Pass
/// and Fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Content may proceed.
    Pass,
    /// Signals disagree or confidence is middling; proceed with review.
    Warning,
    /// Content is blocked.
    Fail,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Pass => write!(f, "pass"),
            Status::Warning => write!(f, "warning"),
            Status::Fail => write!(f, "fail"),
        }
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pass" => Ok(Status::Pass),
            "warning" => Ok(Status::Warning),
            "fail" => Ok(Status::Fail),
            _ => Err(format!("Unknown status: {}", s)),
        }
    }
}

/// Result of one scorer invocation.
///
/// Created once per invocation and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CheckResult {
    /// Which signal was scored.
    pub check_type: CheckType,
    /// Confidence that the content is safe, in [0,1].
    pub score: f64,
    /// The threshold this score was compared against, in [0,1].
    pub threshold: f64,
    /// Unique identifier for this scorer invocation.
    pub check_id: Uuid,
    /// Wall-clock duration of the invocation.
    pub duration_ms: u64,
    /// Scorer-specific metadata (model version, matched categories).
    #[serde(default)]
    pub detail: BTreeMap<String, serde_json::Value>,
}

/// Per-call options recognized by `Guard::check`.
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// Override the configured cache TTL for this decision.
    pub cache_ttl: Option<Duration>,
    /// Per-call pass-threshold overrides, each in [0,1].
    ///
    /// Recognized by the pre-generation stage only; the
    /// post-generation aggregate has no per-type thresholds and
    /// rejects overrides.
    pub threshold_overrides: BTreeMap<CheckType, f64>,
    /// Generation this check belongs to, if known at check time.
    pub generation_id: Option<Uuid>,
    /// Model that produced (or will produce) the content.
    pub model_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        let status = Status::Warning;
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, "\"warning\"");
    }

    #[test]
    fn test_check_type_round_trip() {
        for ct in CheckType::ALL {
            let parsed: CheckType = ct.to_string().parse().unwrap();
            assert_eq!(parsed, ct);
        }
    }

    #[test]
    fn test_guard_type_parse_short_form() {
        assert_eq!("pre".parse::<GuardType>().unwrap(), GuardType::PreGuard);
        assert_eq!("post".parse::<GuardType>().unwrap(), GuardType::PostGuard);
    }

    #[test]
    fn test_check_type_keys_sorted_map_in_declaration_order() {
        let mut map = BTreeMap::new();
        for ct in CheckType::ALL {
            map.insert(ct, 0.5);
        }
        let keys: Vec<CheckType> = map.keys().copied().collect();
        assert_eq!(keys, CheckType::ALL);
    }

    #[test]
    fn test_check_type_indexes_are_distinct() {
        let mut seen = [false; 6];
        for ct in CheckType::ALL {
            assert!(!seen[ct.index()]);
            seen[ct.index()] = true;
        }
    }
}
