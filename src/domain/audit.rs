//! Audit domain types.
//!
//! An audit record describes one safety evaluation. Records are
//! append-only: once written they are never updated, with the single
//! exception of the review correction table enforced by the store
//! (`correction_allowed`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{CheckType, GuardType, Status};

/// An immutable log entry describing one safety evaluation.
///
/// Produced on every check for the in-memory metrics index; the
/// durable form (with foreign keys and processing state) is
/// [`SafetyLog`].
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditRecord {
    /// Identifier of the scorer invocation this record describes.
    pub check_id: Uuid,
    pub check_type: CheckType,
    pub guard_type: GuardType,
    /// Generation the content belongs to, when known.
    pub generation_id: Option<Uuid>,
    /// Model that produced the content, when known.
    pub model_id: Option<Uuid>,
    pub status: Status,
    /// Structured evaluation details; always a JSON object.
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Processing state of a persisted audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStatus::Pending => write!(f, "pending"),
            ProcessingStatus::Processing => write!(f, "processing"),
            ProcessingStatus::Completed => write!(f, "completed"),
            ProcessingStatus::Failed => write!(f, "failed"),
            ProcessingStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for ProcessingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ProcessingStatus::Pending),
            "processing" => Ok(ProcessingStatus::Processing),
            "completed" => Ok(ProcessingStatus::Completed),
            "failed" => Ok(ProcessingStatus::Failed),
            "cancelled" => Ok(ProcessingStatus::Cancelled),
            _ => Err(format!("Unknown processing status: {}", s)),
        }
    }
}

/// A durably stored audit record (row in `safety_logs`).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SafetyLog {
    pub id: Uuid,
    pub generation_id: Uuid,
    pub model_id: Uuid,
    pub guard_type: GuardType,
    pub check_type: CheckType,
    pub status: Status,
    pub details: serde_json::Value,
    pub processing_status: ProcessingStatus,
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Whether a persisted record's status may be corrected from `from`
/// to `to` on review.
///
/// A once-failed record may be downgraded to warning on review but is
/// never marked pass without passing through warning first.
pub fn correction_allowed(from: Status, to: Status) -> bool {
    matches!(
        (from, to),
        (Status::Pass, Status::Warning)
            | (Status::Pass, Status::Fail)
            | (Status::Warning, Status::Pass)
            | (Status::Warning, Status::Fail)
            | (Status::Fail, Status::Warning)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fail_never_corrects_directly_to_pass() {
        assert!(!correction_allowed(Status::Fail, Status::Pass));
        assert!(correction_allowed(Status::Fail, Status::Warning));
        assert!(correction_allowed(Status::Warning, Status::Pass));
    }

    #[test]
    fn test_self_transitions_rejected() {
        for status in [Status::Pass, Status::Warning, Status::Fail] {
            assert!(!correction_allowed(status, status));
        }
    }

    #[test]
    fn test_pass_may_be_downgraded() {
        assert!(correction_allowed(Status::Pass, Status::Warning));
        assert!(correction_allowed(Status::Pass, Status::Fail));
    }

    #[test]
    fn test_processing_status_round_trip() {
        for ps in [
            ProcessingStatus::Pending,
            ProcessingStatus::Processing,
            ProcessingStatus::Completed,
            ProcessingStatus::Failed,
            ProcessingStatus::Cancelled,
        ] {
            let parsed: ProcessingStatus = ps.to_string().parse().unwrap();
            assert_eq!(parsed, ps);
        }
    }
}
