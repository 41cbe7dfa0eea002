//! Database models for Gatekeeper Core.
//!
//! These are the row types returned by SQLx queries.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::domain::SafetyLog;
use crate::error::GuardError;

/// Database row for the safety_logs table.
#[derive(Debug, Clone, FromRow)]
pub struct SafetyLogRow {
    pub id: String,
    pub generation_id: String,
    pub model_id: String,
    pub guard_type: String,
    pub check_type: String,
    pub status: String,
    pub details: String,
    pub processing_status: String,
    pub timestamp: String,
    pub created_at: String,
    pub updated_at: String,
}

fn parse_uuid(field: &str, value: &str) -> Result<Uuid, GuardError> {
    Uuid::parse_str(value)
        .map_err(|e| GuardError::persistence(format!("invalid {} in safety_logs: {}", field, e)))
}

fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, GuardError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| GuardError::persistence(format!("invalid {} in safety_logs: {}", field, e)))
}

impl TryFrom<SafetyLogRow> for SafetyLog {
    type Error = GuardError;

    fn try_from(row: SafetyLogRow) -> Result<Self, Self::Error> {
        Ok(SafetyLog {
            id: parse_uuid("id", &row.id)?,
            generation_id: parse_uuid("generation_id", &row.generation_id)?,
            model_id: parse_uuid("model_id", &row.model_id)?,
            guard_type: row.guard_type.parse().map_err(GuardError::Persistence)?,
            check_type: row.check_type.parse().map_err(GuardError::Persistence)?,
            status: row.status.parse().map_err(GuardError::Persistence)?,
            details: serde_json::from_str(&row.details)
                .map_err(|e| GuardError::persistence(format!("invalid details JSON: {}", e)))?,
            processing_status: row
                .processing_status
                .parse()
                .map_err(GuardError::Persistence)?,
            timestamp: parse_timestamp("timestamp", &row.timestamp)?,
            created_at: parse_timestamp("created_at", &row.created_at)?,
            updated_at: parse_timestamp("updated_at", &row.updated_at)?,
        })
    }
}
