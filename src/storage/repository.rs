//! Repository layer for database operations.
//!
//! Owns the `safety_logs` table and its parent tables. Audit rows are
//! append-only; the single permitted in-place change is the reviewed
//! status correction governed by the transition table in
//! `domain::audit`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

use crate::domain::{correction_allowed, GuardType, SafetyLog, Status};
use crate::engine::AuditStore;
use crate::error::{GuardError, GuardResult};
use crate::storage::models::SafetyLogRow;

/// Repository for all guardrail database operations.
#[derive(Clone)]
pub struct GuardRepository {
    pool: SqlitePool,
}

fn db_err(e: sqlx::Error) -> GuardError {
    GuardError::persistence(e)
}

impl GuardRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Initialize the database schema.
    pub async fn init_schema(&self) -> GuardResult<()> {
        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        // Parent tables carrying the foreign keys. Owned by the
        // generation pipeline in production; created here so the
        // service can run standalone.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS generations (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS models (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS safety_logs (
                id TEXT PRIMARY KEY,
                generation_id TEXT NOT NULL,
                model_id TEXT NOT NULL,
                guard_type TEXT NOT NULL,
                check_type TEXT NOT NULL,
                status TEXT NOT NULL,
                details TEXT NOT NULL,
                processing_status TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (generation_id) REFERENCES generations(id) ON DELETE CASCADE,
                FOREIGN KEY (model_id) REFERENCES models(id) ON DELETE RESTRICT
            );

            CREATE INDEX IF NOT EXISTS idx_safety_logs_timestamp ON safety_logs(timestamp);
            CREATE INDEX IF NOT EXISTS idx_safety_logs_guard_check ON safety_logs(guard_type, check_type);
            CREATE INDEX IF NOT EXISTS idx_safety_logs_processing_status ON safety_logs(processing_status);
            CREATE INDEX IF NOT EXISTS idx_safety_logs_status ON safety_logs(status);
            CREATE INDEX IF NOT EXISTS idx_safety_logs_generation ON safety_logs(generation_id);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    /// Insert one safety log row.
    ///
    /// `details` must be a JSON object. Parent rows are created on
    /// demand so a log for a generation this service has not seen
    /// before still satisfies the foreign keys.
    pub async fn insert_safety_log(&self, log: &SafetyLog) -> GuardResult<()> {
        if !log.details.is_object() {
            return Err(GuardError::BadRequest(
                "safety log details must be a JSON object".to_string(),
            ));
        }

        let now = Utc::now().to_rfc3339();
        sqlx::query("INSERT OR IGNORE INTO generations (id, created_at) VALUES (?, ?)")
            .bind(log.generation_id.to_string())
            .bind(&now)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        sqlx::query("INSERT OR IGNORE INTO models (id, created_at) VALUES (?, ?)")
            .bind(log.model_id.to_string())
            .bind(&now)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        sqlx::query(
            r#"
            INSERT INTO safety_logs (
                id, generation_id, model_id, guard_type, check_type,
                status, details, processing_status, timestamp, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(log.id.to_string())
        .bind(log.generation_id.to_string())
        .bind(log.model_id.to_string())
        .bind(log.guard_type.to_string())
        .bind(log.check_type.to_string())
        .bind(log.status.to_string())
        .bind(
            serde_json::to_string(&log.details)
                .map_err(|e| GuardError::persistence(format!("details serialization: {}", e)))?,
        )
        .bind(log.processing_status.to_string())
        .bind(log.timestamp.to_rfc3339())
        .bind(log.created_at.to_rfc3339())
        .bind(log.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    /// Get a safety log by ID.
    pub async fn get_safety_log(&self, id: Uuid) -> GuardResult<SafetyLog> {
        let row: SafetyLogRow = sqlx::query_as("SELECT * FROM safety_logs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or_else(|| GuardError::NotFound(format!("Safety log {} not found", id)))?;

        row.try_into()
    }

    /// List safety logs, newest first, with optional filters.
    pub async fn list_safety_logs(
        &self,
        guard_type: Option<GuardType>,
        status: Option<Status>,
        limit: i64,
        offset: i64,
    ) -> GuardResult<Vec<SafetyLog>> {
        let rows: Vec<SafetyLogRow> = sqlx::query_as(
            r#"
            SELECT * FROM safety_logs
            WHERE (? IS NULL OR guard_type = ?)
              AND (? IS NULL OR status = ?)
            ORDER BY timestamp DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(guard_type.map(|g| g.to_string()))
        .bind(guard_type.map(|g| g.to_string()))
        .bind(status.map(|s| s.to_string()))
        .bind(status.map(|s| s.to_string()))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Safety logs whose timestamp falls in `[start, end]`.
    pub async fn logs_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> GuardResult<Vec<SafetyLog>> {
        let rows: Vec<SafetyLogRow> = sqlx::query_as(
            r#"
            SELECT * FROM safety_logs
            WHERE timestamp >= ? AND timestamp <= ?
            ORDER BY timestamp ASC
            "#,
        )
        .bind(start.to_rfc3339())
        .bind(end.to_rfc3339())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Correct the status of an existing record on review.
    ///
    /// Only the transitions permitted by `correction_allowed` are
    /// accepted; everything else is rejected without touching the row.
    pub async fn correct_status(&self, id: Uuid, new_status: Status) -> GuardResult<SafetyLog> {
        let existing = self.get_safety_log(id).await?;

        if !correction_allowed(existing.status, new_status) {
            return Err(GuardError::BadRequest(format!(
                "status transition {} -> {} is not permitted",
                existing.status, new_status
            )));
        }

        // Guarded against concurrent corrections: the update only
        // applies if the status is still the one just validated.
        if !self.apply_correction(id, existing.status, new_status).await? {
            return Err(GuardError::BadRequest(format!(
                "status of {} changed concurrently, correction not applied",
                id
            )));
        }

        self.get_safety_log(id).await
    }

    /// Conditionally update the status; returns whether a row was
    /// changed. No row changes when the status is no longer `from`.
    async fn apply_correction(&self, id: Uuid, from: Status, to: Status) -> GuardResult<bool> {
        let result =
            sqlx::query("UPDATE safety_logs SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
                .bind(to.to_string())
                .bind(Utc::now().to_rfc3339())
                .bind(id.to_string())
                .bind(from.to_string())
                .execute(&self.pool)
                .await
                .map_err(db_err)?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl AuditStore for GuardRepository {
    async fn record(&self, log: &SafetyLog) -> GuardResult<()> {
        self.insert_safety_log(log).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CheckType, ProcessingStatus};

    async fn make_repository() -> GuardRepository {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let repository = GuardRepository::new(pool);
        repository.init_schema().await.unwrap();
        repository
    }

    fn make_log(status: Status) -> SafetyLog {
        let now = Utc::now();
        SafetyLog {
            id: Uuid::new_v4(),
            generation_id: Uuid::new_v4(),
            model_id: Uuid::new_v4(),
            guard_type: GuardType::PreGuard,
            check_type: CheckType::ContentSafety,
            status,
            details: serde_json::json!({"score": 0.95}),
            processing_status: ProcessingStatus::Completed,
            timestamp: now,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_round_trip() {
        let repository = make_repository().await;
        let log = make_log(Status::Pass);

        repository.insert_safety_log(&log).await.unwrap();
        let fetched = repository.get_safety_log(log.id).await.unwrap();

        assert_eq!(fetched.id, log.id);
        assert_eq!(fetched.guard_type, GuardType::PreGuard);
        assert_eq!(fetched.status, Status::Pass);
        assert_eq!(fetched.details, log.details);
    }

    #[tokio::test]
    async fn test_non_object_details_rejected() {
        let repository = make_repository().await;
        let mut log = make_log(Status::Pass);
        log.details = serde_json::json!([1, 2, 3]);

        let result = repository.insert_safety_log(&log).await;
        assert!(matches!(result, Err(GuardError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_get_missing_log_is_not_found() {
        let repository = make_repository().await;
        let result = repository.get_safety_log(Uuid::new_v4()).await;
        assert!(matches!(result, Err(GuardError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_filters_by_guard_and_status() {
        let repository = make_repository().await;
        let mut pre_pass = make_log(Status::Pass);
        pre_pass.guard_type = GuardType::PreGuard;
        let mut post_fail = make_log(Status::Fail);
        post_fail.guard_type = GuardType::PostGuard;

        repository.insert_safety_log(&pre_pass).await.unwrap();
        repository.insert_safety_log(&post_fail).await.unwrap();

        let all = repository
            .list_safety_logs(None, None, 10, 0)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let post_only = repository
            .list_safety_logs(Some(GuardType::PostGuard), None, 10, 0)
            .await
            .unwrap();
        assert_eq!(post_only.len(), 1);
        assert_eq!(post_only[0].id, post_fail.id);

        let failed = repository
            .list_safety_logs(None, Some(Status::Fail), 10, 0)
            .await
            .unwrap();
        assert_eq!(failed.len(), 1);
    }

    #[tokio::test]
    async fn test_range_query_bounds_are_inclusive() {
        let repository = make_repository().await;
        let mut old = make_log(Status::Pass);
        old.timestamp = Utc::now() - chrono::Duration::hours(10);
        let recent = make_log(Status::Pass);

        repository.insert_safety_log(&old).await.unwrap();
        repository.insert_safety_log(&recent).await.unwrap();

        let results = repository
            .logs_in_range(Utc::now() - chrono::Duration::hours(1), Utc::now())
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, recent.id);
    }

    #[tokio::test]
    async fn test_permitted_status_correction() {
        let repository = make_repository().await;
        let log = make_log(Status::Fail);
        repository.insert_safety_log(&log).await.unwrap();

        let updated = repository
            .correct_status(log.id, Status::Warning)
            .await
            .unwrap();
        assert_eq!(updated.status, Status::Warning);
        assert!(updated.updated_at >= log.updated_at);
    }

    #[tokio::test]
    async fn test_fail_to_pass_correction_rejected() {
        let repository = make_repository().await;
        let log = make_log(Status::Fail);
        repository.insert_safety_log(&log).await.unwrap();

        let result = repository.correct_status(log.id, Status::Pass).await;
        assert!(matches!(result, Err(GuardError::BadRequest(_))));

        // Row is untouched
        let unchanged = repository.get_safety_log(log.id).await.unwrap();
        assert_eq!(unchanged.status, Status::Fail);
    }

    #[tokio::test]
    async fn test_correction_skipped_when_status_already_changed() {
        let repository = make_repository().await;
        let log = make_log(Status::Fail);
        repository.insert_safety_log(&log).await.unwrap();

        // A competing reviewer moved the row off Fail between our read
        // and our write: the guarded update must not apply.
        let applied = repository
            .apply_correction(log.id, Status::Warning, Status::Pass)
            .await
            .unwrap();
        assert!(!applied);

        let unchanged = repository.get_safety_log(log.id).await.unwrap();
        assert_eq!(unchanged.status, Status::Fail);

        // With the expected prior status the update applies.
        let applied = repository
            .apply_correction(log.id, Status::Fail, Status::Warning)
            .await
            .unwrap();
        assert!(applied);
        let updated = repository.get_safety_log(log.id).await.unwrap();
        assert_eq!(updated.status, Status::Warning);
    }

    #[tokio::test]
    async fn test_warning_may_be_upgraded_to_pass() {
        let repository = make_repository().await;
        let log = make_log(Status::Warning);
        repository.insert_safety_log(&log).await.unwrap();

        let updated = repository
            .correct_status(log.id, Status::Pass)
            .await
            .unwrap();
        assert_eq!(updated.status, Status::Pass);
    }
}
