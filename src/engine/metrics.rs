//! Guard metrics - process-local counters and the bounded audit index.
//!
//! Counters are atomics so concurrent checks never lose increments;
//! the audit index is an append-mostly ring with bounded retention,
//! serving time-range queries for dashboards. Metrics are constructed
//! per guard service and injected, never global, so tests can use
//! isolated instances.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::domain::{AuditRecord, MetricsSnapshot, Status};
use crate::error::{GuardError, GuardResult};

/// Shared counters and audit index for one guard service.
pub struct GuardMetrics {
    total_checks: AtomicU64,
    passed_checks: AtomicU64,
    failed_checks: AtomicU64,
    warning_checks: AtomicU64,
    cache_hits: AtomicU64,
    scorer_failures: AtomicU64,
    latency_total_ms: AtomicU64,
    index: RwLock<VecDeque<AuditRecord>>,
    retention: usize,
}

impl GuardMetrics {
    /// Create empty metrics retaining at most `retention` audit
    /// records in memory.
    pub fn new(retention: usize) -> Self {
        Self {
            total_checks: AtomicU64::new(0),
            passed_checks: AtomicU64::new(0),
            failed_checks: AtomicU64::new(0),
            warning_checks: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            scorer_failures: AtomicU64::new(0),
            latency_total_ms: AtomicU64::new(0),
            index: RwLock::new(VecDeque::new()),
            retention: retention.max(1),
        }
    }

    /// Record one completed check and its end-to-end latency.
    pub fn record_check(&self, status: Status, duration_ms: u64) {
        self.total_checks.fetch_add(1, Ordering::Relaxed);
        self.latency_total_ms.fetch_add(duration_ms, Ordering::Relaxed);
        match status {
            Status::Pass => self.passed_checks.fetch_add(1, Ordering::Relaxed),
            Status::Warning => self.warning_checks.fetch_add(1, Ordering::Relaxed),
            Status::Fail => self.failed_checks.fetch_add(1, Ordering::Relaxed),
        };
    }

    /// Record a decision served from the cache.
    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a scorer invocation that ended in error.
    pub fn record_scorer_failure(&self) {
        self.scorer_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Append an audit record to the bounded index.
    pub fn append_audit(&self, record: AuditRecord) -> GuardResult<()> {
        let mut index = self
            .index
            .write()
            .map_err(|e| GuardError::Metrics(format!("audit index poisoned: {}", e)))?;
        if index.len() >= self.retention {
            index.pop_front();
        }
        index.push_back(record);
        Ok(())
    }

    /// Audit records whose timestamp falls in `[start, end]`.
    pub fn audit_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> GuardResult<Vec<AuditRecord>> {
        let index = self
            .index
            .read()
            .map_err(|e| GuardError::Metrics(format!("audit index poisoned: {}", e)))?;
        Ok(index
            .iter()
            .filter(|r| r.timestamp >= start && r.timestamp <= end)
            .cloned()
            .collect())
    }

    /// Point-in-time view of all counters with derived rates.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let total = self.total_checks.load(Ordering::Relaxed);
        let passed = self.passed_checks.load(Ordering::Relaxed);
        let latency_total = self.latency_total_ms.load(Ordering::Relaxed);

        MetricsSnapshot {
            total_checks: total,
            passed_checks: passed,
            failed_checks: self.failed_checks.load(Ordering::Relaxed),
            warning_checks: self.warning_checks.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            scorer_failures: self.scorer_failures.load(Ordering::Relaxed),
            pass_rate: if total > 0 {
                passed as f64 / total as f64
            } else {
                0.0
            },
            average_latency_ms: if total > 0 {
                latency_total as f64 / total as f64
            } else {
                0.0
            },
        }
    }

    /// Whether the metrics subsystem is usable.
    pub fn healthy(&self) -> bool {
        self.index.read().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CheckType, GuardType};
    use std::sync::Arc;
    use uuid::Uuid;

    fn make_record(timestamp: DateTime<Utc>) -> AuditRecord {
        AuditRecord {
            check_id: Uuid::new_v4(),
            check_type: CheckType::ContentSafety,
            guard_type: GuardType::PreGuard,
            generation_id: None,
            model_id: None,
            status: Status::Pass,
            details: serde_json::json!({}),
            timestamp,
        }
    }

    #[test]
    fn test_snapshot_derives_pass_rate_and_latency() {
        let metrics = GuardMetrics::new(100);
        metrics.record_check(Status::Pass, 10);
        metrics.record_check(Status::Pass, 20);
        metrics.record_check(Status::Fail, 30);
        metrics.record_check(Status::Warning, 40);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_checks, 4);
        assert_eq!(snapshot.passed_checks, 2);
        assert_eq!(snapshot.failed_checks, 1);
        assert_eq!(snapshot.warning_checks, 1);
        assert!((snapshot.pass_rate - 0.5).abs() < 1e-12);
        assert!((snapshot.average_latency_ms - 25.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_snapshot_has_zero_rates() {
        let snapshot = GuardMetrics::new(100).snapshot();
        assert_eq!(snapshot.pass_rate, 0.0);
        assert_eq!(snapshot.average_latency_ms, 0.0);
    }

    #[test]
    fn test_retention_bound_is_enforced() {
        let metrics = GuardMetrics::new(3);
        for _ in 0..10 {
            metrics.append_audit(make_record(Utc::now())).unwrap();
        }
        let all = metrics
            .audit_in_range(Utc::now() - chrono::Duration::hours(1), Utc::now())
            .unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_range_query_filters_by_timestamp() {
        let metrics = GuardMetrics::new(100);
        let old = Utc::now() - chrono::Duration::hours(5);
        let recent = Utc::now();
        metrics.append_audit(make_record(old)).unwrap();
        metrics.append_audit(make_record(recent)).unwrap();

        let results = metrics
            .audit_in_range(Utc::now() - chrono::Duration::hours(1), Utc::now())
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_concurrent_increments_do_not_lose_writes() {
        let metrics = Arc::new(GuardMetrics::new(10));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let m = Arc::clone(&metrics);
            handles.push(std::thread::spawn(move || {
                for _ in 0..1000 {
                    m.record_check(Status::Pass, 1);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(metrics.snapshot().total_checks, 8000);
    }
}
