//! Alert side-channel for escalated guard failures.
//!
//! Classifier and unknown failures during post-generation checks are
//! escalated here. Delivery is strictly non-blocking: a full or
//! closed channel is logged and dropped, never surfaced to the check
//! call.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::GuardType;
use crate::error::GuardError;

/// Category assigned to an error before logging or escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    ClassifierError,
    CacheError,
    MetricsError,
    UnknownError,
}

impl ErrorCategory {
    /// Classify a guard error for alerting purposes.
    pub fn of(error: &GuardError) -> Self {
        match error {
            GuardError::Evaluation(_) => ErrorCategory::ClassifierError,
            GuardError::Cache(_) => ErrorCategory::CacheError,
            GuardError::Metrics(_) => ErrorCategory::MetricsError,
            _ => ErrorCategory::UnknownError,
        }
    }

    /// Whether this category is escalated to the alert channel.
    /// Cache and metrics degradation is logged only.
    pub fn escalates(&self) -> bool {
        matches!(
            self,
            ErrorCategory::ClassifierError | ErrorCategory::UnknownError
        )
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::ClassifierError => write!(f, "classifier_error"),
            ErrorCategory::CacheError => write!(f, "cache_error"),
            ErrorCategory::MetricsError => write!(f, "metrics_error"),
            ErrorCategory::UnknownError => write!(f, "unknown_error"),
        }
    }
}

/// One escalated failure.
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub category: ErrorCategory,
    pub guard_type: GuardType,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    pub fn new(category: ErrorCategory, guard_type: GuardType, message: String) -> Self {
        Self {
            category,
            guard_type,
            message,
            timestamp: Utc::now(),
        }
    }
}

/// Sending half of the alert side-channel.
#[derive(Clone)]
pub struct AlertChannel {
    sender: mpsc::Sender<Alert>,
}

impl AlertChannel {
    /// Create a bounded channel; the receiver is handed to a drain
    /// task (see [`spawn_drain`]).
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Alert>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Deliver an alert without blocking. A failure to deliver is
    /// logged and dropped; alerting must never fail the check call.
    pub fn notify(&self, alert: Alert) {
        if let Err(e) = self.sender.try_send(alert) {
            tracing::warn!(error = %e, "Alert channel full or closed, dropping alert");
        }
    }
}

/// Drain alerts onto the log.
///
/// Stands in for a pager/webhook integration; the channel shape stays
/// the same when one is added.
pub fn spawn_drain(mut receiver: mpsc::Receiver<Alert>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(alert) = receiver.recv().await {
            tracing::error!(
                category = %alert.category,
                guard_type = %alert.guard_type,
                message = %alert.message,
                timestamp = %alert.timestamp,
                "Guard failure escalated"
            );
        }
    })
}
