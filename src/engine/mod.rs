//! Guardrail engine for Gatekeeper Core.
//!
//! This module contains the decision pipeline:
//! - Threshold Policy: validated pass/fail thresholds and aggregation
//! - Scorer Facade: the boundary to the opaque content scorers
//! - Decision Cache: fingerprint-keyed memoization with TTL
//! - Guard variants: PreGuard (input stage) and PostGuard (output stage)
//! - Metrics and the alert side-channel

mod alerts;
mod cache;
mod guard;
mod metrics;
mod post_guard;
mod pre_guard;
mod scorer;
mod thresholds;

pub use alerts::*;
pub use cache::*;
pub use guard::*;
pub use metrics::*;
pub use post_guard::*;
pub use pre_guard::*;
pub use scorer::*;
pub use thresholds::*;
