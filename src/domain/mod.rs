//! Domain types for Gatekeeper Core.
//!
//! This module contains the core business entities and value objects.

mod audit;
mod check;
mod content;
mod metrics;

pub use audit::*;
pub use check::*;
pub use content::*;
pub use metrics::*;
