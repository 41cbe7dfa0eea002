//! Storage layer for Gatekeeper Core.
//!
//! Durable persistence of the audit trail via SQLx.

mod models;
mod repository;

pub use models::*;
pub use repository::*;
