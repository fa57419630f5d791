//! NovaHarvest Common Library
//!
//! Shared code for the NovaHarvest pipeline services including:
//! - Normalized bibliographic record model
//! - Harvest candidate model with derived registry keys
//! - Identity / fingerprint generation
//! - Registry upsert protocol (DynamoDB and in-memory backends)
//! - Error types and handling
//! - Configuration management

pub mod config;
pub mod errors;
pub mod identity;
pub mod model;
pub mod registry;

// Re-export commonly used types
pub use config::HarvestConfig;
pub use errors::{AppError, Result};
pub use model::{BiblioRecord, CandidateRecord, CandidateStatus};
pub use registry::{CandidateStore, UpsertOutcome};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Fingerprint scheme tag. Frozen: changing it is a breaking migration
/// that orphans every existing registry entry.
pub const FINGERPRINT_SCHEME: &str = "v1";
