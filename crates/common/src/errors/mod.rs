//! Error types for NovaHarvest services
//!
//! Registry conditional-write conflicts are normal control flow and never
//! surface here (the store trait reports them as `Ok(false)`); this module
//! separates transient store failures, which the orchestration layer
//! retries, from concurrent deletion during a refresh, which is a hard
//! error.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Required field missing: {field}")]
    MissingField { field: String },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    // Registry errors
    #[error("Registry entry vanished during refresh: {key}")]
    RegistryEntryVanished { key: String },

    #[error("Registry unavailable: {message}")]
    RegistryUnavailable { message: String },

    // Storage errors
    #[error("Staging storage error: {message}")]
    StorageError { message: String },

    // Internal errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// True for failures the orchestration layer should retry.
    ///
    /// Transient store/storage unavailability is retryable; everything else
    /// (bad input, concurrent deletion, bad config) is not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::RegistryUnavailable { .. } | AppError::StorageError { .. }
        )
    }
}

/// Structured error payload returned to the orchestration layer.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub message: String,
    pub retryable: bool,
}

impl From<&AppError> for ErrorDetails {
    fn from(err: &AppError) -> Self {
        Self {
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}
