//! Error types for VeriStore
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

/// Unified error type for VeriStore operations
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    // -------------------------------------------------------------------------
    // Optimistic Concurrency Errors
    // -------------------------------------------------------------------------
    #[error("version conflict on '{id}': expected version {expected}, store has {actual:?}")]
    VersionConflict {
        id: String,
        expected: u64,
        /// Version currently held by the store, if the store reported one
        actual: Option<u64>,
    },

    #[error("document '{id}' already exists")]
    CreateConflict { id: String },

    #[error("update of '{id}' gave up after {attempts} attempt(s)")]
    UpdateFailed { id: String, attempts: u32 },

    // -------------------------------------------------------------------------
    // Lookup Errors
    // -------------------------------------------------------------------------
    #[error("document '{id}' not found")]
    NotFound { id: String },

    // -------------------------------------------------------------------------
    // Collaborator Errors
    // -------------------------------------------------------------------------
    #[error("operation not supported: {0}")]
    Unsupported(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Whether this error may be resolved by re-reading and retrying.
    ///
    /// Version conflicts are the only retryable condition; everything else
    /// propagates immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::VersionConflict { .. })
    }
}
