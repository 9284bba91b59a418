//! Storage error types

use thiserror::Error;

/// Errors surfaced by the storage seams
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backing store unreachable or failed mid-operation
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Record lookup failed
    #[error("record not found: {0}")]
    NotFound(String),

    /// Write rejected by a uniqueness or validation constraint
    #[error("constraint violation: {0}")]
    Constraint(String),
}
