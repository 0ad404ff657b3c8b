//! Shared error types.

use thiserror::Error;

/// Type-erased error, used as the failure type of handler callbacks.
///
/// Handler failures are logged by the engine rather than propagated, so a
/// boxed error is all that is ever needed at that boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by storage collaborators.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backing store failed (I/O, connection, ...).
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A persisted payload could not be (de)serialized.
    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    /// Creates a backend error from any displayable cause.
    pub fn backend(cause: impl std::fmt::Display) -> Self {
        Self::Backend(cause.to_string())
    }
}
