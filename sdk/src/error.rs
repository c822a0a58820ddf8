//! SDK error types.
//!
//! Provides error types for watchlist and persistence operations.

/// SDK errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SdkError {
    /// Resource descriptor is missing required identity fields.
    #[error("invalid resource: {0}")]
    InvalidResource(String),

    /// Persistence backend failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// The watch client task is no longer running.
    #[error("watch client stopped")]
    ClientStopped,
}

impl From<crate::storage::StorageError> for SdkError {
    fn from(err: crate::storage::StorageError) -> Self {
        Self::Storage(err.to_string())
    }
}
