//! Remote API error types

use thiserror::Error;

/// Remote administration API errors
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("{what} not found")]
    NotFound { what: String },

    #[error("Remote API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl RemoteError {
    pub fn not_found(what: impl Into<String>) -> Self {
        RemoteError::NotFound { what: what.into() }
    }

    /// Whether the remote side reported the target as absent. Deletion paths
    /// treat this as success: already gone is the desired outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound { .. })
    }
}

/// Result type for remote operations
pub type Result<T> = std::result::Result<T, RemoteError>;
