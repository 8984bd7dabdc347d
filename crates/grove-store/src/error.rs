//! Store error types

use grove_types::ObjectKey;
use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    #[error("{kind} {namespace}/{name} already exists")]
    AlreadyExists {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    #[error("Version conflict on {kind} {namespace}/{name}: stored {stored}, write carried {carried}")]
    Conflict {
        kind: &'static str,
        namespace: String,
        name: String,
        stored: u64,
        carried: u64,
    },

    #[error("Invalid record: {0}")]
    Invalid(String),
}

impl StoreError {
    pub fn not_found(kind: &'static str, key: &ObjectKey) -> Self {
        StoreError::NotFound {
            kind,
            namespace: key.namespace.clone(),
            name: key.name.clone(),
        }
    }

    /// Whether this is an optimistic-concurrency conflict; conflicts are
    /// transient and callers retry instead of reporting them.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
