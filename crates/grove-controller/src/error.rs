//! Reconciliation error taxonomy
//!
//! Each variant maps to one pass outcome: invalid specs park until edited,
//! remote and dependency failures retry on the error interval, and store
//! conflicts retry quietly without touching conditions. Nothing here is fatal
//! to the process; failures stay scoped to the resource that hit them.

use grove_remote::{CredentialError, RemoteError};
use grove_store::StoreError;
use grove_types::{ObjectKey, ValidationError};
use thiserror::Error;

/// Failures a reconcile pass can surface.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The spec can never converge as written; only an edit clears this.
    #[error("invalid spec: {0}")]
    Validation(#[from] ValidationError),

    /// A remote admin call failed.
    #[error("{context}: {source}")]
    RemoteSync {
        context: String,
        #[source]
        source: RemoteError,
    },

    /// Several collection edits failed in one sweep.
    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    /// Deletion is blocked by resources that still depend on this one.
    #[error("deletion of {subject} is blocked by: {dependents}")]
    DependencyBlocked { subject: String, dependents: String },

    /// A referenced resource record does not exist.
    #[error("{kind} {namespace}/{name} not found")]
    ReferenceNotFound {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    /// The remote or a referenced record is not in a usable state yet.
    #[error("{0}")]
    NotReady(String),

    /// A referenced credential secret could not be resolved.
    #[error(transparent)]
    Credentials(#[from] CredentialError),

    /// The store rejected a read or write.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ReconcileError {
    /// Wrap a remote failure with the operation it happened in.
    pub fn remote(context: impl Into<String>, source: RemoteError) -> Self {
        ReconcileError::RemoteSync {
            context: context.into(),
            source,
        }
    }

    pub fn reference_not_found(kind: &'static str, key: &ObjectKey) -> Self {
        ReconcileError::ReferenceNotFound {
            kind,
            namespace: key.namespace.clone(),
            name: key.name.clone(),
        }
    }

    /// Whether this is an optimistic-concurrency loss worth a quiet retry.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ReconcileError::Store(err) if err.is_conflict())
    }

    /// Whether a referenced record was missing. Teardown paths treat a
    /// vanished reference as already-clean rather than as a blocker.
    pub fn is_reference_not_found(&self) -> bool {
        matches!(self, ReconcileError::ReferenceNotFound { .. })
    }
}

/// Collects every failure from a collection sweep.
///
/// Appliers run all adds and removes before reporting, so one failing edit
/// never hides the rest; the combined message enumerates each failure.
#[derive(Debug, Default, Error)]
#[error("{} of {} changes failed: {}", .failures.len(), .attempted, .failures.join("; "))]
pub struct AggregateError {
    attempted: usize,
    failures: Vec<String>,
}

impl AggregateError {
    /// Note an attempted edit that succeeded.
    pub fn succeeded(&mut self) {
        self.attempted += 1;
    }

    /// Note an attempted edit that failed.
    pub fn failed(&mut self, failure: impl Into<String>) {
        self.attempted += 1;
        self.failures.push(failure.into());
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Resolve the sweep: `Ok` when every edit landed.
    pub fn into_result(self) -> std::result::Result<(), AggregateError> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// Result type for reconciliation operations
pub type Result<T> = std::result::Result<T, ReconcileError>;
