//! The declarative store trait

use async_trait::async_trait;
use grove_types::{ObjectKey, Resource};

use crate::error::Result;

/// Storage for one kind of resource record.
///
/// Implementations are keyed by (namespace, name) and enforce optimistic
/// concurrency: `update` and `update_status` carry the resource_version the
/// writer last read, and a mismatch fails with a distinguishable Conflict.
///
/// Deletion is two-phased. `delete` marks the record with a deletion
/// timestamp while finalizer markers remain; the record is removed once the
/// last marker clears (usually by an `update` that persists the emptied
/// finalizer list).
#[async_trait]
pub trait ResourceStore<R: Resource>: Send + Sync {
    /// Fetch by key. A missing record is `None`, not an error.
    async fn get(&self, key: &ObjectKey) -> Result<Option<R>>;

    /// List records in a namespace. An empty namespace lists all namespaces.
    async fn list(&self, namespace: &str) -> Result<Vec<R>>;

    /// Store a new record, assigning its uid and initial version.
    async fn create(&self, resource: R) -> Result<R>;

    /// Replace the record; the carried version must match the stored one.
    /// Returns the stored result with its bumped version.
    async fn update(&self, resource: R) -> Result<R>;

    /// Persist the record's status under the same concurrency rule.
    async fn update_status(&self, resource: R) -> Result<R>;

    /// Request deletion: mark the record deleting, or remove it outright
    /// when it carries no finalizers.
    async fn delete(&self, key: &ObjectKey) -> Result<()>;
}
