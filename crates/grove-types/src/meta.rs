//! Object metadata carried by every resource record
//!
//! Identity, optimistic-concurrency versioning, deletion marking, finalizer
//! markers, and ownership links all live here. Kind-specific records embed an
//! [`ObjectMeta`] and expose it through the [`Resource`] trait.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::Condition;

/// Identity of a record within the store: namespace plus name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Link from a derived record back to the record it was derived from.
///
/// Owners and owned records always share a namespace, so the reference
/// carries only kind, name, and the owner's uid when known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerReference {
    pub kind: String,
    pub name: String,

    #[serde(default)]
    pub uid: Option<Uuid>,
}

impl OwnerReference {
    /// Build a reference pointing at `owner`.
    pub fn of<R: Resource>(owner: &R) -> Self {
        Self {
            kind: R::KIND.to_string(),
            name: owner.metadata().name.clone(),
            uid: owner.metadata().uid,
        }
    }

    /// Whether this reference points at the given owner identity.
    ///
    /// Uids are compared only when both sides carry one, so records created
    /// before the owner was assigned a uid still match by kind and name.
    pub fn points_at(&self, kind: &str, name: &str, uid: Option<Uuid>) -> bool {
        if self.kind != kind || self.name != name {
            return false;
        }
        match (self.uid, uid) {
            (Some(own), Some(other)) => own == other,
            _ => true,
        }
    }
}

/// Metadata shared by every resource record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Record name, unique per kind within a namespace
    pub name: String,

    /// Namespace scoping the record and its unqualified references
    pub namespace: String,

    /// Store-assigned identifier, stable across updates
    #[serde(default)]
    pub uid: Option<Uuid>,

    /// Optimistic-concurrency token; the store rejects writes carrying a
    /// stale value and bumps it on every accepted write
    #[serde(default)]
    pub resource_version: u64,

    /// Set once deletion is requested; the record lingers until every
    /// finalizer marker has been cleared
    #[serde(default)]
    pub deletion_timestamp: Option<DateTime<Utc>>,

    /// Teardown markers that must clear before removal
    #[serde(default)]
    pub finalizers: Vec<String>,

    /// Records this one was derived from
    #[serde(default)]
    pub owner_references: Vec<OwnerReference>,
}

impl ObjectMeta {
    /// Fresh metadata for a record that has not been stored yet.
    pub fn named(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.namespace.clone(), self.name.clone())
    }

    /// Whether deletion has been requested.
    pub fn is_deleting(&self) -> bool {
        self.deletion_timestamp.is_some()
    }

    pub fn has_finalizer(&self, marker: &str) -> bool {
        self.finalizers.iter().any(|f| f == marker)
    }

    /// Add the marker if absent. Returns true when the set changed.
    pub fn add_finalizer(&mut self, marker: &str) -> bool {
        if self.has_finalizer(marker) {
            return false;
        }
        self.finalizers.push(marker.to_string());
        true
    }

    /// Remove the marker if present. Returns true when the set changed.
    pub fn remove_finalizer(&mut self, marker: &str) -> bool {
        let before = self.finalizers.len();
        self.finalizers.retain(|f| f != marker);
        self.finalizers.len() != before
    }

    /// Whether any owner reference points at the given owner identity.
    /// Owners are same-namespace only, so callers compare namespaces first.
    pub fn owned_by(&self, kind: &str, name: &str, uid: Option<Uuid>) -> bool {
        self.owner_references
            .iter()
            .any(|r| r.points_at(kind, name, uid))
    }
}

/// Behavior shared by every resource record kind.
///
/// The reconciliation engine is generic over this trait: it reads identity
/// and deletion state through `metadata`, maintains finalizers through
/// `metadata_mut`, and persists condition history through the condition
/// accessors.
pub trait Resource: Clone + Send + Sync + 'static {
    /// Kind label used in keys, owner references, and error messages.
    const KIND: &'static str;

    fn metadata(&self) -> &ObjectMeta;

    fn metadata_mut(&mut self) -> &mut ObjectMeta;

    /// Persisted condition history, one entry per condition type.
    fn conditions(&self) -> &[Condition];

    fn conditions_mut(&mut self) -> &mut Vec<Condition>;

    fn key(&self) -> ObjectKey {
        self.metadata().key()
    }
}
