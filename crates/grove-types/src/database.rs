//! Database records
//!
//! A Database is a composite: reconciling one creates the named remote
//! database on every referenced server and, when credential references are
//! present, derives one read and one write Role/User pair per server. The
//! derived records carry an owner reference back to the Database.

use serde::{Deserialize, Serialize};

use crate::{Condition, ObjectMeta, Resource, ResourceRef, SecretRef, ValidationError};

/// A database spanning one or more servers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Database {
    pub metadata: ObjectMeta,
    pub spec: DatabaseSpec,

    #[serde(default)]
    pub status: DatabaseStatus,
}

impl Database {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        spec: DatabaseSpec,
    ) -> Self {
        Self {
            metadata: ObjectMeta::named(namespace, name),
            spec,
            status: DatabaseStatus::default(),
        }
    }

    /// Name of the derived record for `server` in the given access mode,
    /// e.g. `orders-graph-1-read`.
    pub fn derived_name(&self, server: &str, mode: AccessMode) -> String {
        format!("{}-{}-{}", self.metadata.name, server, mode.suffix())
    }
}

/// Access mode of a derived Role/User pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessMode {
    Read,
    Write,
}

impl AccessMode {
    pub fn suffix(self) -> &'static str {
        match self {
            AccessMode::Read => "read",
            AccessMode::Write => "write",
        }
    }

    /// Remote permission action this mode grants.
    pub fn action(self) -> &'static str {
        match self {
            AccessMode::Read => "read",
            AccessMode::Write => "write",
        }
    }
}

/// Desired state of a Database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSpec {
    /// Name of the database on the remote servers
    pub database_name: String,

    /// Servers the database should exist on
    pub server_refs: Vec<ResourceRef>,

    /// Prefix organization named-graph identifiers derive from
    pub named_graph_prefix: String,

    /// Secret for the derived read account; no read pair is derived when absent
    #[serde(default)]
    pub read_credentials_ref: Option<SecretRef>,

    /// Secret for the derived write account; no write pair is derived when absent
    #[serde(default)]
    pub write_credentials_ref: Option<SecretRef>,
}

impl DatabaseSpec {
    /// Validate the spec.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.database_name.is_empty() {
            return Err(ValidationError::EmptyDatabaseName);
        }
        if self.server_refs.is_empty() {
            return Err(ValidationError::NoServerRefs);
        }
        if self.server_refs.iter().any(|r| r.name.is_empty()) {
            return Err(ValidationError::MissingReference {
                field: "server_refs",
            });
        }
        if self.named_graph_prefix.is_empty() {
            return Err(ValidationError::EmptyNamedGraphPrefix);
        }
        Ok(())
    }
}

/// Observed state of a Database.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Servers the database currently spans
    #[serde(default)]
    pub servers: Vec<String>,
}

impl Resource for Database {
    const KIND: &'static str = "Database";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }

    fn conditions(&self) -> &[Condition] {
        &self.status.conditions
    }

    fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        &mut self.status.conditions
    }
}
