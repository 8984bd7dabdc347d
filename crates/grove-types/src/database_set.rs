//! DatabaseSet records
//!
//! A DatabaseSet declares a family of Databases by name. Reconciling one
//! derives an owner-referenced Database child per declared name and deletes
//! children whose names left the set.

use serde::{Deserialize, Serialize};

use crate::{Condition, ObjectMeta, Resource, ResourceRef, ValidationError};

/// A declared family of Databases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSet {
    pub metadata: ObjectMeta,
    pub spec: DatabaseSetSpec,

    #[serde(default)]
    pub status: DatabaseSetStatus,
}

impl DatabaseSet {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        spec: DatabaseSetSpec,
    ) -> Self {
        Self {
            metadata: ObjectMeta::named(namespace, name),
            spec,
            status: DatabaseSetStatus::default(),
        }
    }
}

/// Desired state of a DatabaseSet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSetSpec {
    /// Database names the set should contain
    pub database_names: Vec<String>,

    /// Servers every child database should exist on
    pub server_refs: Vec<ResourceRef>,

    /// Named-graph prefix passed through to every child
    pub named_graph_prefix: String,
}

impl DatabaseSetSpec {
    /// Validate the spec.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.database_names.is_empty() {
            return Err(ValidationError::NoDatabaseNames);
        }
        for (index, name) in self.database_names.iter().enumerate() {
            if name.is_empty() {
                return Err(ValidationError::EmptyDatabaseSetEntry { index });
            }
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

/// Observed state of a DatabaseSet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSetStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Child database names currently derived
    #[serde(default)]
    pub databases: Vec<String>,
}

impl Resource for DatabaseSet {
    const KIND: &'static str = "DatabaseSet";

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
