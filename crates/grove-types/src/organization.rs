//! Organization records
//!
//! An Organization scopes access to a slice of a Database: its named graphs.
//! Reconciling one derives a Role granting read and write over the
//! organization's graph identifiers plus a User holding that role, on every
//! server the referenced Database spans.

use serde::{Deserialize, Serialize};

use crate::{Condition, ObjectMeta, Resource, ResourceRef, SecretRef, ValidationError};

/// Deterministic identifier of an organization's named graph.
///
/// `prefix` loses any trailing slashes before the organization and graph
/// segments are appended, so `https://g.example/` and `https://g.example`
/// produce the same identifier.
pub fn named_graph_id(prefix: &str, organization: &str, graph: &str) -> String {
    format!(
        "{}/{}/{}",
        prefix.trim_end_matches('/'),
        organization,
        graph
    )
}

/// An organization's slice of a Database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub metadata: ObjectMeta,
    pub spec: OrganizationSpec,

    #[serde(default)]
    pub status: OrganizationStatus,
}

impl Organization {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        spec: OrganizationSpec,
    ) -> Self {
        Self {
            metadata: ObjectMeta::named(namespace, name),
            spec,
            status: OrganizationStatus::default(),
        }
    }

    /// Name of the derived Role/User pair for `server`.
    pub fn derived_name(&self, server: &str) -> String {
        format!("{}-{}", self.metadata.name, server)
    }
}

/// Desired state of an Organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationSpec {
    /// Organization segment of the named-graph identifiers
    pub organization_name: String,

    /// Database whose named graphs the organization uses
    pub database_ref: ResourceRef,

    /// Graph segments the organization owns
    pub named_graphs: Vec<String>,

    /// Secret for the derived user account
    pub credentials_ref: SecretRef,
}

impl OrganizationSpec {
    /// Validate the spec.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.organization_name.is_empty() {
            return Err(ValidationError::EmptyOrganizationName);
        }
        if self.database_ref.name.is_empty() {
            return Err(ValidationError::MissingReference {
                field: "database_ref",
            });
        }
        if self.named_graphs.is_empty() {
            return Err(ValidationError::NoNamedGraphs);
        }
        for (index, graph) in self.named_graphs.iter().enumerate() {
            if graph.is_empty() {
                return Err(ValidationError::EmptyNamedGraph { index });
            }
        }
        if self.credentials_ref.name.is_empty() {
            return Err(ValidationError::MissingReference {
                field: "credentials_ref",
            });
        }
        Ok(())
    }
}

/// Observed state of an Organization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrganizationStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Servers the organization currently spans
    #[serde(default)]
    pub servers: Vec<String>,
}

impl Resource for Organization {
    const KIND: &'static str = "Organization";

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_id_joins_prefix_org_and_graph() {
        assert_eq!(
            named_graph_id("https://graphs.example", "acme", "inventory"),
            "https://graphs.example/acme/inventory"
        );
    }

    #[test]
    fn graph_id_trims_trailing_slashes_from_prefix() {
        assert_eq!(
            named_graph_id("https://graphs.example/", "acme", "inventory"),
            "https://graphs.example/acme/inventory"
        );
    }

    #[test]
    fn rejects_empty_named_graph_entry() {
        let spec = OrganizationSpec {
            organization_name: "acme".to_string(),
            database_ref: ResourceRef::new("orders"),
            named_graphs: vec!["inventory".to_string(), String::new()],
            credentials_ref: SecretRef::new("acme-creds"),
        };
        assert!(matches!(
            spec.validate(),
            Err(ValidationError::EmptyNamedGraph { index: 1 })
        ));
    }
}
