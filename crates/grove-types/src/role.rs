//! Role records
//!
//! A Role declares a remote role on one server together with the exact set
//! of permissions it should hold.

use serde::{Deserialize, Serialize};

use crate::{Condition, ObjectMeta, Permission, Resource, ResourceRef, ValidationError};

/// A remote role and its declared permission set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub metadata: ObjectMeta,
    pub spec: RoleSpec,

    #[serde(default)]
    pub status: RoleStatus,
}

impl Role {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, spec: RoleSpec) -> Self {
        Self {
            metadata: ObjectMeta::named(namespace, name),
            spec,
            status: RoleStatus::default(),
        }
    }

    /// Name of the role on the remote server.
    pub fn remote_name(&self) -> &str {
        self.spec.role_name.as_deref().unwrap_or(&self.metadata.name)
    }
}

/// Desired state of a Role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleSpec {
    /// Server the role lives on
    pub server_ref: ResourceRef,

    /// Remote role name; defaults to the record name
    #[serde(default)]
    pub role_name: Option<String>,

    /// Exact permission set the remote role should hold
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl RoleSpec {
    /// Validate the spec.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.server_ref.name.is_empty() {
            return Err(ValidationError::MissingReference {
                field: "server_ref",
            });
        }
        for (index, permission) in self.permissions.iter().enumerate() {
            if permission.action.is_empty() {
                return Err(ValidationError::EmptyPermissionAction { index });
            }
            if permission.resource_type.is_empty() {
                return Err(ValidationError::EmptyPermissionResourceType { index });
            }
            if permission.resources.is_empty() {
                return Err(ValidationError::EmptyPermissionResources { index });
            }
        }
        Ok(())
    }
}

/// Observed state of a Role.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl Resource for Role {
    const KIND: &'static str = "Role";

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
    fn rejects_permission_without_resources() {
        let spec = RoleSpec {
            server_ref: ResourceRef::new("graph-1"),
            role_name: None,
            permissions: vec![Permission::new("read", "db", Vec::<String>::new())],
        };
        assert!(matches!(
            spec.validate(),
            Err(ValidationError::EmptyPermissionResources { index: 0 })
        ));
    }

    #[test]
    fn remote_name_defaults_to_record_name() {
        let role = Role::new(
            "prod",
            "readers",
            RoleSpec {
                server_ref: ResourceRef::new("graph-1"),
                role_name: None,
                permissions: Vec::new(),
            },
        );
        assert_eq!(role.remote_name(), "readers");

        let mut renamed = role.clone();
        renamed.spec.role_name = Some("db-readers".to_string());
        assert_eq!(renamed.remote_name(), "db-readers");
    }
}
