//! User records
//!
//! A User declares a remote account on one server. The account's username
//! and password live in the referenced secret; the spec lists the remote
//! roles the account should hold.

use serde::{Deserialize, Serialize};

use crate::{Condition, ObjectMeta, Resource, ResourceRef, SecretRef, ValidationError};

/// A remote user account and its declared role memberships.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub metadata: ObjectMeta,
    pub spec: UserSpec,

    #[serde(default)]
    pub status: UserStatus,
}

impl User {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, spec: UserSpec) -> Self {
        Self {
            metadata: ObjectMeta::named(namespace, name),
            spec,
            status: UserStatus::default(),
        }
    }
}

/// Desired state of a User.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSpec {
    /// Server the account lives on
    pub server_ref: ResourceRef,

    /// Secret holding the account's username and password
    pub credentials_ref: SecretRef,

    /// Remote role names the account should be a member of
    #[serde(default)]
    pub roles: Vec<String>,
}

impl UserSpec {
    /// Validate the spec.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.server_ref.name.is_empty() {
            return Err(ValidationError::MissingReference {
                field: "server_ref",
            });
        }
        if self.credentials_ref.name.is_empty() {
            return Err(ValidationError::MissingReference {
                field: "credentials_ref",
            });
        }
        for (index, role) in self.roles.iter().enumerate() {
            if role.is_empty() {
                return Err(ValidationError::EmptyRoleMembership { index });
            }
        }
        Ok(())
    }
}

/// Observed state of a User.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Username of the remote account, recorded once created so teardown
    /// can find the account even after the credential secret is gone
    #[serde(default)]
    pub remote_username: Option<String>,
}

impl Resource for User {
    const KIND: &'static str = "User";

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
