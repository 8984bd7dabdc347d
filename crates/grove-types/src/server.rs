//! Server records
//!
//! A Server describes one remote graph-database server: where it listens and
//! which secret holds its administrator credentials. Every other record kind
//! reaches the remote side through a Server reference.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Condition, ObjectMeta, Resource, SecretRef, ValidationError};

/// One remote graph-database server under management.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    pub metadata: ObjectMeta,
    pub spec: ServerSpec,

    #[serde(default)]
    pub status: ServerStatus,
}

impl Server {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        spec: ServerSpec,
    ) -> Self {
        Self {
            metadata: ObjectMeta::named(namespace, name),
            spec,
            status: ServerStatus::default(),
        }
    }
}

/// Desired state of a Server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSpec {
    /// Base URL of the remote administration API
    pub url: String,

    /// Secret holding the administrator username and password
    pub admin_credentials_ref: SecretRef,
}

impl ServerSpec {
    /// Validate the spec.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.is_empty() {
            return Err(ValidationError::EmptyServerUrl);
        }
        let parsed = Url::parse(&self.url).map_err(|source| ValidationError::InvalidServerUrl {
            url: self.url.clone(),
            source,
        })?;
        if parsed.host_str().is_none() {
            return Err(ValidationError::InvalidServerUrl {
                url: self.url.clone(),
                source: url::ParseError::EmptyHost,
            });
        }
        if self.admin_credentials_ref.name.is_empty() {
            return Err(ValidationError::MissingReference {
                field: "admin_credentials_ref",
            });
        }
        Ok(())
    }
}

/// Observed state of a Server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl Resource for Server {
    const KIND: &'static str = "Server";

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
