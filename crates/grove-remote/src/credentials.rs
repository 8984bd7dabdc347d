//! Credential resolution
//!
//! Secrets live outside Grove; the engine only ever asks for a username and
//! password by (namespace, secret name). The in-memory store is suitable for
//! development and testing.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// A resolved username/password pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

// Passwords stay out of logs and error text.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Credential resolution errors
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Secret {namespace}/{name} not found")]
    SecretNotFound { namespace: String, name: String },

    #[error("Secret {namespace}/{name} is missing the {field} field")]
    MissingField {
        namespace: String,
        name: String,
        field: &'static str,
    },
}

/// Source of usernames and passwords, keyed by (namespace, secret name).
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Resolve a secret to credentials. Both fields are required; a secret
    /// lacking either fails with the missing field named.
    async fn resolve(&self, namespace: &str, name: &str)
        -> Result<Credentials, CredentialError>;
}

/// In-memory credential store for development and testing.
pub struct InMemoryCredentialStore {
    secrets: DashMap<(String, String), HashMap<String, String>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self {
            secrets: DashMap::new(),
        }
    }

    /// Store a complete username/password secret.
    pub fn insert(&self, namespace: &str, name: &str, username: &str, password: &str) {
        let mut fields = HashMap::new();
        fields.insert("username".to_string(), username.to_string());
        fields.insert("password".to_string(), password.to_string());
        self.insert_fields(namespace, name, fields);
    }

    /// Store a secret with arbitrary fields, e.g. to exercise missing-field
    /// handling.
    pub fn insert_fields(&self, namespace: &str, name: &str, fields: HashMap<String, String>) {
        self.secrets
            .insert((namespace.to_string(), name.to_string()), fields);
    }
}

impl Default for InMemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn resolve(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Credentials, CredentialError> {
        let key = (namespace.to_string(), name.to_string());
        let fields = self
            .secrets
            .get(&key)
            .ok_or_else(|| CredentialError::SecretNotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })?;

        let field = |field: &'static str| {
            fields
                .get(field)
                .filter(|v| !v.is_empty())
                .cloned()
                .ok_or_else(|| CredentialError::MissingField {
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                    field,
                })
        };

        Ok(Credentials {
            username: field("username")?,
            password: field("password")?,
        })
    }
}
