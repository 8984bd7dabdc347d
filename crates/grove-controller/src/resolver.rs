//! Cross-resource reference resolution
//!
//! Every kind reaches its remote server the same way: follow the server
//! reference to a Server record, resolve that record's admin secret, and open
//! an authenticated handle through the [`Connector`] seam. Tests plug in
//! static routes to in-memory servers; the daemon plugs in HTTP.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use grove_remote::{CredentialStore, Credentials, GraphAdminApi, RemoteError};
use grove_store::ResourceStore;
use grove_types::{ObjectKey, Resource, ResourceRef, SecretRef, Server};

use crate::error::{ReconcileError, Result};

/// Remote admin handle bound to one server record.
#[derive(Clone)]
pub struct ServerBinding {
    /// Key of the Server record the handle points at.
    pub server: ObjectKey,

    /// Username the handle authenticates as.
    pub admin_user: String,

    /// The authenticated remote handle.
    pub api: Arc<dyn GraphAdminApi>,
}

impl fmt::Debug for ServerBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerBinding")
            .field("server", &self.server)
            .field("admin_user", &self.admin_user)
            .finish_non_exhaustive()
    }
}

/// Opens remote admin connections.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        url: &str,
        credentials: &Credentials,
    ) -> std::result::Result<Arc<dyn GraphAdminApi>, RemoteError>;
}

/// Connector returning pre-registered handles keyed by exact URL.
#[derive(Default)]
pub struct StaticConnector {
    routes: DashMap<String, Arc<dyn GraphAdminApi>>,
}

impl StaticConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handle served for `url`.
    pub fn route(&self, url: impl Into<String>, api: Arc<dyn GraphAdminApi>) {
        self.routes.insert(url.into(), api);
    }
}

#[async_trait]
impl Connector for StaticConnector {
    async fn connect(
        &self,
        url: &str,
        _credentials: &Credentials,
    ) -> std::result::Result<Arc<dyn GraphAdminApi>, RemoteError> {
        self.routes
            .get(url)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RemoteError::not_found(format!("no route for {url}")))
    }
}

/// Resolves server references into authenticated remote bindings.
pub struct ServerResolver {
    servers: Arc<dyn ResourceStore<Server>>,
    credentials: Arc<dyn CredentialStore>,
    connector: Arc<dyn Connector>,
}

impl ServerResolver {
    pub fn new(
        servers: Arc<dyn ResourceStore<Server>>,
        credentials: Arc<dyn CredentialStore>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            servers,
            credentials,
            connector,
        }
    }

    /// Follow `server_ref` to a binding, resolving an unqualified reference
    /// in `fallback_namespace`.
    pub async fn resolve(
        &self,
        server_ref: &ResourceRef,
        fallback_namespace: &str,
    ) -> Result<ServerBinding> {
        let key = server_ref.object_key(fallback_namespace);
        let server = self
            .servers
            .get(&key)
            .await?
            .ok_or_else(|| ReconcileError::reference_not_found(Server::KIND, &key))?;
        self.bind(&server).await
    }

    /// Bind to a server record already in hand.
    ///
    /// The admin secret resolves in the server's own namespace when the
    /// reference leaves it unqualified. Failures carry the server key since
    /// their text surfaces in status conditions of whatever referenced it.
    pub async fn bind(&self, server: &Server) -> Result<ServerBinding> {
        let key = server.key();
        let secret = &server.spec.admin_credentials_ref;
        let credentials = self
            .credentials
            .resolve(secret.namespace_or(&key.namespace), &secret.name)
            .await?;

        let api = self
            .connector
            .connect(&server.spec.url, &credentials)
            .await
            .map_err(|err| ReconcileError::remote(format!("connect to server {key}"), err))?;

        Ok(ServerBinding {
            server: key,
            admin_user: credentials.username,
            api,
        })
    }

    /// Resolve an arbitrary credential secret against `fallback_namespace`.
    pub async fn secret(
        &self,
        secret_ref: &SecretRef,
        fallback_namespace: &str,
    ) -> Result<Credentials> {
        Ok(self
            .credentials
            .resolve(secret_ref.namespace_or(fallback_namespace), &secret_ref.name)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grove_remote::{InMemoryAdminApi, InMemoryCredentialStore};
    use grove_store::MemoryStore;
    use grove_types::{SecretRef, ServerSpec};

    fn fixture() -> (
        Arc<dyn ResourceStore<Server>>,
        Arc<InMemoryCredentialStore>,
        Arc<StaticConnector>,
        ServerResolver,
    ) {
        let store = Arc::new(MemoryStore::new());
        let servers: Arc<dyn ResourceStore<Server>> = store;
        let credentials = Arc::new(InMemoryCredentialStore::new());
        let connector = Arc::new(StaticConnector::new());
        let resolver = ServerResolver::new(
            servers.clone(),
            credentials.clone(),
            connector.clone(),
        );
        (servers, credentials, connector, resolver)
    }

    #[tokio::test]
    async fn resolves_reference_to_a_bound_handle() {
        let (servers, credentials, connector, resolver) = fixture();

        let api: Arc<InMemoryAdminApi> = Arc::new(InMemoryAdminApi::with_admin("admin", "hunter2"));
        connector.route("http://graph-1.internal:5820", api.clone());
        credentials.insert("prod", "graph-1-admin", "admin", "hunter2");
        servers
            .create(Server::new(
                "prod",
                "graph-1",
                ServerSpec {
                    url: "http://graph-1.internal:5820".to_string(),
                    admin_credentials_ref: SecretRef::new("graph-1-admin"),
                },
            ))
            .await
            .unwrap();

        let binding = resolver
            .resolve(&ResourceRef::new("graph-1"), "prod")
            .await
            .unwrap();
        assert_eq!(binding.server, ObjectKey::new("prod", "graph-1"));
        assert_eq!(binding.admin_user, "admin");
        assert!(binding.api.user_enabled("admin").await.unwrap());
    }

    #[tokio::test]
    async fn missing_server_record_is_a_reference_error() {
        let (_servers, _credentials, _connector, resolver) = fixture();

        let err = resolver
            .resolve(&ResourceRef::new("ghost"), "prod")
            .await
            .unwrap_err();
        assert!(err.is_reference_not_found());
        assert!(err.to_string().contains("Server prod/ghost"));
    }

    #[tokio::test]
    async fn missing_admin_secret_is_a_credential_error() {
        let (servers, _credentials, _connector, resolver) = fixture();

        servers
            .create(Server::new(
                "prod",
                "graph-1",
                ServerSpec {
                    url: "http://graph-1.internal:5820".to_string(),
                    admin_credentials_ref: SecretRef::new("graph-1-admin"),
                },
            ))
            .await
            .unwrap();

        let err = resolver
            .resolve(&ResourceRef::new("graph-1"), "prod")
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Credentials(_)));
        assert!(err.to_string().contains("graph-1-admin"));
    }
}
