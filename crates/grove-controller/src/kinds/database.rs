//! Database reconciliation
//!
//! A Database is a composite: the remote database is created on every
//! referenced server, and a read and a write Role/User pair is derived per
//! server when the matching credential reference is present. Teardown purges
//! the derived children and drops the remote database everywhere it was
//! recorded.

use std::sync::Arc;

use async_trait::async_trait;
use grove_remote::GraphAdminApi;
use grove_types::{
    AccessMode, Database, Organization, Permission, Resource, ResourceRef, Role, RoleSpec, User,
    UserSpec,
};
use tracing::{debug, info};

use crate::context::ReconcileContext;
use crate::driver::Reconciler;
use crate::error::{AggregateError, ReconcileError, Result};
use crate::finalizer::{run_teardown, TeardownStep};
use crate::gate::check_no_dependents;
use crate::kinds::{ChildSync, Stores};
use crate::resolver::ServerResolver;

/// Clears once the derived Role/User children are purged.
pub const DATABASE_CHILDREN: &str = "grove.io/database-children";

/// Clears once the remote database is dropped on every recorded server.
pub const DATABASE: &str = "grove.io/database";

const MARKERS: &[&str] = &[DATABASE_CHILDREN, DATABASE];

/// Resource type of remote database permissions.
const DATABASE_RESOURCE: &str = "db";

pub struct DatabaseReconciler {
    resolver: Arc<ServerResolver>,
    stores: Stores,
}

impl DatabaseReconciler {
    pub fn new(resolver: Arc<ServerResolver>, stores: Stores) -> Self {
        Self { resolver, stores }
    }

    async fn ensure_remote_database(
        &self,
        database: &Database,
        server_ref: &ResourceRef,
        ctx: &ReconcileContext,
    ) -> Result<()> {
        let binding = self.resolver.resolve(server_ref, &ctx.namespace).await?;
        let name = &database.spec.database_name;

        let known = binding.api.list_databases().await.map_err(|err| {
            ReconcileError::remote(format!("list databases on server {}", binding.server), err)
        })?;
        if !known.iter().any(|db| db == name) {
            binding.api.create_database(name).await.map_err(|err| {
                ReconcileError::remote(
                    format!("create database {name} on server {}", binding.server),
                    err,
                )
            })?;
            info!(database = %name, server = %binding.server, "Created remote database");
        }
        Ok(())
    }

    /// The Role/User pairs the spec calls for, one per server and access
    /// mode whose credential reference is declared.
    fn desired_children(&self, database: &Database) -> (Vec<Role>, Vec<User>) {
        let namespace = &database.metadata.namespace;
        let modes = [
            (AccessMode::Read, &database.spec.read_credentials_ref),
            (AccessMode::Write, &database.spec.write_credentials_ref),
        ];

        let mut roles = Vec::new();
        let mut users = Vec::new();
        for server_ref in &database.spec.server_refs {
            for &(mode, secret_ref) in &modes {
                let Some(secret_ref) = secret_ref else {
                    continue;
                };
                let derived = database.derived_name(&server_ref.name, mode);
                roles.push(Role::new(
                    namespace.clone(),
                    derived.clone(),
                    RoleSpec {
                        server_ref: server_ref.clone(),
                        role_name: None,
                        permissions: vec![Permission::new(
                            mode.action(),
                            DATABASE_RESOURCE,
                            [database.spec.database_name.clone()],
                        )],
                    },
                ));
                users.push(User::new(
                    namespace.clone(),
                    derived.clone(),
                    UserSpec {
                        server_ref: server_ref.clone(),
                        credentials_ref: secret_ref.clone(),
                        roles: vec![derived],
                    },
                ));
            }
        }
        (roles, users)
    }

    /// Servers to drop the remote database on at teardown: every declared
    /// ref plus recorded spans whose ref already left the spec.
    fn drop_targets(&self, database: &Database) -> Vec<ResourceRef> {
        let mut targets = database.spec.server_refs.clone();
        for name in &database.status.servers {
            if !targets.iter().any(|r| &r.name == name) {
                targets.push(ResourceRef::new(name.clone()));
            }
        }
        targets
    }

    async fn drop_on_server(
        resolver: &ServerResolver,
        server_ref: &ResourceRef,
        fallback_namespace: &str,
        name: &str,
    ) -> Result<()> {
        let binding = match resolver.resolve(server_ref, fallback_namespace).await {
            Ok(binding) => binding,
            // A deleted Server record takes its remote reachability with it.
            Err(err) if err.is_reference_not_found() => return Ok(()),
            Err(err) => return Err(err),
        };
        match binding.api.drop_database(name).await {
            Ok(()) => {
                info!(database = %name, server = %binding.server, "Dropped remote database");
                Ok(())
            }
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(ReconcileError::remote(
                format!("drop database {name} on server {}", binding.server),
                err,
            )),
        }
    }
}

#[async_trait]
impl Reconciler for DatabaseReconciler {
    type Resource = Database;

    fn finalizers(&self) -> &'static [&'static str] {
        MARKERS
    }

    fn validate(&self, database: &Database) -> Result<()> {
        database.spec.validate()?;
        Ok(())
    }

    async fn sync(&self, database: &mut Database, ctx: &mut ReconcileContext) -> Result<()> {
        let mut sweep = AggregateError::default();
        let mut spanned = Vec::new();
        for server_ref in &database.spec.server_refs {
            match self.ensure_remote_database(database, server_ref, ctx).await {
                Ok(()) => {
                    sweep.succeeded();
                    spanned.push(server_ref.name.clone());
                }
                Err(err) => sweep.failed(format!("server {server_ref}: {err}")),
            }
        }
        database.status.servers = spanned;

        // Children cover every declared server, reachable or not; each child
        // syncs against its own server independently of this pass.
        let (roles, users) = self.desired_children(database);
        let role_report = ChildSync::new(self.stores.roles.clone(), database)
            .converge(roles)
            .await?;
        let user_report = ChildSync::new(self.stores.users.clone(), database)
            .converge(users)
            .await?;
        if role_report.changed() || user_report.changed() {
            info!(
                database = %database.key(),
                created = role_report.created + user_report.created,
                updated = role_report.updated + user_report.updated,
                deleted = role_report.deleted + user_report.deleted,
                "Converged derived children"
            );
        }

        sweep.into_result()?;
        Ok(())
    }

    async fn teardown(&self, database: &mut Database, ctx: &mut ReconcileContext) -> Result<()> {
        let key = database.key();
        let subject = format!("{} {}", Database::KIND, key);

        // Organizations scope their graphs to this database; they go first.
        check_no_dependents(
            self.stores.organizations.as_ref(),
            "",
            &subject,
            |org: &Organization| {
                org.spec
                    .database_ref
                    .points_at(&org.metadata.namespace, &key)
            },
        )
        .await?;

        let purge_children = TeardownStep::new(DATABASE_CHILDREN, {
            let roles = ChildSync::new(self.stores.roles.clone(), database);
            let users = ChildSync::new(self.stores.users.clone(), database);
            let key = key.clone();
            async move {
                let mut lingering = roles.purge().await?;
                lingering.extend(users.purge().await?);
                if !lingering.is_empty() {
                    // Children still holding finalizers finish their own
                    // remote cleanup; they do not hold the parent back.
                    debug!(
                        database = %key,
                        lingering = lingering.len(),
                        "Derived children still terminating"
                    );
                }
                Ok(())
            }
        });

        let drop_remote = TeardownStep::new(DATABASE, {
            let resolver = self.resolver.clone();
            let namespace = ctx.namespace.clone();
            let name = database.spec.database_name.clone();
            let targets = self.drop_targets(database);
            async move {
                let mut sweep = AggregateError::default();
                for server_ref in &targets {
                    match Self::drop_on_server(&resolver, server_ref, &namespace, &name).await {
                        Ok(()) => sweep.succeeded(),
                        Err(err) => sweep.failed(format!("server {server_ref}: {err}")),
                    }
                }
                sweep.into_result()?;
                Ok(())
            }
        });

        run_teardown(&mut database.metadata, vec![purge_children, drop_remote]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grove_remote::{InMemoryAdminApi, InMemoryCredentialStore};
    use grove_store::{MemoryStore, ResourceStore};
    use grove_types::{DatabaseSpec, ObjectKey, OrganizationSpec, SecretRef, Server, ServerSpec};

    use crate::resolver::StaticConnector;

    struct Harness {
        stores: Stores,
        resolver: Arc<ServerResolver>,
        graph_1: Arc<InMemoryAdminApi>,
        graph_2: Arc<InMemoryAdminApi>,
    }

    async fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let stores = Stores::from_memory(store);

        let secrets = Arc::new(InMemoryCredentialStore::new());
        secrets.insert("prod", "graph-1-admin", "admin", "hunter2");
        secrets.insert("prod", "graph-2-admin", "admin", "hunter2");
        secrets.insert("prod", "orders-read", "orders-reader", "pw");
        secrets.insert("prod", "orders-write", "orders-writer", "pw");

        let graph_1 = Arc::new(InMemoryAdminApi::with_admin("admin", "hunter2"));
        let graph_2 = Arc::new(InMemoryAdminApi::with_admin("admin", "hunter2"));
        let connector = Arc::new(StaticConnector::new());
        connector.route("http://graph-1.internal:5820", graph_1.clone());
        connector.route("http://graph-2.internal:5820", graph_2.clone());

        let resolver = Arc::new(ServerResolver::new(
            stores.servers.clone(),
            secrets,
            connector,
        ));

        for name in ["graph-1", "graph-2"] {
            stores
                .servers
                .create(Server::new(
                    "prod",
                    name,
                    ServerSpec {
                        url: format!("http://{name}.internal:5820"),
                        admin_credentials_ref: SecretRef::new(format!("{name}-admin")),
                    },
                ))
                .await
                .unwrap();
        }

        Harness {
            stores,
            resolver,
            graph_1,
            graph_2,
        }
    }

    fn orders_spec(servers: Vec<&str>) -> DatabaseSpec {
        DatabaseSpec {
            database_name: "orders".to_string(),
            server_refs: servers.into_iter().map(ResourceRef::new).collect(),
            named_graph_prefix: "https://graphs.example".to_string(),
            read_credentials_ref: Some(SecretRef::new("orders-read")),
            write_credentials_ref: Some(SecretRef::new("orders-write")),
        }
    }

    #[tokio::test]
    async fn sync_spans_servers_and_derives_children() {
        let h = harness().await;
        let reconciler = DatabaseReconciler::new(h.resolver, h.stores.clone());

        let mut database = h
            .stores
            .databases
            .create(Database::new(
                "prod",
                "orders",
                orders_spec(vec!["graph-1", "graph-2"]),
            ))
            .await
            .unwrap();

        let mut ctx = ReconcileContext::new("prod");
        reconciler.sync(&mut database, &mut ctx).await.unwrap();

        assert_eq!(database.status.servers, vec!["graph-1", "graph-2"]);
        assert_eq!(h.graph_1.list_databases().await.unwrap(), vec!["orders"]);
        assert_eq!(h.graph_2.list_databases().await.unwrap(), vec!["orders"]);

        let roles = h.stores.roles.list("prod").await.unwrap();
        let users = h.stores.users.list("prod").await.unwrap();
        assert_eq!(roles.len(), 4);
        assert_eq!(users.len(), 4);

        let read_role = roles
            .iter()
            .find(|r| r.metadata.name == "orders-graph-1-read")
            .unwrap();
        assert!(read_role.spec.permissions[0].equivalent(&Permission::new(
            "read",
            "db",
            ["orders"]
        )));
        let write_user = users
            .iter()
            .find(|u| u.metadata.name == "orders-graph-2-write")
            .unwrap();
        assert_eq!(write_user.spec.roles, vec!["orders-graph-2-write"]);
        assert_eq!(write_user.spec.credentials_ref.name, "orders-write");
    }

    #[tokio::test]
    async fn unreachable_server_fails_the_pass_but_children_still_derive() {
        let h = harness().await;
        h.stores
            .servers
            .delete(&ObjectKey::new("prod", "graph-2"))
            .await
            .unwrap();
        let reconciler = DatabaseReconciler::new(h.resolver, h.stores.clone());

        let mut database = h
            .stores
            .databases
            .create(Database::new(
                "prod",
                "orders",
                orders_spec(vec!["graph-1", "graph-2"]),
            ))
            .await
            .unwrap();

        let mut ctx = ReconcileContext::new("prod");
        let err = reconciler.sync(&mut database, &mut ctx).await.unwrap_err();
        assert!(err.to_string().contains("graph-2"));

        // Only the reachable span is recorded, yet children over both
        // servers exist and will converge on their own.
        assert_eq!(database.status.servers, vec!["graph-1"]);
        assert_eq!(h.stores.roles.list("prod").await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn children_of_a_departed_server_are_deleted() {
        let h = harness().await;
        let reconciler = DatabaseReconciler::new(h.resolver, h.stores.clone());

        let mut database = h
            .stores
            .databases
            .create(Database::new(
                "prod",
                "orders",
                orders_spec(vec!["graph-1", "graph-2"]),
            ))
            .await
            .unwrap();
        let mut ctx = ReconcileContext::new("prod");
        reconciler.sync(&mut database, &mut ctx).await.unwrap();

        database.spec = orders_spec(vec!["graph-1"]);
        reconciler.sync(&mut database, &mut ctx).await.unwrap();

        let roles = h.stores.roles.list("prod").await.unwrap();
        assert_eq!(roles.len(), 2);
        assert!(roles.iter().all(|r| r.metadata.name.contains("graph-1")));
        assert_eq!(database.status.servers, vec!["graph-1"]);

        // The spec shrank; nothing is dropped remotely until deletion.
        assert_eq!(h.graph_2.list_databases().await.unwrap(), vec!["orders"]);
    }

    #[tokio::test]
    async fn teardown_is_blocked_by_a_live_organization() {
        let h = harness().await;
        h.stores
            .organizations
            .create(Organization::new(
                "prod",
                "acme",
                OrganizationSpec {
                    organization_name: "acme".to_string(),
                    database_ref: ResourceRef::new("orders"),
                    named_graphs: vec!["inventory".to_string()],
                    credentials_ref: SecretRef::new("acme-creds"),
                },
            ))
            .await
            .unwrap();

        let reconciler = DatabaseReconciler::new(h.resolver, h.stores.clone());
        let mut database = Database::new("prod", "orders", orders_spec(vec!["graph-1"]));
        for marker in MARKERS {
            database.metadata.add_finalizer(marker);
        }

        let mut ctx = ReconcileContext::new("prod");
        let err = reconciler.teardown(&mut database, &mut ctx).await.unwrap_err();
        let text = err.to_string();
        assert!(text.contains("Database prod/orders"));
        assert!(text.contains("Organization prod/acme"));
        assert!(database.metadata.has_finalizer(DATABASE_CHILDREN));
    }

    #[tokio::test]
    async fn teardown_purges_children_and_drops_every_span() {
        let h = harness().await;
        let reconciler = DatabaseReconciler::new(h.resolver, h.stores.clone());

        let mut database = h
            .stores
            .databases
            .create(Database::new(
                "prod",
                "orders",
                orders_spec(vec!["graph-1", "graph-2"]),
            ))
            .await
            .unwrap();
        let mut ctx = ReconcileContext::new("prod");
        reconciler.sync(&mut database, &mut ctx).await.unwrap();
        for marker in MARKERS {
            database.metadata.add_finalizer(marker);
        }

        reconciler.teardown(&mut database, &mut ctx).await.unwrap();

        assert!(database.metadata.finalizers.is_empty());
        assert!(h.stores.roles.list("prod").await.unwrap().is_empty());
        assert!(h.stores.users.list("prod").await.unwrap().is_empty());
        assert!(h.graph_1.list_databases().await.unwrap().is_empty());
        assert!(h.graph_2.list_databases().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn recorded_span_outside_the_spec_is_still_dropped() {
        let h = harness().await;
        let reconciler = DatabaseReconciler::new(h.resolver, h.stores.clone());
        h.graph_2.create_database("orders").await.unwrap();

        let mut database = Database::new("prod", "orders", orders_spec(vec!["graph-1"]));
        database.status.servers = vec!["graph-1".to_string(), "graph-2".to_string()];
        for marker in MARKERS {
            database.metadata.add_finalizer(marker);
        }

        let mut ctx = ReconcileContext::new("prod");
        reconciler.teardown(&mut database, &mut ctx).await.unwrap();
        assert!(h.graph_2.list_databases().await.unwrap().is_empty());
    }
}
