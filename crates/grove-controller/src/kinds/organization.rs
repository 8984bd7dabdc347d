//! Organization reconciliation
//!
//! An Organization derives a Role/User pair on every server its referenced
//! Database spans. The Role grants read and write over the organization's
//! named-graph identifiers; all remote convergence happens through the
//! derived children's own reconcilers.

use async_trait::async_trait;
use grove_store::ResourceStore;
use grove_types::{
    named_graph_id, Database, Organization, Permission, Resource, Role, RoleSpec, User, UserSpec,
};
use tracing::{debug, info};

use crate::context::ReconcileContext;
use crate::driver::Reconciler;
use crate::error::{ReconcileError, Result};
use crate::finalizer::{run_teardown, TeardownStep};
use crate::kinds::{ChildSync, Stores};

/// Clears once the derived Role/User children are purged.
pub const ORGANIZATION_CHILDREN: &str = "grove.io/organization-children";

const MARKERS: &[&str] = &[ORGANIZATION_CHILDREN];

/// Resource type of remote named-graph permissions.
const NAMED_GRAPH_RESOURCE: &str = "named-graph";

pub struct OrganizationReconciler {
    stores: Stores,
}

impl OrganizationReconciler {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// Graph identifiers the organization owns under the database's prefix.
    fn graph_ids(organization: &Organization, database: &Database) -> Vec<String> {
        organization
            .spec
            .named_graphs
            .iter()
            .map(|graph| {
                named_graph_id(
                    &database.spec.named_graph_prefix,
                    &organization.spec.organization_name,
                    graph,
                )
            })
            .collect()
    }
}

#[async_trait]
impl Reconciler for OrganizationReconciler {
    type Resource = Organization;

    fn finalizers(&self) -> &'static [&'static str] {
        MARKERS
    }

    fn validate(&self, organization: &Organization) -> Result<()> {
        organization.spec.validate()?;
        Ok(())
    }

    async fn sync(
        &self,
        organization: &mut Organization,
        ctx: &mut ReconcileContext,
    ) -> Result<()> {
        let db_key = organization
            .spec
            .database_ref
            .object_key(&ctx.namespace);
        let database = self
            .stores
            .databases
            .get(&db_key)
            .await?
            .ok_or_else(|| ReconcileError::reference_not_found(Database::KIND, &db_key))?;

        // Only servers the database actually reached get a pair; the rest
        // join on a later pass once the Database record spans them.
        let spanned: Vec<_> = database
            .spec
            .server_refs
            .iter()
            .filter(|r| database.status.servers.contains(&r.name))
            .collect();
        if spanned.is_empty() {
            return Err(ReconcileError::NotReady(format!(
                "Database {db_key} does not span any server yet"
            )));
        }

        let ids = Self::graph_ids(organization, &database);
        let permissions = vec![
            Permission::new("read", NAMED_GRAPH_RESOURCE, ids.clone()),
            Permission::new("write", NAMED_GRAPH_RESOURCE, ids),
        ];

        let namespace = organization.metadata.namespace.clone();
        let mut roles = Vec::new();
        let mut users = Vec::new();
        for server_ref in &spanned {
            let derived = organization.derived_name(&server_ref.name);
            roles.push(Role::new(
                namespace.clone(),
                derived.clone(),
                RoleSpec {
                    server_ref: (*server_ref).clone(),
                    role_name: None,
                    permissions: permissions.clone(),
                },
            ));
            users.push(User::new(
                namespace.clone(),
                derived.clone(),
                UserSpec {
                    server_ref: (*server_ref).clone(),
                    credentials_ref: organization.spec.credentials_ref.clone(),
                    roles: vec![derived],
                },
            ));
        }

        let role_report = ChildSync::new(self.stores.roles.clone(), organization)
            .converge(roles)
            .await?;
        let user_report = ChildSync::new(self.stores.users.clone(), organization)
            .converge(users)
            .await?;
        if role_report.changed() || user_report.changed() {
            info!(
                organization = %organization.key(),
                created = role_report.created + user_report.created,
                updated = role_report.updated + user_report.updated,
                deleted = role_report.deleted + user_report.deleted,
                "Converged derived children"
            );
        }

        organization.status.servers = spanned.iter().map(|r| r.name.clone()).collect();
        Ok(())
    }

    async fn teardown(
        &self,
        organization: &mut Organization,
        _ctx: &mut ReconcileContext,
    ) -> Result<()> {
        let purge_children = TeardownStep::new(ORGANIZATION_CHILDREN, {
            let roles = ChildSync::new(self.stores.roles.clone(), organization);
            let users = ChildSync::new(self.stores.users.clone(), organization);
            let key = organization.key();
            async move {
                let mut lingering = roles.purge().await?;
                lingering.extend(users.purge().await?);
                if !lingering.is_empty() {
                    debug!(
                        organization = %key,
                        lingering = lingering.len(),
                        "Derived children still terminating"
                    );
                }
                Ok(())
            }
        });

        run_teardown(&mut organization.metadata, vec![purge_children]).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use grove_store::MemoryStore;
    use grove_types::{DatabaseSpec, OrganizationSpec, ResourceRef, SecretRef};

    async fn harness() -> Stores {
        Stores::from_memory(Arc::new(MemoryStore::new()))
    }

    async fn spanned_database(stores: &Stores, servers: Vec<&str>, spanned: Vec<&str>) {
        let mut database = stores
            .databases
            .create(Database::new(
                "prod",
                "orders",
                DatabaseSpec {
                    database_name: "orders".to_string(),
                    server_refs: servers.into_iter().map(ResourceRef::new).collect(),
                    named_graph_prefix: "https://graphs.example/".to_string(),
                    read_credentials_ref: None,
                    write_credentials_ref: None,
                },
            ))
            .await
            .unwrap();
        database.status.servers = spanned.into_iter().map(String::from).collect();
        stores.databases.update_status(database).await.unwrap();
    }

    fn acme() -> Organization {
        Organization::new(
            "prod",
            "acme",
            OrganizationSpec {
                organization_name: "acme".to_string(),
                database_ref: ResourceRef::new("orders"),
                named_graphs: vec!["inventory".to_string(), "catalog".to_string()],
                credentials_ref: SecretRef::new("acme-creds"),
            },
        )
    }

    #[tokio::test]
    async fn sync_derives_a_pair_per_spanned_server() {
        let stores = harness().await;
        spanned_database(&stores, vec!["graph-1", "graph-2"], vec!["graph-1", "graph-2"]).await;
        let mut organization = stores.organizations.create(acme()).await.unwrap();

        let reconciler = OrganizationReconciler::new(stores.clone());
        let mut ctx = ReconcileContext::new("prod");
        reconciler.sync(&mut organization, &mut ctx).await.unwrap();

        assert_eq!(organization.status.servers, vec!["graph-1", "graph-2"]);

        let roles = stores.roles.list("prod").await.unwrap();
        assert_eq!(roles.len(), 2);
        let role = roles
            .iter()
            .find(|r| r.metadata.name == "acme-graph-1")
            .unwrap();
        assert_eq!(role.spec.permissions.len(), 2);
        assert!(role.spec.permissions[0].equivalent(&Permission::new(
            "read",
            "named-graph",
            [
                "https://graphs.example/acme/inventory",
                "https://graphs.example/acme/catalog",
            ],
        )));

        let users = stores.users.list("prod").await.unwrap();
        let user = users
            .iter()
            .find(|u| u.metadata.name == "acme-graph-2")
            .unwrap();
        assert_eq!(user.spec.roles, vec!["acme-graph-2"]);
        assert_eq!(user.spec.credentials_ref.name, "acme-creds");
    }

    #[tokio::test]
    async fn waits_until_the_database_spans_a_server() {
        let stores = harness().await;
        spanned_database(&stores, vec!["graph-1"], vec![]).await;
        let mut organization = stores.organizations.create(acme()).await.unwrap();

        let reconciler = OrganizationReconciler::new(stores.clone());
        let mut ctx = ReconcileContext::new("prod");
        let err = reconciler
            .sync(&mut organization, &mut ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not span any server yet"));
        assert!(stores.roles.list("prod").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_database_reports_the_broken_reference() {
        let stores = harness().await;
        let mut organization = stores.organizations.create(acme()).await.unwrap();

        let reconciler = OrganizationReconciler::new(stores.clone());
        let mut ctx = ReconcileContext::new("prod");
        let err = reconciler
            .sync(&mut organization, &mut ctx)
            .await
            .unwrap_err();
        assert!(err.is_reference_not_found());
        assert!(err.to_string().contains("Database prod/orders"));
    }

    #[tokio::test]
    async fn teardown_purges_the_derived_pairs() {
        let stores = harness().await;
        spanned_database(&stores, vec!["graph-1"], vec!["graph-1"]).await;
        let mut organization = stores.organizations.create(acme()).await.unwrap();

        let reconciler = OrganizationReconciler::new(stores.clone());
        let mut ctx = ReconcileContext::new("prod");
        reconciler.sync(&mut organization, &mut ctx).await.unwrap();
        assert_eq!(stores.roles.list("prod").await.unwrap().len(), 1);

        organization.metadata.add_finalizer(ORGANIZATION_CHILDREN);
        reconciler
            .teardown(&mut organization, &mut ctx)
            .await
            .unwrap();

        assert!(organization.metadata.finalizers.is_empty());
        assert!(stores.roles.list("prod").await.unwrap().is_empty());
        assert!(stores.users.list("prod").await.unwrap().is_empty());
    }
}
