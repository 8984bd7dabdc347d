//! DatabaseSet reconciliation
//!
//! A DatabaseSet declares a family of Databases by name: one owner-referenced
//! Database child per declared name, each carrying the set's server refs and
//! named-graph prefix. Names leaving the set delete their children.

use async_trait::async_trait;
use grove_types::{Database, DatabaseSet, DatabaseSpec, Resource};
use tracing::{debug, info};

use crate::context::ReconcileContext;
use crate::driver::Reconciler;
use crate::error::Result;
use crate::finalizer::{run_teardown, TeardownStep};
use crate::kinds::{ChildSync, Stores};

/// Clears once the derived Database children are purged.
pub const DATABASE_SET_CHILDREN: &str = "grove.io/databaseset-children";

const MARKERS: &[&str] = &[DATABASE_SET_CHILDREN];

pub struct DatabaseSetReconciler {
    stores: Stores,
}

impl DatabaseSetReconciler {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }
}

#[async_trait]
impl Reconciler for DatabaseSetReconciler {
    type Resource = DatabaseSet;

    fn finalizers(&self) -> &'static [&'static str] {
        MARKERS
    }

    fn validate(&self, set: &DatabaseSet) -> Result<()> {
        set.spec.validate()?;
        Ok(())
    }

    async fn sync(&self, set: &mut DatabaseSet, _ctx: &mut ReconcileContext) -> Result<()> {
        let namespace = set.metadata.namespace.clone();
        let desired = set
            .spec
            .database_names
            .iter()
            .map(|name| {
                Database::new(
                    namespace.clone(),
                    name.clone(),
                    DatabaseSpec {
                        database_name: name.clone(),
                        server_refs: set.spec.server_refs.clone(),
                        named_graph_prefix: set.spec.named_graph_prefix.clone(),
                        read_credentials_ref: None,
                        write_credentials_ref: None,
                    },
                )
            })
            .collect();

        let report = ChildSync::new(self.stores.databases.clone(), set)
            .converge(desired)
            .await?;
        if report.changed() {
            info!(
                set = %set.key(),
                created = report.created,
                updated = report.updated,
                deleted = report.deleted,
                "Converged database children"
            );
        }

        set.status.databases = set.spec.database_names.clone();
        Ok(())
    }

    async fn teardown(&self, set: &mut DatabaseSet, _ctx: &mut ReconcileContext) -> Result<()> {
        let purge_children = TeardownStep::new(DATABASE_SET_CHILDREN, {
            let databases = ChildSync::new(self.stores.databases.clone(), set);
            let key = set.key();
            async move {
                let lingering = databases.purge().await?;
                if !lingering.is_empty() {
                    // Children dropping their remote databases hold their own
                    // finalizers; the set does not wait for them.
                    debug!(
                        set = %key,
                        lingering = lingering.len(),
                        "Database children still terminating"
                    );
                }
                Ok(())
            }
        });

        run_teardown(&mut set.metadata, vec![purge_children]).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use grove_store::{MemoryStore, ResourceStore};
    use grove_types::{DatabaseSetSpec, ResourceRef};

    fn test_set(names: Vec<&str>, servers: Vec<&str>) -> DatabaseSet {
        DatabaseSet::new(
            "prod",
            "tenants",
            DatabaseSetSpec {
                database_names: names.into_iter().map(String::from).collect(),
                server_refs: servers.into_iter().map(ResourceRef::new).collect(),
                named_graph_prefix: "https://graphs.example".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn sync_derives_a_database_per_declared_name() {
        let stores = Stores::from_memory(Arc::new(MemoryStore::new()));
        let mut set = stores
            .database_sets
            .create(test_set(vec!["orders", "billing"], vec!["graph-1"]))
            .await
            .unwrap();

        let reconciler = DatabaseSetReconciler::new(stores.clone());
        let mut ctx = ReconcileContext::new("prod");
        reconciler.sync(&mut set, &mut ctx).await.unwrap();

        assert_eq!(set.status.databases, vec!["orders", "billing"]);

        let children = stores.databases.list("prod").await.unwrap();
        assert_eq!(children.len(), 2);
        let orders = children
            .iter()
            .find(|d| d.metadata.name == "orders")
            .unwrap();
        assert_eq!(orders.spec.database_name, "orders");
        assert_eq!(orders.spec.server_refs, vec![ResourceRef::new("graph-1")]);
        assert_eq!(orders.spec.named_graph_prefix, "https://graphs.example");
        assert!(orders.spec.read_credentials_ref.is_none());
    }

    #[tokio::test]
    async fn names_leaving_the_set_delete_their_children() {
        let stores = Stores::from_memory(Arc::new(MemoryStore::new()));
        let mut set = stores
            .database_sets
            .create(test_set(vec!["orders", "billing"], vec!["graph-1"]))
            .await
            .unwrap();

        let reconciler = DatabaseSetReconciler::new(stores.clone());
        let mut ctx = ReconcileContext::new("prod");
        reconciler.sync(&mut set, &mut ctx).await.unwrap();

        set.spec.database_names = vec!["orders".to_string()];
        reconciler.sync(&mut set, &mut ctx).await.unwrap();

        let children = stores.databases.list("prod").await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].metadata.name, "orders");
        assert_eq!(set.status.databases, vec!["orders"]);
    }

    #[tokio::test]
    async fn widening_the_server_refs_updates_every_child() {
        let stores = Stores::from_memory(Arc::new(MemoryStore::new()));
        let mut set = stores
            .database_sets
            .create(test_set(vec!["orders", "billing"], vec!["graph-1"]))
            .await
            .unwrap();

        let reconciler = DatabaseSetReconciler::new(stores.clone());
        let mut ctx = ReconcileContext::new("prod");
        reconciler.sync(&mut set, &mut ctx).await.unwrap();

        set.spec.server_refs.push(ResourceRef::new("graph-2"));
        reconciler.sync(&mut set, &mut ctx).await.unwrap();

        let children = stores.databases.list("prod").await.unwrap();
        assert!(children.iter().all(|d| d.spec.server_refs.len() == 2));
    }

    #[tokio::test]
    async fn teardown_purges_the_children() {
        let stores = Stores::from_memory(Arc::new(MemoryStore::new()));
        let mut set = stores
            .database_sets
            .create(test_set(vec!["orders"], vec!["graph-1"]))
            .await
            .unwrap();

        let reconciler = DatabaseSetReconciler::new(stores.clone());
        let mut ctx = ReconcileContext::new("prod");
        reconciler.sync(&mut set, &mut ctx).await.unwrap();
        assert_eq!(stores.databases.list("prod").await.unwrap().len(), 1);

        set.metadata.add_finalizer(DATABASE_SET_CHILDREN);
        reconciler.teardown(&mut set, &mut ctx).await.unwrap();

        assert!(set.metadata.finalizers.is_empty());
        assert!(stores.databases.list("prod").await.unwrap().is_empty());
    }
}
