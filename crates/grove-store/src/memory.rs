//! In-memory store implementation
//!
//! Suitable for development and testing. Production deployments should back
//! [`ResourceStore`] with a persistent system.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use grove_types::{
    Database, DatabaseSet, ObjectKey, ObjectMeta, Organization, Resource, Role, Server, User,
};
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::store::ResourceStore;

/// In-memory record store covering every Grove kind.
///
/// Deletion is finalizer-aware: `delete` marks a record and removal waits for
/// the last finalizer to clear. Removal garbage-collects owner-referenced
/// records across kinds: children are marked deleting, and children without
/// finalizers are removed outright, recursively.
///
/// A single version counter spans all kinds, so resource versions are unique
/// store-wide. Status writes replace the whole record; with one writer per
/// resource this matches subresource semantics.
pub struct MemoryStore {
    servers: Bucket<Server>,
    roles: Bucket<Role>,
    users: Bucket<User>,
    databases: Bucket<Database>,
    organizations: Bucket<Organization>,
    database_sets: Bucket<DatabaseSet>,
    versions: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            servers: Bucket::new(),
            roles: Bucket::new(),
            users: Bucket::new(),
            databases: Bucket::new(),
            organizations: Bucket::new(),
            database_sets: Bucket::new(),
            versions: AtomicU64::new(0),
        }
    }

    fn finish_update<R: Resource>(&self, bucket: &Bucket<R>, resource: R) -> Result<R> {
        let updated = bucket.replace(resource, &self.versions)?;
        if updated.metadata().is_deleting() && updated.metadata().finalizers.is_empty() {
            bucket.remove(&updated.key());
            self.sweep_owned(R::KIND, updated.metadata());
        }
        Ok(updated)
    }

    fn request_delete<R: Resource>(&self, bucket: &Bucket<R>, key: &ObjectKey) -> Result<()> {
        if let Some(meta) = bucket.mark_deleting(key, &self.versions)? {
            self.sweep_owned(R::KIND, &meta);
        }
        Ok(())
    }

    /// Propagate a removal to owner-referenced records, recursively.
    fn sweep_owned(&self, kind: &'static str, meta: &ObjectMeta) {
        let mut queue: Vec<(&'static str, ObjectMeta)> = vec![(kind, meta.clone())];
        while let Some((owner_kind, owner)) = queue.pop() {
            for gone in self.servers.mark_owned(owner_kind, &owner, &self.versions) {
                queue.push((Server::KIND, gone));
            }
            for gone in self.roles.mark_owned(owner_kind, &owner, &self.versions) {
                queue.push((Role::KIND, gone));
            }
            for gone in self.users.mark_owned(owner_kind, &owner, &self.versions) {
                queue.push((User::KIND, gone));
            }
            for gone in self.databases.mark_owned(owner_kind, &owner, &self.versions) {
                queue.push((Database::KIND, gone));
            }
            for gone in self.organizations.mark_owned(owner_kind, &owner, &self.versions) {
                queue.push((Organization::KIND, gone));
            }
            for gone in self
                .database_sets
                .mark_owned(owner_kind, &owner, &self.versions)
            {
                queue.push((DatabaseSet::KIND, gone));
            }
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Storage for one kind.
struct Bucket<R: Resource> {
    items: DashMap<ObjectKey, R>,
}

impl<R: Resource> Bucket<R> {
    fn new() -> Self {
        Self {
            items: DashMap::new(),
        }
    }

    fn get(&self, key: &ObjectKey) -> Option<R> {
        self.items.get(key).map(|r| r.clone())
    }

    fn list(&self, namespace: &str) -> Vec<R> {
        let mut result: Vec<R> = self
            .items
            .iter()
            .filter(|entry| namespace.is_empty() || entry.key().namespace == namespace)
            .map(|entry| entry.value().clone())
            .collect();
        result.sort_by_key(|r| r.key());
        result
    }

    fn create(&self, mut resource: R, versions: &AtomicU64) -> Result<R> {
        if resource.metadata().name.is_empty() || resource.metadata().namespace.is_empty() {
            return Err(StoreError::Invalid(
                "record needs a namespace and a name".to_string(),
            ));
        }

        {
            let meta = resource.metadata_mut();
            if meta.uid.is_none() {
                meta.uid = Some(Uuid::new_v4());
            }
            meta.resource_version = next_version(versions);
        }

        let key = resource.key();
        match self.items.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(entry) => Err(StoreError::AlreadyExists {
                kind: R::KIND,
                namespace: entry.key().namespace.clone(),
                name: entry.key().name.clone(),
            }),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(resource.clone());
                Ok(resource)
            }
        }
    }

    fn replace(&self, mut resource: R, versions: &AtomicU64) -> Result<R> {
        let key = resource.key();
        let mut stored = self
            .items
            .get_mut(&key)
            .ok_or_else(|| StoreError::not_found(R::KIND, &key))?;

        let current = stored.metadata().resource_version;
        let carried = resource.metadata().resource_version;
        if current != carried {
            return Err(StoreError::Conflict {
                kind: R::KIND,
                namespace: key.namespace.clone(),
                name: key.name.clone(),
                stored: current,
                carried,
            });
        }

        {
            let meta = resource.metadata_mut();
            meta.resource_version = next_version(versions);
            if meta.uid.is_none() {
                meta.uid = stored.metadata().uid;
            }
        }
        *stored = resource.clone();
        Ok(resource)
    }

    fn remove(&self, key: &ObjectKey) {
        self.items.remove(key);
    }

    /// Mark the record deleting. Returns the final metadata when the record
    /// was removed outright (no finalizers), `None` when it lingers.
    fn mark_deleting(&self, key: &ObjectKey, versions: &AtomicU64) -> Result<Option<ObjectMeta>> {
        let removed = {
            let mut stored = self
                .items
                .get_mut(key)
                .ok_or_else(|| StoreError::not_found(R::KIND, key))?;
            let meta = stored.metadata_mut();
            if meta.deletion_timestamp.is_none() {
                meta.deletion_timestamp = Some(Utc::now());
                meta.resource_version = next_version(versions);
            }
            if meta.finalizers.is_empty() {
                Some(meta.clone())
            } else {
                None
            }
        };

        if removed.is_some() {
            self.items.remove(key);
        }
        Ok(removed)
    }

    /// Mark every record owned by `owner` as deleting. Returns the metadata
    /// of records removed outright so the caller can recurse.
    fn mark_owned(
        &self,
        owner_kind: &str,
        owner: &ObjectMeta,
        versions: &AtomicU64,
    ) -> Vec<ObjectMeta> {
        let owned: Vec<ObjectKey> = self
            .items
            .iter()
            .filter(|entry| {
                let meta = entry.value().metadata();
                meta.namespace == owner.namespace
                    && meta.owned_by(owner_kind, &owner.name, owner.uid)
            })
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = Vec::new();
        for key in owned {
            let gone = {
                let Some(mut stored) = self.items.get_mut(&key) else {
                    continue;
                };
                let meta = stored.metadata_mut();
                if meta.deletion_timestamp.is_none() {
                    meta.deletion_timestamp = Some(Utc::now());
                    meta.resource_version = next_version(versions);
                }
                if meta.finalizers.is_empty() {
                    Some(meta.clone())
                } else {
                    None
                }
            };
            if let Some(meta) = gone {
                self.items.remove(&key);
                removed.push(meta);
            }
        }
        removed
    }
}

fn next_version(versions: &AtomicU64) -> u64 {
    versions.fetch_add(1, Ordering::SeqCst) + 1
}

#[async_trait]
impl ResourceStore<Server> for MemoryStore {
    async fn get(&self, key: &ObjectKey) -> Result<Option<Server>> {
        Ok(self.servers.get(key))
    }

    async fn list(&self, namespace: &str) -> Result<Vec<Server>> {
        Ok(self.servers.list(namespace))
    }

    async fn create(&self, resource: Server) -> Result<Server> {
        self.servers.create(resource, &self.versions)
    }

    async fn update(&self, resource: Server) -> Result<Server> {
        self.finish_update(&self.servers, resource)
    }

    async fn update_status(&self, resource: Server) -> Result<Server> {
        self.servers.replace(resource, &self.versions)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<()> {
        self.request_delete(&self.servers, key)
    }
}

#[async_trait]
impl ResourceStore<Role> for MemoryStore {
    async fn get(&self, key: &ObjectKey) -> Result<Option<Role>> {
        Ok(self.roles.get(key))
    }

    async fn list(&self, namespace: &str) -> Result<Vec<Role>> {
        Ok(self.roles.list(namespace))
    }

    async fn create(&self, resource: Role) -> Result<Role> {
        self.roles.create(resource, &self.versions)
    }

    async fn update(&self, resource: Role) -> Result<Role> {
        self.finish_update(&self.roles, resource)
    }

    async fn update_status(&self, resource: Role) -> Result<Role> {
        self.roles.replace(resource, &self.versions)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<()> {
        self.request_delete(&self.roles, key)
    }
}

#[async_trait]
impl ResourceStore<User> for MemoryStore {
    async fn get(&self, key: &ObjectKey) -> Result<Option<User>> {
        Ok(self.users.get(key))
    }

    async fn list(&self, namespace: &str) -> Result<Vec<User>> {
        Ok(self.users.list(namespace))
    }

    async fn create(&self, resource: User) -> Result<User> {
        self.users.create(resource, &self.versions)
    }

    async fn update(&self, resource: User) -> Result<User> {
        self.finish_update(&self.users, resource)
    }

    async fn update_status(&self, resource: User) -> Result<User> {
        self.users.replace(resource, &self.versions)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<()> {
        self.request_delete(&self.users, key)
    }
}

#[async_trait]
impl ResourceStore<Database> for MemoryStore {
    async fn get(&self, key: &ObjectKey) -> Result<Option<Database>> {
        Ok(self.databases.get(key))
    }

    async fn list(&self, namespace: &str) -> Result<Vec<Database>> {
        Ok(self.databases.list(namespace))
    }

    async fn create(&self, resource: Database) -> Result<Database> {
        self.databases.create(resource, &self.versions)
    }

    async fn update(&self, resource: Database) -> Result<Database> {
        self.finish_update(&self.databases, resource)
    }

    async fn update_status(&self, resource: Database) -> Result<Database> {
        self.databases.replace(resource, &self.versions)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<()> {
        self.request_delete(&self.databases, key)
    }
}

#[async_trait]
impl ResourceStore<Organization> for MemoryStore {
    async fn get(&self, key: &ObjectKey) -> Result<Option<Organization>> {
        Ok(self.organizations.get(key))
    }

    async fn list(&self, namespace: &str) -> Result<Vec<Organization>> {
        Ok(self.organizations.list(namespace))
    }

    async fn create(&self, resource: Organization) -> Result<Organization> {
        self.organizations.create(resource, &self.versions)
    }

    async fn update(&self, resource: Organization) -> Result<Organization> {
        self.finish_update(&self.organizations, resource)
    }

    async fn update_status(&self, resource: Organization) -> Result<Organization> {
        self.organizations.replace(resource, &self.versions)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<()> {
        self.request_delete(&self.organizations, key)
    }
}

#[async_trait]
impl ResourceStore<DatabaseSet> for MemoryStore {
    async fn get(&self, key: &ObjectKey) -> Result<Option<DatabaseSet>> {
        Ok(self.database_sets.get(key))
    }

    async fn list(&self, namespace: &str) -> Result<Vec<DatabaseSet>> {
        Ok(self.database_sets.list(namespace))
    }

    async fn create(&self, resource: DatabaseSet) -> Result<DatabaseSet> {
        self.database_sets.create(resource, &self.versions)
    }

    async fn update(&self, resource: DatabaseSet) -> Result<DatabaseSet> {
        self.finish_update(&self.database_sets, resource)
    }

    async fn update_status(&self, resource: DatabaseSet) -> Result<DatabaseSet> {
        self.database_sets.replace(resource, &self.versions)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<()> {
        self.request_delete(&self.database_sets, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grove_types::{
        DatabaseSetSpec, DatabaseSpec, OwnerReference, ResourceRef, RoleSpec, SecretRef,
        ServerSpec,
    };

    fn create_test_server(namespace: &str, name: &str) -> Server {
        Server::new(
            namespace,
            name,
            ServerSpec {
                url: "http://graph.internal:5820".to_string(),
                admin_credentials_ref: SecretRef::new("admin"),
            },
        )
    }

    fn create_test_database(namespace: &str, name: &str) -> Database {
        Database::new(
            namespace,
            name,
            DatabaseSpec {
                database_name: name.to_string(),
                server_refs: vec![ResourceRef::new("graph-1")],
                named_graph_prefix: "https://graphs.example".to_string(),
                read_credentials_ref: None,
                write_credentials_ref: None,
            },
        )
    }

    fn create_test_role(namespace: &str, name: &str) -> Role {
        Role::new(
            namespace,
            name,
            RoleSpec {
                server_ref: ResourceRef::new("graph-1"),
                role_name: None,
                permissions: Vec::new(),
            },
        )
    }

    #[tokio::test]
    async fn create_assigns_uid_and_version() {
        let store = MemoryStore::new();
        let created = store
            .create(create_test_server("prod", "graph-1"))
            .await
            .unwrap();

        assert!(created.metadata.uid.is_some());
        assert!(created.metadata.resource_version > 0);

        let fetched: Option<Server> = store
            .get(&ObjectKey::new("prod", "graph-1"))
            .await
            .unwrap();
        assert_eq!(fetched.unwrap().metadata.uid, created.metadata.uid);
    }

    #[tokio::test]
    async fn duplicate_create_is_rejected() {
        let store = MemoryStore::new();
        store
            .create(create_test_server("prod", "graph-1"))
            .await
            .unwrap();

        let err = store
            .create(create_test_server("prod", "graph-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn stale_update_conflicts() {
        let store = MemoryStore::new();
        let created = store
            .create(create_test_server("prod", "graph-1"))
            .await
            .unwrap();

        let mut stale = created.clone();
        stale.metadata.resource_version = created.metadata.resource_version + 7;
        let err = store.update(stale).await.unwrap_err();
        assert!(err.is_conflict());

        // A write carrying the stored version still goes through.
        let updated = store.update(created).await.unwrap();
        assert!(updated.metadata.resource_version > 1);
    }

    #[tokio::test]
    async fn delete_without_finalizers_removes_record() {
        let store = MemoryStore::new();
        store
            .create(create_test_server("prod", "graph-1"))
            .await
            .unwrap();

        let key = ObjectKey::new("prod", "graph-1");
        ResourceStore::<Server>::delete(&store, &key).await.unwrap();

        let fetched: Option<Server> = store.get(&key).await.unwrap();
        assert!(fetched.is_none());
    }

    #[tokio::test]
    async fn delete_with_finalizer_marks_and_lingers() {
        let store = MemoryStore::new();
        let mut server = create_test_server("prod", "graph-1");
        server.metadata.add_finalizer("grove.io/server-protection");
        store.create(server).await.unwrap();

        let key = ObjectKey::new("prod", "graph-1");
        ResourceStore::<Server>::delete(&store, &key).await.unwrap();

        let marked: Server = store.get(&key).await.unwrap().unwrap();
        assert!(marked.metadata.is_deleting());

        // Deletion requests are idempotent.
        ResourceStore::<Server>::delete(&store, &key).await.unwrap();
        let still_there: Option<Server> = store.get(&key).await.unwrap();
        assert!(still_there.is_some());
    }

    #[tokio::test]
    async fn clearing_last_finalizer_removes_deleting_record() {
        let store = MemoryStore::new();
        let mut server = create_test_server("prod", "graph-1");
        server.metadata.add_finalizer("grove.io/server-protection");
        store.create(server).await.unwrap();

        let key = ObjectKey::new("prod", "graph-1");
        ResourceStore::<Server>::delete(&store, &key).await.unwrap();

        let mut marked: Server = store.get(&key).await.unwrap().unwrap();
        marked.metadata.remove_finalizer("grove.io/server-protection");
        store.update(marked).await.unwrap();

        let fetched: Option<Server> = store.get(&key).await.unwrap();
        assert!(fetched.is_none());
    }

    #[tokio::test]
    async fn removal_cascades_to_owned_records() {
        let store = MemoryStore::new();
        let set = store
            .create(DatabaseSet::new(
                "prod",
                "tenants",
                DatabaseSetSpec {
                    database_names: vec!["orders".to_string()],
                    server_refs: vec![ResourceRef::new("graph-1")],
                    named_graph_prefix: "https://graphs.example".to_string(),
                },
            ))
            .await
            .unwrap();

        // Child with a finalizer lingers as deleting.
        let mut database = create_test_database("prod", "orders");
        database.metadata.owner_references.push(OwnerReference::of(&set));
        database.metadata.add_finalizer("grove.io/database");
        let database = store.create(database).await.unwrap();

        // Grandchild without finalizers disappears with its owner.
        let mut role = create_test_role("prod", "orders-graph-1-read");
        role.metadata.owner_references.push(OwnerReference::of(&database));
        store.create(role).await.unwrap();

        // Marker-free child of the set disappears immediately.
        let mut plain = create_test_database("prod", "audit");
        plain.metadata.owner_references.push(OwnerReference::of(&set));
        store.create(plain).await.unwrap();

        ResourceStore::<DatabaseSet>::delete(&store, &ObjectKey::new("prod", "tenants"))
            .await
            .unwrap();

        let marked: Database = store
            .get(&ObjectKey::new("prod", "orders"))
            .await
            .unwrap()
            .unwrap();
        assert!(marked.metadata.is_deleting());

        let plain: Option<Database> = store.get(&ObjectKey::new("prod", "audit")).await.unwrap();
        assert!(plain.is_none());

        // The marked child still holds its finalizer, so its grandchild
        // survives until the child is really removed.
        let role: Option<Role> = store
            .get(&ObjectKey::new("prod", "orders-graph-1-read"))
            .await
            .unwrap();
        assert!(role.is_some());

        let mut marked = marked;
        marked.metadata.remove_finalizer("grove.io/database");
        store.update(marked).await.unwrap();

        let role: Option<Role> = store
            .get(&ObjectKey::new("prod", "orders-graph-1-read"))
            .await
            .unwrap();
        assert!(role.is_none());
    }

    #[tokio::test]
    async fn list_scopes_by_namespace() {
        let store = MemoryStore::new();
        store
            .create(create_test_server("prod", "graph-1"))
            .await
            .unwrap();
        store
            .create(create_test_server("prod", "graph-2"))
            .await
            .unwrap();
        store
            .create(create_test_server("staging", "graph-1"))
            .await
            .unwrap();

        let prod: Vec<Server> = store.list("prod").await.unwrap();
        assert_eq!(prod.len(), 2);
        assert!(prod.iter().all(|s| s.metadata.namespace == "prod"));

        let all: Vec<Server> = store.list("").await.unwrap();
        assert_eq!(all.len(), 3);
    }
}
