//! Declarative child synchronization for composite kinds
//!
//! Database, Organization, and DatabaseSet derive owner-referenced child
//! records. This module converges the owned set: desired children are
//! created or their specs updated in place, children whose names fell out of
//! the desired list are deleted, and teardown purges whatever remains.

use std::collections::HashSet;
use std::sync::Arc;

use grove_store::ResourceStore;
use grove_types::{Database, ObjectKey, ObjectMeta, OwnerReference, Resource, Role, User};
use tracing::{debug, info};

use crate::error::{ReconcileError, Result};

/// Record kinds that can be derived as owned children.
pub trait ChildSpec: Resource {
    /// Whether the declared state differs from `desired`'s.
    fn spec_differs(&self, desired: &Self) -> bool;

    /// Overwrite the declared state with `desired`'s, keeping metadata and
    /// status intact.
    fn adopt_spec(&mut self, desired: Self);
}

impl ChildSpec for Role {
    fn spec_differs(&self, desired: &Self) -> bool {
        self.spec != desired.spec
    }

    fn adopt_spec(&mut self, desired: Self) {
        self.spec = desired.spec;
    }
}

impl ChildSpec for User {
    fn spec_differs(&self, desired: &Self) -> bool {
        self.spec != desired.spec
    }

    fn adopt_spec(&mut self, desired: Self) {
        self.spec = desired.spec;
    }
}

impl ChildSpec for Database {
    fn spec_differs(&self, desired: &Self) -> bool {
        self.spec != desired.spec
    }

    fn adopt_spec(&mut self, desired: Self) {
        self.spec = desired.spec;
    }
}

/// What one converge pass did to an owned set.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChildReport {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl ChildReport {
    pub fn changed(&self) -> bool {
        self.created + self.updated + self.deleted > 0
    }
}

/// Keeps one kind of owned children in sync with a desired list.
pub struct ChildSync<C: ChildSpec> {
    store: Arc<dyn ResourceStore<C>>,
    owner: OwnerReference,
    namespace: String,
}

impl<C: ChildSpec> ChildSync<C> {
    /// Children are matched by the owner's kind, name, and uid, and always
    /// live in the owner's namespace.
    pub fn new<O: Resource>(store: Arc<dyn ResourceStore<C>>, owner: &O) -> Self {
        Self {
            store,
            owner: OwnerReference::of(owner),
            namespace: owner.metadata().namespace.clone(),
        }
    }

    fn is_owned(&self, meta: &ObjectMeta) -> bool {
        meta.owned_by(&self.owner.kind, &self.owner.name, self.owner.uid)
    }

    async fn owned(&self) -> Result<Vec<C>> {
        Ok(self
            .store
            .list(&self.namespace)
            .await?
            .into_iter()
            .filter(|child| self.is_owned(child.metadata()))
            .collect())
    }

    /// Converge the owned set: apply every desired child, then delete owned
    /// children whose names fell out of the desired list.
    pub async fn converge(&self, desired: Vec<C>) -> Result<ChildReport> {
        let mut report = ChildReport::default();
        let keep: HashSet<String> = desired
            .iter()
            .map(|child| child.metadata().name.clone())
            .collect();

        for child in desired {
            self.apply(child, &mut report).await?;
        }

        for stale in self.owned().await? {
            if keep.contains(&stale.metadata().name) || stale.metadata().is_deleting() {
                continue;
            }
            let key = stale.key();
            self.store.delete(&key).await?;
            info!(kind = C::KIND, key = %key, owner = %self.owner.name, "Deleted departed child");
            report.deleted += 1;
        }

        Ok(report)
    }

    async fn apply(&self, mut desired: C, report: &mut ChildReport) -> Result<()> {
        let key = desired.key();
        match self.store.get(&key).await? {
            None => {
                desired
                    .metadata_mut()
                    .owner_references
                    .push(self.owner.clone());
                self.store.create(desired).await?;
                debug!(kind = C::KIND, key = %key, owner = %self.owner.name, "Created child");
                report.created += 1;
            }
            Some(existing) if existing.metadata().is_deleting() => {
                // The old record must finish its teardown before the name
                // can be reused.
                return Err(ReconcileError::NotReady(format!(
                    "{} {} is still terminating",
                    C::KIND,
                    key
                )));
            }
            Some(existing) if !self.is_owned(existing.metadata()) => {
                return Err(ReconcileError::NotReady(format!(
                    "{} {} already exists and is not owned by {} {}",
                    C::KIND,
                    key,
                    self.owner.kind,
                    self.owner.name
                )));
            }
            Some(mut existing) => {
                if existing.spec_differs(&desired) {
                    existing.adopt_spec(desired);
                    self.store.update(existing).await?;
                    debug!(kind = C::KIND, key = %key, owner = %self.owner.name, "Updated child spec");
                    report.updated += 1;
                }
            }
        }
        Ok(())
    }

    /// Request deletion of every live owned child. Children holding
    /// finalizers linger in a deleting state and finish their own teardown;
    /// their keys are returned for logging.
    pub async fn purge(&self) -> Result<Vec<ObjectKey>> {
        let mut lingering = Vec::new();
        for child in self.owned().await? {
            let key = child.key();
            if !child.metadata().is_deleting() {
                self.store.delete(&key).await?;
                info!(kind = C::KIND, key = %key, owner = %self.owner.name, "Requested child deletion");
            }
            if self.store.get(&key).await?.is_some() {
                lingering.push(key);
            }
        }
        Ok(lingering)
    }
}
