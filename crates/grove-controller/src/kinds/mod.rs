//! Per-kind reconcilers
//!
//! One module per resource kind, each implementing [`Reconciler`] for the
//! generic driver, plus the shared typed-store bundle and the child
//! synchronizer the composite kinds derive records through.
//!
//! [`Reconciler`]: crate::driver::Reconciler

mod children;
mod database;
mod database_set;
mod organization;
mod role;
mod server;
mod user;

pub use children::{ChildReport, ChildSpec, ChildSync};
pub use database::{DatabaseReconciler, DATABASE, DATABASE_CHILDREN};
pub use database_set::{DatabaseSetReconciler, DATABASE_SET_CHILDREN};
pub use organization::{OrganizationReconciler, ORGANIZATION_CHILDREN};
pub use role::{RoleReconciler, ROLE, ROLE_PERMISSIONS};
pub use server::{ServerReconciler, SERVER_PROTECTION};
pub use user::{UserReconciler, USER, USER_MEMBERSHIPS};

use std::sync::Arc;

use grove_store::{MemoryStore, ResourceStore};
use grove_types::{Database, DatabaseSet, Organization, Role, Server, User};

/// Typed handles on the record store, one per kind.
///
/// Reconcilers resolve cross-kind references and derive children through
/// this bundle; every handle may point at the same backing store.
#[derive(Clone)]
pub struct Stores {
    pub servers: Arc<dyn ResourceStore<Server>>,
    pub roles: Arc<dyn ResourceStore<Role>>,
    pub users: Arc<dyn ResourceStore<User>>,
    pub databases: Arc<dyn ResourceStore<Database>>,
    pub organizations: Arc<dyn ResourceStore<Organization>>,
    pub database_sets: Arc<dyn ResourceStore<DatabaseSet>>,
}

impl Stores {
    /// Every handle backed by one shared in-memory store.
    pub fn from_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            servers: store.clone(),
            roles: store.clone(),
            users: store.clone(),
            databases: store.clone(),
            organizations: store.clone(),
            database_sets: store,
        }
    }
}
