//! Grove Types - Resource records for declarative graph-database management
//!
//! Grove converges remote graph-database servers toward a set of declared
//! resource records. This crate defines those records and the vocabulary the
//! rest of the workspace shares.
//!
//! ## Key Concepts
//!
//! - **ObjectMeta**: identity, versioning, deletion marking, finalizers, and
//!   ownership for every record
//! - **Server / Role / User**: direct mirrors of remote server state
//! - **Database / Organization / DatabaseSet**: composite records whose
//!   reconciliation derives further records
//! - **Condition**: per-type status entries persisted on every record
//! - **Permission**: a grant with its own equivalence rules

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod condition;
pub mod database;
pub mod database_set;
pub mod meta;
pub mod organization;
pub mod permission;
pub mod refs;
pub mod role;
pub mod server;
pub mod user;
pub mod validation;

// Re-export main types
pub use condition::{Condition, ConditionStatus, ConditionType};
pub use database::{AccessMode, Database, DatabaseSpec, DatabaseStatus};
pub use database_set::{DatabaseSet, DatabaseSetSpec, DatabaseSetStatus};
pub use meta::{ObjectKey, ObjectMeta, OwnerReference, Resource};
pub use organization::{named_graph_id, Organization, OrganizationSpec, OrganizationStatus};
pub use permission::Permission;
pub use refs::{ResourceRef, SecretRef};
pub use role::{Role, RoleSpec, RoleStatus};
pub use server::{Server, ServerSpec, ServerStatus};
pub use user::{User, UserSpec, UserStatus};
pub use validation::ValidationError;
