//! Grove Remote - Administration API clients for graph-database servers
//!
//! The reconciliation engine drives remote servers exclusively through the
//! [`GraphAdminApi`] trait: databases, roles, permissions, users, and role
//! memberships. [`HttpAdminApi`] speaks the administration REST API;
//! [`InMemoryAdminApi`] is a fake server for development and testing.
//!
//! Admin and account credentials come from a [`CredentialStore`], resolved
//! by (namespace, secret name).

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod api;
pub mod credentials;
pub mod error;
pub mod http;
pub mod memory;

pub use api::GraphAdminApi;
pub use credentials::{CredentialError, CredentialStore, Credentials, InMemoryCredentialStore};
pub use error::{RemoteError, Result};
pub use http::HttpAdminApi;
pub use memory::InMemoryAdminApi;
