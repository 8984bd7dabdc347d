//! Grove Store - Declarative record storage
//!
//! The reconciliation engine reads desired state from and writes status back
//! to a [`ResourceStore`]. The trait is deliberately small: keyed fetch,
//! namespace listing, create/update/delete with optimistic concurrency, and
//! a separate status write.
//!
//! [`MemoryStore`] is the bundled implementation: a DashMap-backed store
//! with finalizer-aware deletion and owner-reference garbage collection.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod error;
pub mod memory;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use store::ResourceStore;
