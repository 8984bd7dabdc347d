//! Grove Controller - reconciliation engine for declared records
//!
//! One pass of the [`driver::Driver`] converges a single record: validate,
//! resolve references, synchronize remote state, persist status. Per-kind
//! logic lives in [`kinds`]; everything else here is the shared machinery a
//! pass runs through.
//!
//! ## Key Concepts
//!
//! - **Driver / Reconciler**: the generic pass and the per-kind seam
//! - **ConditionSet**: in-flight conditions merged into stored status
//! - **TeardownStep**: ordered deletion work gated by finalizer markers
//! - **ServerResolver**: turns a server reference into a bound remote API
//! - **Stores**: typed handles on the record store, one per kind

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod conditions;
pub mod config;
pub mod context;
pub mod diff;
pub mod driver;
pub mod error;
pub mod finalizer;
pub mod gate;
pub mod kinds;
pub mod resolver;

// Re-export main types
pub use conditions::ConditionSet;
pub use config::RequeueConfig;
pub use context::ReconcileContext;
pub use diff::{diff_collections, CollectionDelta};
pub use driver::{Driver, PassDisposition, PassOutcome, Reconciler};
pub use error::{AggregateError, ReconcileError, Result};
pub use finalizer::{run_teardown, teardown_complete, TeardownStep};
pub use gate::check_no_dependents;
pub use kinds::Stores;
pub use resolver::{Connector, ServerBinding, ServerResolver, StaticConnector};
