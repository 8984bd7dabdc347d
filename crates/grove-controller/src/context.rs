//! Per-pass working state
//!
//! Everything a pass accumulates lives here and travels explicitly through
//! the reconcile steps. The context is created fresh when a pass starts and
//! discarded after the status write; nothing about a pass is ambient.

use crate::conditions::ConditionSet;
use crate::error::{ReconcileError, Result};
use crate::resolver::ServerBinding;

/// Working state for one reconcile pass over one resource.
#[derive(Default)]
pub struct ReconcileContext {
    /// Conditions the pass has reported so far.
    pub conditions: ConditionSet,

    /// Namespace unqualified references resolve in; the resource's own.
    pub namespace: String,

    /// Remote binding established during sync, for kinds bound to a single
    /// server. Composite kinds resolve per server and leave this empty.
    pub binding: Option<ServerBinding>,
}

impl ReconcileContext {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            conditions: ConditionSet::new(),
            namespace: namespace.into(),
            binding: None,
        }
    }

    /// The binding resolved earlier in this pass.
    pub fn bound(&self) -> Result<&ServerBinding> {
        self.binding.as_ref().ok_or_else(|| {
            ReconcileError::NotReady("no server binding resolved in this pass".to_string())
        })
    }
}
