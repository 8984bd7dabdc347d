//! The reconcile pass driver
//!
//! One generic loop body shared by every kind: fetch, branch on deletion,
//! validate, sync, attach finalizers, persist status, decide the requeue.
//! Kind-specific behavior plugs in through the [`Reconciler`] trait. A pass
//! never returns an error; failures become conditions on the record and a
//! retry decision for the scheduler.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use grove_store::ResourceStore;
use grove_types::{ConditionStatus, ConditionType, ObjectKey, Resource};
use tracing::{debug, info, warn};

use crate::config::RequeueConfig;
use crate::context::ReconcileContext;
use crate::error::{ReconcileError, Result};

/// Per-kind reconcile behavior plugged into the generic driver.
#[async_trait]
pub trait Reconciler: Send + Sync {
    /// Resource kind this reconciler converges.
    type Resource: Resource;

    /// Finalizer markers every synced resource must carry, in teardown order.
    fn finalizers(&self) -> &'static [&'static str];

    /// Reject specs that can never converge as written.
    fn validate(&self, resource: &Self::Resource) -> Result<()>;

    /// Converge remote and derived state toward the spec.
    async fn sync(
        &self,
        resource: &mut Self::Resource,
        ctx: &mut ReconcileContext,
    ) -> Result<()>;

    /// Run deletion steps for whichever markers remain on the resource.
    async fn teardown(
        &self,
        resource: &mut Self::Resource,
        ctx: &mut ReconcileContext,
    ) -> Result<()>;
}

/// How a pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassDisposition {
    /// Converged; the resource is Ready.
    Synced,
    /// No record under the key.
    Missing,
    /// Teardown finished and the record was released.
    Removed,
    /// Spec rejected; parked until edited.
    Invalid,
    /// The pass failed; retrying on the error interval.
    Failed,
    /// Teardown blocked or failed; retrying on the error interval.
    Terminating,
    /// Lost an optimistic-concurrency race; retrying quietly.
    Conflicted,
}

impl fmt::Display for PassDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PassDisposition::Synced => "synced",
            PassDisposition::Missing => "missing",
            PassDisposition::Removed => "removed",
            PassDisposition::Invalid => "invalid",
            PassDisposition::Failed => "failed",
            PassDisposition::Terminating => "terminating",
            PassDisposition::Conflicted => "conflicted",
        };
        write!(f, "{s}")
    }
}

/// Outcome of one reconcile pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassOutcome {
    pub disposition: PassDisposition,

    /// When to look at the resource again. `None` parks it until its spec
    /// changes.
    pub requeue_after: Option<Duration>,
}

/// Drives reconcile passes for one resource kind.
pub struct Driver<K: Reconciler> {
    reconciler: K,
    store: Arc<dyn ResourceStore<K::Resource>>,
    config: RequeueConfig,
}

impl<K: Reconciler> Driver<K> {
    pub fn new(
        reconciler: K,
        store: Arc<dyn ResourceStore<K::Resource>>,
        config: RequeueConfig,
    ) -> Self {
        Self {
            reconciler,
            store,
            config,
        }
    }

    /// Run one pass over the resource at `key`.
    pub async fn run_pass(&self, key: &ObjectKey) -> PassOutcome {
        let resource = match self.store.get(key).await {
            Ok(Some(resource)) => resource,
            Ok(None) => {
                debug!(kind = K::Resource::KIND, key = %key, "No record under key");
                return PassOutcome {
                    disposition: PassDisposition::Missing,
                    requeue_after: None,
                };
            }
            Err(err) => {
                warn!(kind = K::Resource::KIND, key = %key, error = %err, "Failed to fetch resource");
                return PassOutcome {
                    disposition: PassDisposition::Failed,
                    requeue_after: self.config.error_requeue(),
                };
            }
        };

        let mut ctx = ReconcileContext::new(resource.metadata().namespace.clone());
        if resource.metadata().is_deleting() {
            self.teardown_pass(resource, &mut ctx).await
        } else {
            self.sync_pass(resource, &mut ctx).await
        }
    }

    async fn sync_pass(
        &self,
        mut resource: K::Resource,
        ctx: &mut ReconcileContext,
    ) -> PassOutcome {
        let key = resource.key();

        if let Err(err) = self.reconciler.validate(&resource) {
            info!(kind = K::Resource::KIND, key = %key, error = %err, "Spec rejected");
            ctx.conditions.set(
                ConditionType::Invalid,
                ConditionStatus::True,
                "SpecInvalid",
                err.to_string(),
            );
            ctx.conditions.set(
                ConditionType::Ready,
                ConditionStatus::False,
                "SpecInvalid",
                "The spec must change before reconciliation can proceed",
            );
            return self
                .write_status(resource, ctx, PassDisposition::Invalid, None)
                .await;
        }

        if let Err(err) = self.reconciler.sync(&mut resource, ctx).await {
            if err.is_conflict() {
                debug!(kind = K::Resource::KIND, key = %key, "Lost a write race during sync");
                return self.conflicted();
            }
            warn!(kind = K::Resource::KIND, key = %key, error = %err, "Synchronization failed");
            ctx.conditions.set(
                ConditionType::Errored,
                ConditionStatus::True,
                "SyncFailed",
                err.to_string(),
            );
            ctx.conditions.set(
                ConditionType::Ready,
                ConditionStatus::False,
                "SyncFailed",
                format!("Last synchronization attempt failed: {err}"),
            );
            return self
                .write_status(
                    resource,
                    ctx,
                    PassDisposition::Failed,
                    self.config.error_requeue(),
                )
                .await;
        }

        // Finalizers attach only after a successful sync; a spec that never
        // converged deletes without teardown.
        let mut changed = false;
        for marker in self.reconciler.finalizers() {
            changed |= resource.metadata_mut().add_finalizer(marker);
        }
        if changed {
            resource = match self.store.update(resource).await {
                Ok(updated) => updated,
                Err(err) if err.is_conflict() => {
                    debug!(kind = K::Resource::KIND, key = %key, "Lost a write race adding finalizers");
                    return self.conflicted();
                }
                Err(err) => {
                    warn!(kind = K::Resource::KIND, key = %key, error = %err, "Failed to persist finalizers");
                    return PassOutcome {
                        disposition: PassDisposition::Failed,
                        requeue_after: self.config.error_requeue(),
                    };
                }
            };
        }

        ctx.conditions.set(
            ConditionType::Ready,
            ConditionStatus::True,
            "Synchronized",
            "Remote state matches the declared spec",
        );
        self.write_status(
            resource,
            ctx,
            PassDisposition::Synced,
            self.config.steady_requeue(),
        )
        .await
    }

    async fn teardown_pass(
        &self,
        mut resource: K::Resource,
        ctx: &mut ReconcileContext,
    ) -> PassOutcome {
        let key = resource.key();
        let teardown = self.reconciler.teardown(&mut resource, ctx).await;

        if let Err(err) = &teardown {
            if err.is_conflict() {
                debug!(kind = K::Resource::KIND, key = %key, "Lost a write race during teardown");
                return self.conflicted();
            }
        }

        // Markers cleared by completed steps must stick in both outcomes;
        // this write also releases the record once no finalizers remain.
        let resource = match self.store.update(resource).await {
            Ok(updated) => updated,
            Err(err) if err.is_conflict() => {
                debug!(kind = K::Resource::KIND, key = %key, "Lost a write race persisting teardown progress");
                return self.conflicted();
            }
            Err(err) => {
                warn!(kind = K::Resource::KIND, key = %key, error = %err, "Failed to persist teardown progress");
                return PassOutcome {
                    disposition: PassDisposition::Terminating,
                    requeue_after: self.config.error_requeue(),
                };
            }
        };

        match teardown {
            Ok(()) => {
                info!(kind = K::Resource::KIND, key = %key, "Teardown complete");
                PassOutcome {
                    disposition: PassDisposition::Removed,
                    requeue_after: None,
                }
            }
            Err(err) => {
                warn!(kind = K::Resource::KIND, key = %key, error = %err, "Teardown did not finish");
                let reason = if matches!(err, ReconcileError::DependencyBlocked { .. }) {
                    "Blocked"
                } else {
                    "TeardownFailed"
                };
                ctx.conditions.set(
                    ConditionType::Terminating,
                    ConditionStatus::True,
                    reason,
                    err.to_string(),
                );
                ctx.conditions.set(
                    ConditionType::Ready,
                    ConditionStatus::False,
                    "Terminating",
                    "The resource is being deleted",
                );
                self.write_status(
                    resource,
                    ctx,
                    PassDisposition::Terminating,
                    self.config.error_requeue(),
                )
                .await
            }
        }
    }

    /// Merge the pass's conditions over the stored list and persist.
    async fn write_status(
        &self,
        mut resource: K::Resource,
        ctx: &ReconcileContext,
        disposition: PassDisposition,
        requeue_after: Option<Duration>,
    ) -> PassOutcome {
        let key = resource.key();
        let merged = ctx.conditions.merge_into(resource.conditions());
        *resource.conditions_mut() = merged;

        match self.store.update_status(resource).await {
            Ok(_) => PassOutcome {
                disposition,
                requeue_after,
            },
            Err(err) if err.is_conflict() => {
                debug!(kind = K::Resource::KIND, key = %key, "Lost a write race persisting status");
                self.conflicted()
            }
            Err(err) => {
                warn!(kind = K::Resource::KIND, key = %key, error = %err, "Failed to persist status");
                PassOutcome {
                    disposition: PassDisposition::Failed,
                    requeue_after: self.config.error_requeue(),
                }
            }
        }
    }

    fn conflicted(&self) -> PassOutcome {
        PassOutcome {
            disposition: PassDisposition::Conflicted,
            requeue_after: self.config.error_requeue(),
        }
    }
}
