//! User reconciliation
//!
//! Converges one remote account: create it if absent, assert the declared
//! password, then diff role memberships. The remote username is recorded in
//! status so teardown can still find the account after the credentials
//! Secret is deleted.

use std::sync::Arc;

use async_trait::async_trait;
use grove_remote::GraphAdminApi;
use grove_types::{Resource, User};
use tracing::info;

use crate::context::ReconcileContext;
use crate::diff::diff_collections;
use crate::driver::Reconciler;
use crate::error::{AggregateError, ReconcileError, Result};
use crate::finalizer::{run_teardown, TeardownStep};
use crate::resolver::ServerResolver;

/// Clears once the account's role memberships are revoked.
pub const USER_MEMBERSHIPS: &str = "grove.io/user-memberships";

/// Clears once the remote account is removed.
pub const USER: &str = "grove.io/user";

const MARKERS: &[&str] = &[USER_MEMBERSHIPS, USER];

pub struct UserReconciler {
    resolver: Arc<ServerResolver>,
}

impl UserReconciler {
    pub fn new(resolver: Arc<ServerResolver>) -> Self {
        Self { resolver }
    }

    async fn ensure_remote_account(&self, user: &mut User, ctx: &ReconcileContext) -> Result<()> {
        let binding = ctx.bound()?;
        let credentials = self
            .resolver
            .secret(&user.spec.credentials_ref, &ctx.namespace)
            .await?;
        let username = credentials.username.clone();

        let known = binding.api.list_users().await.map_err(|err| {
            ReconcileError::remote(format!("list users on server {}", binding.server), err)
        })?;
        if known.iter().any(|name| name == &username) {
            // The remote cannot reveal the current password, so the declared
            // one is asserted on every pass.
            binding
                .api
                .set_password(&username, &credentials.password)
                .await
                .map_err(|err| {
                    ReconcileError::remote(
                        format!("set password of {username} on server {}", binding.server),
                        err,
                    )
                })?;
        } else {
            binding
                .api
                .create_user(&username, &credentials.password)
                .await
                .map_err(|err| {
                    ReconcileError::remote(
                        format!("create user {username} on server {}", binding.server),
                        err,
                    )
                })?;
            info!(user = %username, server = %binding.server, "Created remote account");
        }

        user.status.remote_username = Some(username);
        Ok(())
    }

    async fn converge_memberships(&self, user: &User, ctx: &ReconcileContext) -> Result<()> {
        let binding = ctx.bound()?;
        let username = match &user.status.remote_username {
            Some(username) => username.clone(),
            None => {
                return Err(ReconcileError::NotReady(format!(
                    "no remote account recorded for User {}",
                    user.key()
                )))
            }
        };

        let held = binding.api.list_user_roles(&username).await.map_err(|err| {
            ReconcileError::remote(
                format!("list roles of {username} on server {}", binding.server),
                err,
            )
        })?;

        let delta = diff_collections(&user.spec.roles, &held, |a, b| a == b);
        if delta.is_noop() {
            return Ok(());
        }

        let mut sweep = AggregateError::default();
        for role in &delta.to_add {
            match binding.api.add_user_role(&username, role).await {
                Ok(()) => sweep.succeeded(),
                Err(err) => sweep.failed(format!("grant role {role}: {err}")),
            }
        }
        for role in &delta.to_remove {
            match binding.api.remove_user_role(&username, role).await {
                Ok(()) => sweep.succeeded(),
                Err(err) => sweep.failed(format!("revoke role {role}: {err}")),
            }
        }
        sweep.into_result()?;

        info!(
            user = %username,
            server = %binding.server,
            granted = delta.to_add.len(),
            revoked = delta.to_remove.len(),
            "Converged role memberships"
        );
        Ok(())
    }
}

#[async_trait]
impl Reconciler for UserReconciler {
    type Resource = User;

    fn finalizers(&self) -> &'static [&'static str] {
        MARKERS
    }

    fn validate(&self, user: &User) -> Result<()> {
        user.spec.validate()?;
        Ok(())
    }

    async fn sync(&self, user: &mut User, ctx: &mut ReconcileContext) -> Result<()> {
        let binding = self
            .resolver
            .resolve(&user.spec.server_ref, &ctx.namespace)
            .await?;
        ctx.binding = Some(binding);

        self.ensure_remote_account(user, ctx).await?;
        self.converge_memberships(user, ctx).await
    }

    async fn teardown(&self, user: &mut User, ctx: &mut ReconcileContext) -> Result<()> {
        let binding = match self
            .resolver
            .resolve(&user.spec.server_ref, &ctx.namespace)
            .await
        {
            Ok(binding) => binding,
            Err(err) if err.is_reference_not_found() => {
                // The Server record is gone; nothing remote is reachable
                // through it anymore.
                for marker in MARKERS {
                    user.metadata.remove_finalizer(marker);
                }
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        // The recorded username survives deletion of the credentials Secret;
        // fall back to the Secret only for accounts that never synced.
        let username = match &user.status.remote_username {
            Some(username) => username.clone(),
            None => {
                self.resolver
                    .secret(&user.spec.credentials_ref, &ctx.namespace)
                    .await?
                    .username
            }
        };

        let revoke_memberships = TeardownStep::new(USER_MEMBERSHIPS, {
            let api = binding.api.clone();
            let server = binding.server.clone();
            let username = username.clone();
            async move {
                let held = match api.list_user_roles(&username).await {
                    Ok(held) => held,
                    Err(err) if err.is_not_found() => return Ok(()),
                    Err(err) => {
                        return Err(ReconcileError::remote(
                            format!("list roles of {username} on server {server}"),
                            err,
                        ))
                    }
                };
                for role in &held {
                    if let Err(err) = api.remove_user_role(&username, role).await {
                        if !err.is_not_found() {
                            return Err(ReconcileError::remote(
                                format!("revoke role {role} from {username} on server {server}"),
                                err,
                            ));
                        }
                    }
                }
                Ok(())
            }
        });

        let remove_account = TeardownStep::new(USER, {
            let api = binding.api.clone();
            let server = binding.server.clone();
            let username = username.clone();
            async move {
                match api.remove_user(&username).await {
                    Ok(()) => {
                        info!(user = %username, server = %server, "Removed remote account");
                        Ok(())
                    }
                    Err(err) if err.is_not_found() => Ok(()),
                    Err(err) => Err(ReconcileError::remote(
                        format!("remove user {username} on server {server}"),
                        err,
                    )),
                }
            }
        });

        run_teardown(&mut user.metadata, vec![revoke_memberships, remove_account]).await
    }
}
