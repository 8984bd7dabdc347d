//! Role reconciliation
//!
//! Converges one remote role: ensure it exists, then diff the declared
//! permission set against what the server reports. Deletion is blocked while
//! store Users list the role or remote memberships remain; teardown then
//! strips permissions and removes the remote role, one finalizer per step.

use std::sync::Arc;

use async_trait::async_trait;
use grove_remote::GraphAdminApi;
use grove_types::{Resource, Role, User};
use tracing::info;

use crate::context::ReconcileContext;
use crate::diff::diff_collections;
use crate::driver::Reconciler;
use crate::error::{AggregateError, ReconcileError, Result};
use crate::finalizer::{run_teardown, TeardownStep};
use crate::gate::check_no_dependents;
use crate::kinds::Stores;
use crate::resolver::ServerResolver;

/// Clears once the remote role's permissions are stripped.
pub const ROLE_PERMISSIONS: &str = "grove.io/role-permissions";

/// Clears once the remote role is removed.
pub const ROLE: &str = "grove.io/role";

const MARKERS: &[&str] = &[ROLE_PERMISSIONS, ROLE];

pub struct RoleReconciler {
    resolver: Arc<ServerResolver>,
    stores: Stores,
}

impl RoleReconciler {
    pub fn new(resolver: Arc<ServerResolver>, stores: Stores) -> Self {
        Self { resolver, stores }
    }

    async fn ensure_remote_role(&self, role: &Role, ctx: &ReconcileContext) -> Result<()> {
        let binding = ctx.bound()?;
        let remote_name = role.remote_name();

        let known = binding.api.list_roles().await.map_err(|err| {
            ReconcileError::remote(format!("list roles on server {}", binding.server), err)
        })?;
        if !known.iter().any(|name| name == remote_name) {
            binding.api.create_role(remote_name).await.map_err(|err| {
                ReconcileError::remote(
                    format!("create role {remote_name} on server {}", binding.server),
                    err,
                )
            })?;
            info!(role = remote_name, server = %binding.server, "Created remote role");
        }
        Ok(())
    }

    async fn converge_permissions(&self, role: &Role, ctx: &ReconcileContext) -> Result<()> {
        let binding = ctx.bound()?;
        let remote_name = role.remote_name();

        let observed = binding
            .api
            .list_role_permissions(remote_name)
            .await
            .map_err(|err| {
                ReconcileError::remote(
                    format!(
                        "list permissions of role {remote_name} on server {}",
                        binding.server
                    ),
                    err,
                )
            })?;

        let delta = diff_collections(&role.spec.permissions, &observed, |a, b| a.equivalent(b));
        if delta.is_noop() {
            return Ok(());
        }

        let mut sweep = AggregateError::default();
        for permission in &delta.to_add {
            match binding
                .api
                .add_role_permission(remote_name, permission)
                .await
            {
                Ok(()) => sweep.succeeded(),
                Err(err) => sweep.failed(format!("grant {permission}: {err}")),
            }
        }
        for permission in &delta.to_remove {
            match binding
                .api
                .remove_role_permission(remote_name, permission)
                .await
            {
                Ok(()) => sweep.succeeded(),
                Err(err) => sweep.failed(format!("revoke {permission}: {err}")),
            }
        }
        sweep.into_result()?;

        info!(
            role = remote_name,
            server = %binding.server,
            granted = delta.to_add.len(),
            revoked = delta.to_remove.len(),
            "Converged remote permissions"
        );
        Ok(())
    }
}

#[async_trait]
impl Reconciler for RoleReconciler {
    type Resource = Role;

    fn finalizers(&self) -> &'static [&'static str] {
        MARKERS
    }

    fn validate(&self, role: &Role) -> Result<()> {
        role.spec.validate()?;
        Ok(())
    }

    async fn sync(&self, role: &mut Role, ctx: &mut ReconcileContext) -> Result<()> {
        let binding = self
            .resolver
            .resolve(&role.spec.server_ref, &ctx.namespace)
            .await?;
        ctx.binding = Some(binding);

        self.ensure_remote_role(role, ctx).await?;
        self.converge_permissions(role, ctx).await
    }

    async fn teardown(&self, role: &mut Role, ctx: &mut ReconcileContext) -> Result<()> {
        let key = role.key();
        let subject = format!("{} {}", Role::KIND, key);
        let server_key = role.spec.server_ref.object_key(&ctx.namespace);
        let remote_name = role.remote_name().to_string();

        check_no_dependents(self.stores.users.as_ref(), "", &subject, |user: &User| {
            user.spec.roles.iter().any(|r| r == &remote_name)
                && user
                    .spec
                    .server_ref
                    .points_at(&user.metadata.namespace, &server_key)
        })
        .await?;

        let binding = match self
            .resolver
            .resolve(&role.spec.server_ref, &ctx.namespace)
            .await
        {
            Ok(binding) => binding,
            Err(err) if err.is_reference_not_found() => {
                // The Server record is gone; nothing remote is reachable
                // through it anymore.
                for marker in MARKERS {
                    role.metadata.remove_finalizer(marker);
                }
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        // Remote memberships with no backing User record still block:
        // removing the role would silently revoke a live account's access.
        match binding.api.list_role_members(&remote_name).await {
            Ok(members) if !members.is_empty() => {
                return Err(ReconcileError::DependencyBlocked {
                    subject,
                    dependents: format!("remote members {}", members.join(", ")),
                });
            }
            Ok(_) => {}
            Err(err) if err.is_not_found() => {}
            Err(err) => {
                return Err(ReconcileError::remote(
                    format!(
                        "list members of role {remote_name} on server {}",
                        binding.server
                    ),
                    err,
                ));
            }
        }

        let strip_permissions = TeardownStep::new(ROLE_PERMISSIONS, {
            let api = binding.api.clone();
            let server = binding.server.clone();
            let remote_name = remote_name.clone();
            async move {
                let held = match api.list_role_permissions(&remote_name).await {
                    Ok(held) => held,
                    Err(err) if err.is_not_found() => return Ok(()),
                    Err(err) => {
                        return Err(ReconcileError::remote(
                            format!(
                                "list permissions of role {remote_name} on server {server}"
                            ),
                            err,
                        ))
                    }
                };
                for permission in &held {
                    if let Err(err) = api.remove_role_permission(&remote_name, permission).await {
                        if !err.is_not_found() {
                            return Err(ReconcileError::remote(
                                format!(
                                    "revoke {permission} from role {remote_name} on server {server}"
                                ),
                                err,
                            ));
                        }
                    }
                }
                Ok(())
            }
        });

        let remove_role = TeardownStep::new(ROLE, {
            let api = binding.api.clone();
            let server = binding.server.clone();
            let remote_name = remote_name.clone();
            async move {
                match api.remove_role(&remote_name).await {
                    Ok(()) => {
                        info!(role = %remote_name, server = %server, "Removed remote role");
                        Ok(())
                    }
                    Err(err) if err.is_not_found() => Ok(()),
                    Err(err) => Err(ReconcileError::remote(
                        format!("remove role {remote_name} on server {server}"),
                        err,
                    )),
                }
            }
        });

        run_teardown(&mut role.metadata, vec![strip_permissions, remove_role]).await
    }
}
