//! Server reconciliation
//!
//! A Server pass proves the remote side is reachable and administrable:
//! resolve the admin secret, bind a client, and check that the admin account
//! is enabled. Deletion waits until nothing else references the server.

use std::sync::Arc;

use async_trait::async_trait;
use grove_remote::GraphAdminApi;
use grove_types::{Database, Resource, Role, Server, User};
use tracing::debug;

use crate::context::ReconcileContext;
use crate::driver::Reconciler;
use crate::error::{ReconcileError, Result};
use crate::gate::check_no_dependents;
use crate::kinds::Stores;
use crate::resolver::ServerResolver;

/// Blocks Server deletion while dependent records remain.
pub const SERVER_PROTECTION: &str = "grove.io/server-protection";

const MARKERS: &[&str] = &[SERVER_PROTECTION];

pub struct ServerReconciler {
    resolver: Arc<ServerResolver>,
    stores: Stores,
}

impl ServerReconciler {
    pub fn new(resolver: Arc<ServerResolver>, stores: Stores) -> Self {
        Self { resolver, stores }
    }
}

#[async_trait]
impl Reconciler for ServerReconciler {
    type Resource = Server;

    fn finalizers(&self) -> &'static [&'static str] {
        MARKERS
    }

    fn validate(&self, server: &Server) -> Result<()> {
        server.spec.validate()?;
        Ok(())
    }

    async fn sync(&self, server: &mut Server, ctx: &mut ReconcileContext) -> Result<()> {
        let binding = self.resolver.bind(server).await?;
        let enabled = binding
            .api
            .user_enabled(&binding.admin_user)
            .await
            .map_err(|err| {
                ReconcileError::remote(
                    format!("healthcheck against server {}", binding.server),
                    err,
                )
            })?;
        if !enabled {
            return Err(ReconcileError::NotReady(format!(
                "administrator account {} on server {} is disabled",
                binding.admin_user, binding.server
            )));
        }
        debug!(server = %binding.server, admin = %binding.admin_user, "Healthcheck passed");
        ctx.binding = Some(binding);
        Ok(())
    }

    async fn teardown(&self, server: &mut Server, _ctx: &mut ReconcileContext) -> Result<()> {
        let key = server.key();
        let subject = format!("{} {}", Server::KIND, key);

        // References may come from any namespace.
        check_no_dependents(self.stores.roles.as_ref(), "", &subject, |role: &Role| {
            role.spec
                .server_ref
                .points_at(&role.metadata.namespace, &key)
        })
        .await?;
        check_no_dependents(self.stores.users.as_ref(), "", &subject, |user: &User| {
            user.spec
                .server_ref
                .points_at(&user.metadata.namespace, &key)
        })
        .await?;
        check_no_dependents(
            self.stores.databases.as_ref(),
            "",
            &subject,
            |database: &Database| {
                database
                    .spec
                    .server_refs
                    .iter()
                    .any(|r| r.points_at(&database.metadata.namespace, &key))
            },
        )
        .await?;

        // Nothing on the remote side belongs to the Server record itself.
        server.metadata.remove_finalizer(SERVER_PROTECTION);
        Ok(())
    }
}
