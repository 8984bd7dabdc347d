//! The remote administration API trait

use async_trait::async_trait;
use grove_types::Permission;

use crate::error::Result;

/// Administration operations on one graph-database server.
///
/// Every method hits the server bound at construction with the credentials
/// bound at construction. List results are snapshots; callers diff them
/// against desired state rather than assuming freshness. Operations on
/// absent targets fail with a distinguishable NotFound so delete-if-exists
/// logic can treat "already gone" as success.
#[async_trait]
pub trait GraphAdminApi: Send + Sync {
    // Databases

    async fn list_databases(&self) -> Result<Vec<String>>;

    async fn create_database(&self, name: &str) -> Result<()>;

    async fn drop_database(&self, name: &str) -> Result<()>;

    // Roles and permissions

    async fn list_roles(&self) -> Result<Vec<String>>;

    async fn create_role(&self, name: &str) -> Result<()>;

    /// Remove a role. Servers refuse removal while users still hold the
    /// role, so callers clear memberships first.
    async fn remove_role(&self, name: &str) -> Result<()>;

    async fn list_role_permissions(&self, role: &str) -> Result<Vec<Permission>>;

    async fn add_role_permission(&self, role: &str, permission: &Permission) -> Result<()>;

    async fn remove_role_permission(&self, role: &str, permission: &Permission) -> Result<()>;

    /// Usernames currently holding the role.
    async fn list_role_members(&self, role: &str) -> Result<Vec<String>>;

    // Users and memberships

    async fn list_users(&self) -> Result<Vec<String>>;

    async fn create_user(&self, name: &str, password: &str) -> Result<()>;

    async fn remove_user(&self, name: &str) -> Result<()>;

    async fn set_password(&self, name: &str, password: &str) -> Result<()>;

    /// Whether the account is enabled; doubles as the server healthcheck
    /// when asked about the admin account itself.
    async fn user_enabled(&self, name: &str) -> Result<bool>;

    async fn list_user_roles(&self, user: &str) -> Result<Vec<String>>;

    async fn add_user_role(&self, user: &str, role: &str) -> Result<()>;

    async fn remove_user_role(&self, user: &str, role: &str) -> Result<()>;
}
