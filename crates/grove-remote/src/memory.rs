//! In-memory administration API
//!
//! A fake server suitable for development and testing. State lives in
//! DashMaps and referential rules hold the way real servers enforce them:
//! a role cannot be removed while users hold it, and a membership cannot
//! name an absent role.

use async_trait::async_trait;
use dashmap::DashMap;
use grove_types::Permission;

use crate::api::GraphAdminApi;
use crate::error::{RemoteError, Result};

#[derive(Clone)]
struct UserRecord {
    password: String,
    enabled: bool,
    roles: Vec<String>,
}

/// Fake graph-database server.
pub struct InMemoryAdminApi {
    databases: DashMap<String, ()>,
    roles: DashMap<String, Vec<Permission>>,
    users: DashMap<String, UserRecord>,
    fail_operations: DashMap<String, ()>,
}

impl InMemoryAdminApi {
    pub fn new() -> Self {
        Self {
            databases: DashMap::new(),
            roles: DashMap::new(),
            users: DashMap::new(),
            fail_operations: DashMap::new(),
        }
    }

    /// Fake with the admin account present and enabled, the state a freshly
    /// installed server boots with.
    pub fn with_admin(username: &str, password: &str) -> Self {
        let api = Self::new();
        api.users.insert(
            username.to_string(),
            UserRecord {
                password: password.to_string(),
                enabled: true,
                roles: Vec::new(),
            },
        );
        api
    }

    /// Flip an account's enabled flag. Returns false when the account does
    /// not exist.
    pub fn set_user_enabled(&self, name: &str, enabled: bool) -> bool {
        match self.users.get_mut(name) {
            Some(mut user) => {
                user.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Whether the account exists and holds exactly this password.
    pub fn password_matches(&self, name: &str, password: &str) -> bool {
        self.users
            .get(name)
            .map(|u| u.password == password)
            .unwrap_or(false)
    }

    /// Force every subsequent call of the named operation to fail.
    pub fn fail_operation(&self, operation: &str) {
        self.fail_operations.insert(operation.to_string(), ());
    }

    pub fn clear_failed_operations(&self) {
        self.fail_operations.clear();
    }

    fn check(&self, operation: &str) -> Result<()> {
        if self.fail_operations.contains_key(operation) {
            return Err(RemoteError::Api {
                status: 500,
                message: format!("{operation} failed"),
            });
        }
        Ok(())
    }

    fn member_names(&self, role: &str) -> Vec<String> {
        let mut members: Vec<String> = self
            .users
            .iter()
            .filter(|entry| entry.value().roles.iter().any(|r| r == role))
            .map(|entry| entry.key().clone())
            .collect();
        members.sort();
        members
    }
}

impl Default for InMemoryAdminApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GraphAdminApi for InMemoryAdminApi {
    async fn list_databases(&self) -> Result<Vec<String>> {
        self.check("list_databases")?;
        let mut names: Vec<String> = self.databases.iter().map(|e| e.key().clone()).collect();
        names.sort();
        Ok(names)
    }

    async fn create_database(&self, name: &str) -> Result<()> {
        self.check("create_database")?;
        if self.databases.contains_key(name) {
            return Err(RemoteError::Api {
                status: 409,
                message: format!("database {name} already exists"),
            });
        }
        self.databases.insert(name.to_string(), ());
        Ok(())
    }

    async fn drop_database(&self, name: &str) -> Result<()> {
        self.check("drop_database")?;
        if self.databases.remove(name).is_none() {
            return Err(RemoteError::not_found(format!("database {name}")));
        }
        Ok(())
    }

    async fn list_roles(&self) -> Result<Vec<String>> {
        self.check("list_roles")?;
        let mut names: Vec<String> = self.roles.iter().map(|e| e.key().clone()).collect();
        names.sort();
        Ok(names)
    }

    async fn create_role(&self, name: &str) -> Result<()> {
        self.check("create_role")?;
        if self.roles.contains_key(name) {
            return Err(RemoteError::Api {
                status: 409,
                message: format!("role {name} already exists"),
            });
        }
        self.roles.insert(name.to_string(), Vec::new());
        Ok(())
    }

    async fn remove_role(&self, name: &str) -> Result<()> {
        self.check("remove_role")?;
        if !self.roles.contains_key(name) {
            return Err(RemoteError::not_found(format!("role {name}")));
        }
        let members = self.member_names(name);
        if !members.is_empty() {
            return Err(RemoteError::Api {
                status: 409,
                message: format!("role {name} still has members: {}", members.join(", ")),
            });
        }
        self.roles.remove(name);
        Ok(())
    }

    async fn list_role_permissions(&self, role: &str) -> Result<Vec<Permission>> {
        self.check("list_role_permissions")?;
        self.roles
            .get(role)
            .map(|p| p.clone())
            .ok_or_else(|| RemoteError::not_found(format!("role {role}")))
    }

    async fn add_role_permission(&self, role: &str, permission: &Permission) -> Result<()> {
        self.check("add_role_permission")?;
        let mut held = self
            .roles
            .get_mut(role)
            .ok_or_else(|| RemoteError::not_found(format!("role {role}")))?;
        if !held.iter().any(|p| p.equivalent(permission)) {
            held.push(permission.clone());
        }
        Ok(())
    }

    async fn remove_role_permission(&self, role: &str, permission: &Permission) -> Result<()> {
        self.check("remove_role_permission")?;
        let mut held = self
            .roles
            .get_mut(role)
            .ok_or_else(|| RemoteError::not_found(format!("role {role}")))?;
        match held.iter().position(|p| p.equivalent(permission)) {
            Some(index) => {
                held.remove(index);
                Ok(())
            }
            None => Err(RemoteError::not_found(format!(
                "permission {permission} on role {role}"
            ))),
        }
    }

    async fn list_role_members(&self, role: &str) -> Result<Vec<String>> {
        self.check("list_role_members")?;
        if !self.roles.contains_key(role) {
            return Err(RemoteError::not_found(format!("role {role}")));
        }
        Ok(self.member_names(role))
    }

    async fn list_users(&self) -> Result<Vec<String>> {
        self.check("list_users")?;
        let mut names: Vec<String> = self.users.iter().map(|e| e.key().clone()).collect();
        names.sort();
        Ok(names)
    }

    async fn create_user(&self, name: &str, password: &str) -> Result<()> {
        self.check("create_user")?;
        if self.users.contains_key(name) {
            return Err(RemoteError::Api {
                status: 409,
                message: format!("user {name} already exists"),
            });
        }
        self.users.insert(
            name.to_string(),
            UserRecord {
                password: password.to_string(),
                enabled: true,
                roles: Vec::new(),
            },
        );
        Ok(())
    }

    async fn remove_user(&self, name: &str) -> Result<()> {
        self.check("remove_user")?;
        if self.users.remove(name).is_none() {
            return Err(RemoteError::not_found(format!("user {name}")));
        }
        Ok(())
    }

    async fn set_password(&self, name: &str, password: &str) -> Result<()> {
        self.check("set_password")?;
        let mut user = self
            .users
            .get_mut(name)
            .ok_or_else(|| RemoteError::not_found(format!("user {name}")))?;
        user.password = password.to_string();
        Ok(())
    }

    async fn user_enabled(&self, name: &str) -> Result<bool> {
        self.check("user_enabled")?;
        self.users
            .get(name)
            .map(|u| u.enabled)
            .ok_or_else(|| RemoteError::not_found(format!("user {name}")))
    }

    async fn list_user_roles(&self, user: &str) -> Result<Vec<String>> {
        self.check("list_user_roles")?;
        self.users
            .get(user)
            .map(|u| u.roles.clone())
            .ok_or_else(|| RemoteError::not_found(format!("user {user}")))
    }

    async fn add_user_role(&self, user: &str, role: &str) -> Result<()> {
        self.check("add_user_role")?;
        if !self.roles.contains_key(role) {
            return Err(RemoteError::not_found(format!("role {role}")));
        }
        let mut record = self
            .users
            .get_mut(user)
            .ok_or_else(|| RemoteError::not_found(format!("user {user}")))?;
        if !record.roles.iter().any(|r| r == role) {
            record.roles.push(role.to_string());
        }
        Ok(())
    }

    async fn remove_user_role(&self, user: &str, role: &str) -> Result<()> {
        self.check("remove_user_role")?;
        let mut record = self
            .users
            .get_mut(user)
            .ok_or_else(|| RemoteError::not_found(format!("user {user}")))?;
        match record.roles.iter().position(|r| r == role) {
            Some(index) => {
                record.roles.remove(index);
                Ok(())
            }
            None => Err(RemoteError::not_found(format!(
                "membership {role} on user {user}"
            ))),
        }
    }
}
