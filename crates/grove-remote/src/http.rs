//! HTTP administration API client

use grove_types::Permission;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;

use crate::api::GraphAdminApi;
use crate::credentials::Credentials;
use crate::error::{RemoteError, Result};
use async_trait::async_trait;

/// HTTP client for one server's administration REST API.
///
/// Bound to a single server and credential pair; every call authenticates
/// with basic auth. A 404 maps to [`RemoteError::NotFound`] naming the
/// target; any other non-success status surfaces as [`RemoteError::Api`]
/// with the response body as the message.
pub struct HttpAdminApi {
    client: Client,
    base_url: String,
    credentials: Credentials,
}

// Response bodies. Absent lists deserialize as empty, so a server omitting
// a list field reads the same as one reporting an empty list.

#[derive(Debug, Deserialize)]
struct DatabaseList {
    #[serde(default)]
    databases: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RoleList {
    #[serde(default)]
    roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PermissionList {
    #[serde(default)]
    permissions: Vec<Permission>,
}

#[derive(Debug, Deserialize)]
struct UserList {
    #[serde(default)]
    users: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EnabledFlag {
    #[serde(default)]
    enabled: bool,
}

impl HttpAdminApi {
    /// Create a client bound to `base_url` with `credentials`.
    pub fn new(base_url: &str, credentials: Credentials) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    // ========== Internal HTTP helpers ==========

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .request(method, url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, what: &str) -> Result<T> {
        let response = self.request(reqwest::Method::GET, path).send().await?;
        Ok(Self::handle(response, what).await?.json().await?)
    }

    async fn post_json<B: Serialize>(&self, path: &str, body: &B, what: &str) -> Result<()> {
        let response = self
            .request(reqwest::Method::POST, path)
            .json(body)
            .send()
            .await?;
        Self::handle(response, what).await?;
        Ok(())
    }

    async fn put_json<B: Serialize>(&self, path: &str, body: &B, what: &str) -> Result<()> {
        let response = self
            .request(reqwest::Method::PUT, path)
            .json(body)
            .send()
            .await?;
        Self::handle(response, what).await?;
        Ok(())
    }

    async fn put_empty(&self, path: &str, what: &str) -> Result<()> {
        let response = self.request(reqwest::Method::PUT, path).send().await?;
        Self::handle(response, what).await?;
        Ok(())
    }

    async fn delete_path(&self, path: &str, what: &str) -> Result<()> {
        let response = self.request(reqwest::Method::DELETE, path).send().await?;
        Self::handle(response, what).await?;
        Ok(())
    }

    async fn handle(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(RemoteError::not_found(what));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RemoteError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl GraphAdminApi for HttpAdminApi {
    async fn list_databases(&self) -> Result<Vec<String>> {
        let list: DatabaseList = self.get_json("/admin/databases", "databases").await?;
        Ok(list.databases)
    }

    async fn create_database(&self, name: &str) -> Result<()> {
        self.post_json(
            "/admin/databases",
            &json!({ "name": name }),
            &format!("database {name}"),
        )
        .await
    }

    async fn drop_database(&self, name: &str) -> Result<()> {
        self.delete_path(
            &format!("/admin/databases/{name}"),
            &format!("database {name}"),
        )
        .await
    }

    async fn list_roles(&self) -> Result<Vec<String>> {
        let list: RoleList = self.get_json("/admin/roles", "roles").await?;
        Ok(list.roles)
    }

    async fn create_role(&self, name: &str) -> Result<()> {
        self.post_json(
            "/admin/roles",
            &json!({ "name": name }),
            &format!("role {name}"),
        )
        .await
    }

    async fn remove_role(&self, name: &str) -> Result<()> {
        self.delete_path(&format!("/admin/roles/{name}"), &format!("role {name}"))
            .await
    }

    async fn list_role_permissions(&self, role: &str) -> Result<Vec<Permission>> {
        let list: PermissionList = self
            .get_json(
                &format!("/admin/roles/{role}/permissions"),
                &format!("role {role}"),
            )
            .await?;
        Ok(list.permissions)
    }

    async fn add_role_permission(&self, role: &str, permission: &Permission) -> Result<()> {
        self.post_json(
            &format!("/admin/roles/{role}/permissions"),
            permission,
            &format!("role {role}"),
        )
        .await
    }

    async fn remove_role_permission(&self, role: &str, permission: &Permission) -> Result<()> {
        // Removal posts the permission body; DELETE requests carry none.
        self.post_json(
            &format!("/admin/roles/{role}/permissions/remove"),
            permission,
            &format!("permission {permission} on role {role}"),
        )
        .await
    }

    async fn list_role_members(&self, role: &str) -> Result<Vec<String>> {
        let list: UserList = self
            .get_json(
                &format!("/admin/roles/{role}/users"),
                &format!("role {role}"),
            )
            .await?;
        Ok(list.users)
    }

    async fn list_users(&self) -> Result<Vec<String>> {
        let list: UserList = self.get_json("/admin/users", "users").await?;
        Ok(list.users)
    }

    async fn create_user(&self, name: &str, password: &str) -> Result<()> {
        self.post_json(
            "/admin/users",
            &json!({ "username": name, "password": password }),
            &format!("user {name}"),
        )
        .await
    }

    async fn remove_user(&self, name: &str) -> Result<()> {
        self.delete_path(&format!("/admin/users/{name}"), &format!("user {name}"))
            .await
    }

    async fn set_password(&self, name: &str, password: &str) -> Result<()> {
        self.put_json(
            &format!("/admin/users/{name}/password"),
            &json!({ "password": password }),
            &format!("user {name}"),
        )
        .await
    }

    async fn user_enabled(&self, name: &str) -> Result<bool> {
        let flag: EnabledFlag = self
            .get_json(
                &format!("/admin/users/{name}/enabled"),
                &format!("user {name}"),
            )
            .await?;
        Ok(flag.enabled)
    }

    async fn list_user_roles(&self, user: &str) -> Result<Vec<String>> {
        let list: RoleList = self
            .get_json(&format!("/admin/users/{user}/roles"), &format!("user {user}"))
            .await?;
        Ok(list.roles)
    }

    async fn add_user_role(&self, user: &str, role: &str) -> Result<()> {
        self.put_empty(
            &format!("/admin/users/{user}/roles/{role}"),
            &format!("user {user}"),
        )
        .await
    }

    async fn remove_user_role(&self, user: &str, role: &str) -> Result<()> {
        self.delete_path(
            &format!("/admin/users/{user}/roles/{role}"),
            &format!("membership {role} on user {user}"),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let api = HttpAdminApi::new(
            "http://graph.internal:5820/",
            Credentials::new("admin", "pw"),
        )
        .unwrap();
        assert_eq!(api.base_url, "http://graph.internal:5820");
    }
}
