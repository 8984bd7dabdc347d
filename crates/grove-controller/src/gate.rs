//! The dependency gate
//!
//! Deletion ordering between records: a resource cannot go away while other
//! records still point at it. The gate lists candidate dependents, applies a
//! caller-supplied predicate, and fails naming everything that blocks.
//! Records already marked for deletion never block; they are on their way
//! out, and remote-level guards still cover whatever they leave behind.

use grove_store::ResourceStore;
use grove_types::Resource;

use crate::error::{ReconcileError, Result};

/// Fail with [`ReconcileError::DependencyBlocked`] while any live record of
/// kind `R` in `namespace` (empty for all namespaces) satisfies `refers_to`.
///
/// `subject` names the resource being deleted; it heads the error text so
/// status conditions read as "deletion of X is blocked by: ...".
pub async fn check_no_dependents<R: Resource>(
    store: &dyn ResourceStore<R>,
    namespace: &str,
    subject: &str,
    refers_to: impl Fn(&R) -> bool + Send,
) -> Result<()> {
    let blocking: Vec<String> = store
        .list(namespace)
        .await?
        .into_iter()
        .filter(|candidate| !candidate.metadata().is_deleting() && refers_to(candidate))
        .map(|candidate| format!("{} {}", R::KIND, candidate.key()))
        .collect();

    if blocking.is_empty() {
        Ok(())
    } else {
        Err(ReconcileError::DependencyBlocked {
            subject: subject.to_string(),
            dependents: blocking.join(", "),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grove_store::MemoryStore;
    use grove_types::{ResourceRef, SecretRef, User, UserSpec};
    use std::sync::Arc;

    fn member_of(namespace: &str, name: &str, role: &str) -> User {
        User::new(
            namespace,
            name,
            UserSpec {
                server_ref: ResourceRef::new("graph-1"),
                credentials_ref: SecretRef::new(format!("{name}-creds")),
                roles: vec![role.to_string()],
            },
        )
    }

    #[tokio::test]
    async fn live_dependents_block_with_their_names() {
        let store = Arc::new(MemoryStore::new());
        let users: Arc<dyn ResourceStore<User>> = store;
        users
            .create(member_of("prod", "alice", "editors"))
            .await
            .unwrap();
        users
            .create(member_of("prod", "bob", "viewers"))
            .await
            .unwrap();

        let err = check_no_dependents(users.as_ref(), "", "Role prod/editors", |user: &User| {
            user.spec.roles.iter().any(|r| r == "editors")
        })
        .await
        .unwrap_err();

        let text = err.to_string();
        assert!(text.contains("Role prod/editors"));
        assert!(text.contains("User prod/alice"));
        assert!(!text.contains("bob"));
    }

    #[tokio::test]
    async fn deleting_dependents_do_not_block() {
        let store = Arc::new(MemoryStore::new());
        let users: Arc<dyn ResourceStore<User>> = store;

        let mut leaving = member_of("prod", "carol", "editors");
        leaving.metadata.add_finalizer("grove.io/user");
        let leaving = users.create(leaving).await.unwrap();
        // Marked deleting; the finalizer keeps the record around.
        users.delete(&leaving.key()).await.unwrap();

        check_no_dependents(users.as_ref(), "", "Role prod/editors", |user: &User| {
            user.spec.roles.iter().any(|r| r == "editors")
        })
        .await
        .expect("a deleting dependent should not block");
    }

    #[tokio::test]
    async fn no_dependents_passes() {
        let store = Arc::new(MemoryStore::new());
        let users: Arc<dyn ResourceStore<User>> = store;

        check_no_dependents(users.as_ref(), "prod", "Role prod/editors", |_: &User| true)
            .await
            .expect("an empty collection never blocks");
    }
}
