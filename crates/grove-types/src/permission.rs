//! Permission grants and their equivalence rules
//!
//! Remote servers report actions and resource types in whatever case they
//! like, so those fields compare case-insensitively. Resource identifiers are
//! exact: they name databases and graphs, where case is significant. The
//! resource list compares as an unordered set.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// One grant: an action over a typed set of resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Action granted, e.g. "read" or "write"; compared case-insensitively
    pub action: String,

    /// Kind of resource the grant covers, e.g. "db" or "named-graph";
    /// compared case-insensitively
    pub resource_type: String,

    /// Exact resource identifiers; absent lists deserialize as empty
    #[serde(default)]
    pub resources: Vec<String>,
}

impl Permission {
    pub fn new<I, S>(
        action: impl Into<String>,
        resource_type: impl Into<String>,
        resources: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            action: action.into(),
            resource_type: resource_type.into(),
            resources: resources.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether two permissions describe the same grant.
    ///
    /// Case-insensitive on `action` and `resource_type`, exact unordered-set
    /// match on `resources`: the first two are enum-like server vocabulary,
    /// the last names case-significant identifiers.
    pub fn equivalent(&self, other: &Permission) -> bool {
        if !self.action.eq_ignore_ascii_case(&other.action) {
            return false;
        }
        if !self.resource_type.eq_ignore_ascii_case(&other.resource_type) {
            return false;
        }
        let own: HashSet<&str> = self.resources.iter().map(String::as_str).collect();
        let theirs: HashSet<&str> = other.resources.iter().map(String::as_str).collect();
        own == theirs
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}]",
            self.action,
            self.resource_type,
            self.resources.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_and_resource_type_compare_case_insensitively() {
        let a = Permission::new("READ", "DB", ["x"]);
        let b = Permission::new("read", "db", ["x"]);
        assert!(a.equivalent(&b));
    }

    #[test]
    fn resource_identifiers_compare_exactly() {
        let a = Permission::new("read", "db", ["x"]);
        let b = Permission::new("read", "db", ["X"]);
        assert!(!a.equivalent(&b));
    }

    #[test]
    fn resource_order_does_not_matter() {
        let a = Permission::new("write", "db", ["alpha", "beta"]);
        let b = Permission::new("write", "db", ["beta", "alpha"]);
        assert!(a.equivalent(&b));
    }

    #[test]
    fn differing_resource_sets_are_not_equivalent() {
        let a = Permission::new("read", "db", ["alpha", "beta"]);
        let b = Permission::new("read", "db", ["alpha"]);
        assert!(!a.equivalent(&b));
    }

    #[test]
    fn missing_resource_list_deserializes_empty() {
        let p: Permission = serde_json::from_str(r#"{"action":"read","resource_type":"db"}"#)
            .expect("permission without resources should parse");
        assert!(p.resources.is_empty());
        assert!(p.equivalent(&Permission::new("read", "db", Vec::<String>::new())));
    }
}
