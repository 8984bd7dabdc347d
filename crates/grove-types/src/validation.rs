//! Spec validation errors
//!
//! Validation runs at the start of every reconcile pass. A failure is
//! terminal until the spec is edited, so each variant spells out exactly
//! which field is wrong; the text surfaces verbatim in the Invalid condition.

use thiserror::Error;

/// Why a record's spec was rejected.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Server URL cannot be empty")]
    EmptyServerUrl,

    #[error("Server URL {url:?} is not a valid absolute URL: {source}")]
    InvalidServerUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("{field} reference must name a resource")]
    MissingReference { field: &'static str },

    #[error("Permission {index} has an empty action")]
    EmptyPermissionAction { index: usize },

    #[error("Permission {index} has an empty resource type")]
    EmptyPermissionResourceType { index: usize },

    #[error("Permission {index} must name at least one resource")]
    EmptyPermissionResources { index: usize },

    #[error("Role membership {index} cannot be empty")]
    EmptyRoleMembership { index: usize },

    #[error("Database name cannot be empty")]
    EmptyDatabaseName,

    #[error("At least one server reference is required")]
    NoServerRefs,

    #[error("Named graph prefix cannot be empty")]
    EmptyNamedGraphPrefix,

    #[error("Organization name cannot be empty")]
    EmptyOrganizationName,

    #[error("At least one named graph is required")]
    NoNamedGraphs,

    #[error("Named graph {index} cannot be empty")]
    EmptyNamedGraph { index: usize },

    #[error("At least one database name is required")]
    NoDatabaseNames,

    #[error("Database name {index} cannot be empty")]
    EmptyDatabaseSetEntry { index: usize },
}
