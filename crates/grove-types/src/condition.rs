//! Status conditions persisted on every resource record
//!
//! A record's status holds at most one condition per type. Reconcile passes
//! compute a fresh condition map and merge it over the stored list; the merge
//! itself lives in the controller crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The condition types a reconcile pass can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConditionType {
    /// The record is fully synchronized with the remote server
    Ready,
    /// The last synchronization attempt failed
    Errored,
    /// The spec failed validation and will not be retried until edited
    Invalid,
    /// Deletion has begun and teardown is in progress or blocked
    Terminating,
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConditionType::Ready => "Ready",
            ConditionType::Errored => "Errored",
            ConditionType::Invalid => "Invalid",
            ConditionType::Terminating => "Terminating",
        };
        write!(f, "{s}")
    }
}

/// Three-valued condition status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConditionStatus::True => "True",
            ConditionStatus::False => "False",
            ConditionStatus::Unknown => "Unknown",
        };
        write!(f, "{s}")
    }
}

/// One observed condition on a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: ConditionType,

    pub status: ConditionStatus,

    /// Short machine-oriented cause, e.g. "SyncFailed"
    pub reason: String,

    /// Human-oriented detail; error text surfaces here
    pub message: String,

    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    /// New condition stamped with the current time.
    pub fn new(
        condition_type: ConditionType,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            condition_type,
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: Utc::now(),
        }
    }

    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }
}
