//! The condition ledger
//!
//! A pass accumulates conditions in a [`ConditionSet`] and merges them over
//! the record's stored list at the end. The merge demotes every stored
//! condition to False first, so whatever the pass did not reassert stops
//! claiming to be true; the pass's own entries then win outright.

use std::collections::BTreeMap;

use chrono::Utc;
use grove_types::{Condition, ConditionStatus, ConditionType};

/// In-flight conditions for a single reconcile pass.
#[derive(Debug, Clone, Default)]
pub struct ConditionSet {
    entries: BTreeMap<ConditionType, Condition>,
}

impl ConditionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert one condition, replacing any prior entry of the same type.
    pub fn set(
        &mut self,
        condition_type: ConditionType,
        status: ConditionStatus,
        reason: &str,
        message: impl Into<String>,
    ) {
        self.entries.insert(
            condition_type,
            Condition::new(condition_type, status, reason, message),
        );
    }

    /// Update only the status of an entry this pass already set.
    ///
    /// Used to clear an earlier error once a later step succeeds, without
    /// fabricating a condition the pass never reported.
    pub fn set_status_if_present(&mut self, condition_type: ConditionType, status: ConditionStatus) {
        if let Some(condition) = self.entries.get_mut(&condition_type) {
            if condition.status != status {
                condition.status = status;
                condition.last_transition_time = Utc::now();
            }
        }
    }

    pub fn get(&self, condition_type: ConditionType) -> Option<&Condition> {
        self.entries.get(&condition_type)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge this pass's conditions over the stored list.
    ///
    /// Stored conditions are demoted to False (their transition time moves
    /// only when the status actually changes, so repeating the merge is a
    /// no-op), then the pass's entries overwrite per type. The result holds
    /// each type at most once.
    pub fn merge_into(&self, existing: &[Condition]) -> Vec<Condition> {
        let mut merged: BTreeMap<ConditionType, Condition> = BTreeMap::new();

        for prior in existing {
            let mut demoted = prior.clone();
            if demoted.status != ConditionStatus::False {
                demoted.status = ConditionStatus::False;
                demoted.last_transition_time = Utc::now();
            }
            merged.insert(demoted.condition_type, demoted);
        }

        for (condition_type, condition) in &self.entries {
            merged.insert(*condition_type, condition.clone());
        }

        merged.into_values().collect()
    }
}
