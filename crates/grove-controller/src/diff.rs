//! The remote state differ
//!
//! One pure comparison drives every collection the controller converges:
//! permissions on a role, role memberships on a user, derived children of a
//! composite. Callers supply the equivalence relation; the differ never
//! mutates anything.

/// What has to change to make an observed collection match a desired one.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionDelta<T> {
    /// Desired items with no equivalent in the observed collection
    pub to_add: Vec<T>,

    /// Observed items with no equivalent in the desired collection
    pub to_remove: Vec<T>,
}

impl<T> CollectionDelta<T> {
    /// Whether the collections already match under the equivalence used.
    pub fn is_noop(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Compare `desired` against `observed` under `eq`.
///
/// Items keep their input order: `to_add` follows the desired collection,
/// `to_remove` the observed one.
pub fn diff_collections<T: Clone>(
    desired: &[T],
    observed: &[T],
    eq: impl Fn(&T, &T) -> bool,
) -> CollectionDelta<T> {
    let to_add = desired
        .iter()
        .filter(|&wanted| !observed.iter().any(|have| eq(wanted, have)))
        .cloned()
        .collect();

    let to_remove = observed
        .iter()
        .filter(|&have| !desired.iter().any(|wanted| eq(wanted, have)))
        .cloned()
        .collect();

    CollectionDelta { to_add, to_remove }
}
