//! Sets of handles (`AttributeHandleSet`, `FederateHandleSet`, ...).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{
    error::{ErrorKind, RtiError},
    handle::{AttributeHandle, DimensionHandle, FederateHandle, Handle, RegionHandle},
};

/// Unordered set of handles of one kind.
///
/// Adding a member twice is a no-op. Removing a non-member is always an
/// error, reported with the kind's "not found" error
/// ([`Handle::NOT_FOUND`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(bound(serialize = "H: Serialize", deserialize = "H: Deserialize<'de>"))]
pub struct HandleSet<H: Handle> {
    members: BTreeSet<H>,
}

/// Set of attribute handles.
pub type AttributeHandleSet = HandleSet<AttributeHandle>;
/// Set of federate handles.
pub type FederateHandleSet = HandleSet<FederateHandle>;
/// Set of region handles.
pub type RegionHandleSet = HandleSet<RegionHandle>;
/// Set of dimension handles.
pub type DimensionHandleSet = HandleSet<DimensionHandle>;

impl<H: Handle> Default for HandleSet<H> {
    fn default() -> Self {
        Self { members: BTreeSet::new() }
    }
}

impl<H: Handle> HandleSet<H> {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert; returns false if already present.
    pub fn add(&mut self, handle: H) -> bool {
        self.members.insert(handle)
    }

    /// Remove a member.
    ///
    /// # Errors
    ///
    /// [`Handle::NOT_FOUND`] if `handle` is not a member.
    pub fn remove(&mut self, handle: H) -> Result<(), RtiError> {
        if self.members.remove(&handle) { Ok(()) } else { Err(handle.not_found()) }
    }

    /// Membership test (`isMember`).
    pub fn contains(&self, handle: H) -> bool {
        self.members.contains(&handle)
    }

    /// True if the set has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Remove every member.
    pub fn clear(&mut self) {
        self.members.clear();
    }

    /// Member at an ordinal position.
    ///
    /// # Errors
    ///
    /// `ArrayIndexOutOfBounds` past the end.
    pub fn get(&self, index: usize) -> Result<H, RtiError> {
        self.members.iter().nth(index).copied().ok_or_else(|| {
            RtiError::new(
                ErrorKind::ArrayIndexOutOfBounds,
                format!("index {index} of {}", self.members.len()),
            )
        })
    }

    /// Iterate over members.
    pub fn iter(&self) -> impl Iterator<Item = H> + '_ {
        self.members.iter().copied()
    }

    /// True if every member of `self` is in `other`.
    pub fn is_subset(&self, other: &Self) -> bool {
        self.members.is_subset(&other.members)
    }

    /// Members present in both sets.
    pub fn intersection(&self, other: &Self) -> Self {
        self.members.intersection(&other.members).copied().collect()
    }

    /// Members of `self` not in `other`.
    pub fn difference(&self, other: &Self) -> Self {
        self.members.difference(&other.members).copied().collect()
    }

    /// Add every member of `other`.
    pub fn extend_from(&mut self, other: &Self) {
        self.members.extend(other.members.iter().copied());
    }
}

impl<H: Handle> FromIterator<H> for HandleSet<H> {
    fn from_iter<I: IntoIterator<Item = H>>(iter: I) -> Self {
        Self { members: iter.into_iter().collect() }
    }
}

impl<H: Handle> Extend<H> for HandleSet<H> {
    fn extend<I: IntoIterator<Item = H>>(&mut self, iter: I) {
        self.members.extend(iter);
    }
}

impl<H: Handle> IntoIterator for HandleSet<H> {
    type Item = H;
    type IntoIter = std::collections::btree_set::IntoIter<H>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.into_iter()
    }
}

impl<'a, H: Handle> IntoIterator for &'a HandleSet<H> {
    type Item = H;
    type IntoIter = std::iter::Copied<std::collections::btree_set::Iter<'a, H>>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.iter().copied()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn attrs(raw: &[u32]) -> AttributeHandleSet {
        raw.iter().map(|r| AttributeHandle::from_raw(*r)).collect()
    }

    #[test]
    fn add_is_idempotent() {
        let mut set = AttributeHandleSet::new();
        assert!(set.add(AttributeHandle::from_raw(1)));
        assert!(!set.add(AttributeHandle::from_raw(1)));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn removing_non_member_is_an_error_even_when_empty() {
        let mut empty = AttributeHandleSet::new();
        assert_eq!(
            empty.remove(AttributeHandle::from_raw(9)).unwrap_err().kind,
            ErrorKind::AttributeNotDefined
        );

        let mut feds: FederateHandleSet = [FederateHandle::from_raw(1)].into_iter().collect();
        assert_eq!(
            feds.remove(FederateHandle::from_raw(2)).unwrap_err().kind,
            ErrorKind::FederateHandleNotKnown
        );
        feds.remove(FederateHandle::from_raw(1)).unwrap();
        assert!(feds.is_empty());
    }

    #[test]
    fn ordinal_access() {
        let set = attrs(&[5, 3]);
        let members: Vec<_> = (0..set.len()).map(|i| set.get(i).unwrap()).collect();
        assert_eq!(members.len(), 2);
        assert!(members.iter().all(|h| set.contains(*h)));
        assert_eq!(set.get(2).unwrap_err().kind, ErrorKind::ArrayIndexOutOfBounds);
    }

    #[test]
    fn set_algebra() {
        let a = attrs(&[1, 2, 3]);
        let b = attrs(&[2, 3, 4]);
        assert_eq!(a.intersection(&b), attrs(&[2, 3]));
        assert_eq!(a.difference(&b), attrs(&[1]));
        assert!(attrs(&[2]).is_subset(&a));
        let mut c = a.clone();
        c.extend_from(&b);
        assert_eq!(c, attrs(&[1, 2, 3, 4]));
        c.clear();
        assert!(c.is_empty());
    }
}
