//! Revisions and Snapshots
//!
//! Every value stored in the graph is tagged with a revision number. A node
//! never mutates a stored value in place; it replaces the whole snapshot.
//!
//! # Revision Vectors
//!
//! A derived node remembers, next to its value, the revision of every
//! dependency it read when the value was generated. Two such vectors are
//! compared component-wise, which gives a partial order: a vector "covers"
//! another when no slot is behind. Vectors read concurrently from a diamond
//! can be incomparable; neither covers the other and both are accepted.

use std::fmt::{self, Debug};
use std::ops::Deref;
use std::sync::Arc;

use smallvec::SmallVec;

/// Monotonically increasing version tag of a node's value.
pub type Revision = u64;

/// Revision of a node that has never committed a value.
pub const UNSET_REVISION: Revision = 0;

/// One revision per dependency, in dependency order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Revisions(SmallVec<[Revision; 4]>);

impl Revisions {
    /// Create an empty vector (a node without dependencies).
    pub fn new() -> Self {
        Self(SmallVec::new())
    }

    /// Copy a slice of revisions.
    pub fn from_slice(revisions: &[Revision]) -> Self {
        Self(SmallVec::from_slice(revisions))
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the vector has no slots.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Revision recorded for the dependency at `index`.
    pub fn get(&self, index: usize) -> Option<Revision> {
        self.0.get(index).copied()
    }

    /// All slots.
    pub fn as_slice(&self) -> &[Revision] {
        &self.0
    }

    /// Whether every slot of `self` is at least the matching slot of `other`.
    pub fn covers(&self, other: &Self) -> bool {
        debug_assert_eq!(
            self.len(),
            other.len(),
            "revision vectors of different arity"
        );
        self.0.iter().zip(other.0.iter()).all(|(own, theirs)| own >= theirs)
    }

    /// Like [`covers`](Self::covers) but ignoring the slot at `skip`.
    pub fn covers_except(&self, other: &Self, skip: usize) -> bool {
        debug_assert_eq!(
            self.len(),
            other.len(),
            "revision vectors of different arity"
        );
        self.0
            .iter()
            .zip(other.0.iter())
            .enumerate()
            .filter(|(index, _)| *index != skip)
            .all(|(_, (own, theirs))| own >= theirs)
    }
}

impl FromIterator<Revision> for Revisions {
    fn from_iter<I: IntoIterator<Item = Revision>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// An immutable `(value, revision)` pair.
///
/// The value sits behind an `Arc`, so cloning a `Revisioned` is cheap and a
/// reader keeps the value alive no matter how many newer snapshots are
/// installed after it was read.
pub struct Revisioned<T> {
    value: Arc<T>,
    revision: Revision,
}

impl<T> Revisioned<T> {
    /// Wrap a value with the given revision.
    pub fn new(value: T, revision: Revision) -> Self {
        Self::from_shared(Arc::new(value), revision)
    }

    /// Tag an already shared value with a revision.
    pub fn from_shared(value: Arc<T>, revision: Revision) -> Self {
        Self { value, revision }
    }

    /// The stored value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// The shared handle to the stored value.
    pub fn shared(&self) -> &Arc<T> {
        &self.value
    }

    /// Give up the revision and keep the shared value.
    pub fn into_shared(self) -> Arc<T> {
        self.value
    }

    /// The revision this value was installed with.
    pub fn revision(&self) -> Revision {
        self.revision
    }
}

impl<T> Clone for Revisioned<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            revision: self.revision,
        }
    }
}

impl<T> Deref for Revisioned<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: Debug> Debug for Revisioned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Revisioned")
            .field("value", &self.value)
            .field("revision", &self.revision)
            .finish()
    }
}

/// A snapshot installed in a derived node.
///
/// Besides the revisioned value it carries the dependency revisions the value
/// was generated from, and an optional per-commit memo (the `map_cache` lookup
/// table). The memo lives exactly as long as the commit does.
pub struct Commit<T, M = ()> {
    current: Revisioned<T>,
    revisions: Revisions,
    memo: Arc<M>,
}

impl<T, M> Commit<T, M> {
    /// Assemble a commit.
    pub fn new(current: Revisioned<T>, revisions: Revisions, memo: Arc<M>) -> Self {
        Self {
            current,
            revisions,
            memo,
        }
    }

    /// The revisioned value.
    pub fn current(&self) -> &Revisioned<T> {
        &self.current
    }

    /// The committed value.
    pub fn value(&self) -> &T {
        self.current.value()
    }

    /// The node revision of this commit.
    pub fn revision(&self) -> Revision {
        self.current.revision()
    }

    /// Dependency revisions the value was generated from.
    pub fn revisions(&self) -> &Revisions {
        &self.revisions
    }

    /// Data attached to this commit by its generator.
    pub fn memo(&self) -> &M {
        &self.memo
    }

    /// Whether this commit already incorporates the dependency state `revisions`.
    ///
    /// A commit reflects `revisions` when none of its own dependency slots is
    /// behind. Generating again for such a vector could only produce an equal
    /// or older value.
    pub fn reflects(&self, revisions: &Revisions) -> bool {
        self.revisions.covers(revisions)
    }
}

impl<T: Debug, M> Debug for Commit<T, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Commit")
            .field("value", self.current.value())
            .field("revision", &self.current.revision())
            .field("revisions", &self.revisions)
            .finish_non_exhaustive()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn revisions(slots: &[Revision]) -> Revisions {
        Revisions::from_slice(slots)
    }

    #[test]
    fn covers_is_component_wise() {
        assert!(revisions(&[2, 3]).covers(&revisions(&[2, 3])));
        assert!(revisions(&[2, 3]).covers(&revisions(&[1, 3])));
        assert!(!revisions(&[2, 3]).covers(&revisions(&[3, 1])));
    }

    #[test]
    fn incomparable_vectors_cover_neither_way() {
        let left = revisions(&[4, 1]);
        let right = revisions(&[1, 4]);

        assert!(!left.covers(&right));
        assert!(!right.covers(&left));
    }

    #[test]
    fn covers_except_ignores_one_slot() {
        let own = revisions(&[1, 5, 5]);
        let newer_elements = revisions(&[9, 5, 4]);

        assert!(!own.covers(&newer_elements));
        assert!(own.covers_except(&newer_elements, 0));
        assert!(!own.covers_except(&revisions(&[0, 6, 0]), 0));
    }

    #[test]
    fn empty_vectors_cover_each_other() {
        assert!(Revisions::new().covers(&Revisions::new()));
    }

    #[test]
    fn revisioned_clone_shares_value() {
        let first = Revisioned::new(String::from("shared"), 3);
        let second = first.clone();

        assert!(Arc::ptr_eq(first.shared(), second.shared()));
        assert_eq!(second.revision(), 3);
        assert_eq!(&*second, "shared");
    }

    #[test]
    fn commit_reflects_dominated_vectors() {
        let commit = Commit::new(Revisioned::new(7, 2), revisions(&[3, 3]), Arc::new(()));

        assert!(commit.reflects(&revisions(&[3, 3])));
        assert!(commit.reflects(&revisions(&[1, 2])));
        assert!(!commit.reflects(&revisions(&[4, 3])));
        assert_eq!(commit.value(), &7);
        assert_eq!(commit.revision(), 2);
    }
}
