//! Sequence Views
//!
//! Per-element combinators read their input through the [`Sequence`] trait
//! and publish their output as a [`VectorView`], a read-only slice that is
//! frozen once a collector completes.

use std::fmt::{self, Debug};
use std::ops::{Deref, Index};

/// A value that can be read as a contiguous run of elements.
pub trait Sequence: Send + Sync + 'static {
    /// Element type.
    type Item: Send + Sync + 'static;

    /// The elements, in order.
    fn as_slice(&self) -> &[Self::Item];
}

impl<T: Send + Sync + 'static> Sequence for Vec<T> {
    type Item = T;

    fn as_slice(&self) -> &[T] {
        self
    }
}

impl<T: Send + Sync + 'static> Sequence for Box<[T]> {
    type Item = T;

    fn as_slice(&self) -> &[T] {
        self
    }
}

impl<T: Send + Sync + 'static, const N: usize> Sequence for [T; N] {
    type Item = T;

    fn as_slice(&self) -> &[T] {
        self
    }
}

impl<T: Send + Sync + 'static> Sequence for VectorView<T> {
    type Item = T;

    fn as_slice(&self) -> &[T] {
        &self.items
    }
}

/// Immutable, iterable result of a fan-in collection.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct VectorView<T> {
    items: Box<[T]>,
}

impl<T> VectorView<T> {
    /// A view with no elements.
    pub fn empty() -> Self {
        Self {
            items: Box::new([]),
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the view has no elements.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Element at `index`, if in range.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// Iterate over the elements in order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }
}

impl<T> Default for VectorView<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> From<Vec<T>> for VectorView<T> {
    fn from(items: Vec<T>) -> Self {
        Self {
            items: items.into_boxed_slice(),
        }
    }
}

impl<T> FromIterator<T> for VectorView<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        iter.into_iter().collect::<Vec<_>>().into()
    }
}

impl<T> Deref for VectorView<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

impl<T> Index<usize> for VectorView<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}

impl<'a, T> IntoIterator for &'a VectorView<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: Debug> Debug for VectorView<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_view() {
        let view = VectorView::<i32>::empty();
        assert!(view.is_empty());
        assert_eq!(view.iter().next(), None);
    }

    #[test]
    fn view_reads_like_a_slice() {
        let view: VectorView<_> = vec![1, 2, 3].into();

        assert_eq!(view.len(), 3);
        assert_eq!(view[1], 2);
        assert_eq!(view.iter().rev().copied().collect::<Vec<_>>(), vec![3, 2, 1]);
        assert_eq!(view.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn arrays_are_sequences() {
        let array = [4, 5];
        assert_eq!(Sequence::as_slice(&array), &[4, 5]);
    }
}
