//! Value comparators.
//!
//! A node compares every newly produced value with the one it replaces. When
//! the comparator reports them equal, the new value is still installed but
//! downstream nodes are not notified.

use crate::graph::VectorView;

/// Decides whether two values are equal for change propagation.
pub trait Comparator<T: ?Sized>: Send + Sync + 'static {
    /// Whether `a` and `b` count as the same value.
    fn equal(&self, a: &T, b: &T) -> bool;
}

/// `PartialEq` equality. The default comparator.
#[derive(Debug, Clone, Copy, Default)]
pub struct Equal;

impl<T: PartialEq + ?Sized> Comparator<T> for Equal {
    fn equal(&self, a: &T, b: &T) -> bool {
        a == b
    }
}

impl<T: ?Sized, F> Comparator<T> for F
where
    F: Fn(&T, &T) -> bool + Send + Sync + 'static,
{
    fn equal(&self, a: &T, b: &T) -> bool {
        self(a, b)
    }
}

/// Compares two [`VectorView`]s element by element with an inner comparator.
///
/// Views of different length are never equal.
#[derive(Debug, Clone, Copy, Default)]
pub struct Elementwise<C>(pub C);

impl<T, C: Comparator<T>> Comparator<VectorView<T>> for Elementwise<C> {
    fn equal(&self, a: &VectorView<T>, b: &VectorView<T>) -> bool {
        a.len() == b.len() && a.iter().zip(b.iter()).all(|(a, b)| self.0.equal(a, b))
    }
}
