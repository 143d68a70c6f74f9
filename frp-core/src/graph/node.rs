//! Graph Nodes
//!
//! This module defines what the graph needs from a node and how a derived
//! node reads its dependencies.
//!
//! - [`Node`]: anything exposing a current [`Revisioned`] value and an
//!   [`Observable`] that fires when that value changes.
//! - [`Dependencies`]: a tuple of nodes read together. Reading produces a
//!   snapshot of every value plus the revision vector of that snapshot.
//! - [`Arguments`] and [`Generator`]: the value tuple a generator function is
//!   called with, and the function itself.

use std::sync::Arc;

use smallvec::SmallVec;

use super::revision::{Revision, Revisioned, Revisions, UNSET_REVISION};
use crate::error::{Error, Result};
use crate::reactive::{CallbackHandle, Observable};

/// A node of the dataflow graph.
///
/// Handles are cheap to clone; every clone refers to the same node, and the
/// node lives as long as any handle (held by the application or by a
/// downstream node) does.
pub trait Node: Clone + Send + Sync + 'static {
    /// Type of the value the node holds.
    type Value: Send + Sync + 'static;

    /// The currently installed value, or `None` if nothing was ever committed.
    fn get(&self) -> Option<Revisioned<Self::Value>>;

    /// Notifies after every installed value that differs from its predecessor.
    fn observable(&self) -> &Observable;

    /// Register a callback on this node's observable.
    fn add_callback<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.observable().add_callback(callback)
    }

    /// The current value, or [`Error::Unavailable`] if nothing was committed.
    fn value(&self) -> Result<Arc<Self::Value>> {
        self.get()
            .map(Revisioned::into_shared)
            .ok_or(Error::Unavailable)
    }

    /// Revision of the current value, [`UNSET_REVISION`] if unset.
    fn revision(&self) -> Revision {
        self.get().map_or(UNSET_REVISION, |current| current.revision())
    }

    /// Whether a value was ever committed.
    fn is_set(&self) -> bool {
        self.get().is_some()
    }
}

/// Callback shared by every dependency of one derived node.
pub type SharedCallback = Arc<dyn Fn() + Send + Sync>;

/// Registrations held by a derived node, one per dependency.
pub type Registrations = SmallVec<[CallbackHandle; 2]>;

/// A tuple of values a generator is called with.
pub trait Arguments: Send + Sync + 'static {
    /// One [`Revisioned`] per value.
    type Snapshot: Clone + Send + Sync + 'static;

    /// Borrowed form handed to the generator function.
    type Refs<'a>
    where
        Self: 'a;

    /// Borrow every value of a snapshot.
    fn refs(snapshot: &Self::Snapshot) -> Self::Refs<'_>;
}

/// A function computing one value from a tuple of [`Arguments`].
///
/// Implemented for every `Fn(&A, &B, ...) -> R` that is `Send + Sync`.
pub trait Generator<Args: Arguments>: Send + Sync + 'static {
    /// Generated value.
    type Output: Send + Sync + 'static;

    /// Call the function.
    fn invoke(&self, arguments: Args::Refs<'_>) -> Self::Output;
}

/// A tuple of dependency nodes read together by a derived node.
pub trait Dependencies: Send + Sync + 'static {
    /// The value types, in dependency order.
    type Values: Arguments;

    /// Number of dependencies.
    const ARITY: usize;

    /// Read every dependency once.
    ///
    /// Returns `None` if any dependency has never been set.
    fn snapshot(&self) -> Option<(<Self::Values as Arguments>::Snapshot, Revisions)>;

    /// Register `callback` on every dependency.
    fn observe(&self, callback: &SharedCallback) -> Registrations;
}

impl Arguments for () {
    type Snapshot = ();
    type Refs<'a> = ();

    fn refs(_snapshot: &()) {}
}

impl<F, R> Generator<()> for F
where
    F: Fn() -> R + Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    type Output = R;

    fn invoke(&self, _arguments: ()) -> R {
        self()
    }
}

/// No dependencies: the value is generated once, at construction.
impl Dependencies for () {
    type Values = ();
    const ARITY: usize = 0;

    fn snapshot(&self) -> Option<((), Revisions)> {
        Some(((), Revisions::new()))
    }

    fn observe(&self, _callback: &SharedCallback) -> Registrations {
        Registrations::new()
    }
}

macro_rules! tuple_impls {
    ($(($T:ident, $N:ident, $v:ident, $i:tt)),+) => {
        impl<$($T: Send + Sync + 'static),+> Arguments for ($($T,)+) {
            type Snapshot = ($(Revisioned<$T>,)+);
            type Refs<'a> = ($(&'a $T,)+) where Self: 'a;

            fn refs(snapshot: &Self::Snapshot) -> Self::Refs<'_> {
                ($(snapshot.$i.value(),)+)
            }
        }

        impl<F, R, $($T),+> Generator<($($T,)+)> for F
        where
            F: Fn($(&$T),+) -> R + Send + Sync + 'static,
            R: Send + Sync + 'static,
            $($T: Send + Sync + 'static),+
        {
            type Output = R;

            fn invoke(&self, arguments: <($($T,)+) as Arguments>::Refs<'_>) -> R {
                let ($($v,)+) = arguments;
                self($($v),+)
            }
        }

        impl<$($N: Node),+> Dependencies for ($($N,)+) {
            type Values = ($($N::Value,)+);
            const ARITY: usize = [$(stringify!($N)),+].len();

            fn snapshot(&self) -> Option<(<Self::Values as Arguments>::Snapshot, Revisions)> {
                $(let $v = self.$i.get()?;)+
                let revisions = Revisions::from_slice(&[$($v.revision()),+]);
                Some((($($v,)+), revisions))
            }

            fn observe(&self, callback: &SharedCallback) -> Registrations {
                let mut registrations = Registrations::new();
                $(
                    let shared = Arc::clone(callback);
                    registrations.push(self.$i.add_callback(move || shared()));
                )+
                registrations
            }
        }
    };
}

tuple_impls!((A, NA, a, 0));
tuple_impls!((A, NA, a, 0), (B, NB, b, 1));
tuple_impls!((A, NA, a, 0), (B, NB, b, 1), (C, NC, c, 2));
tuple_impls!((A, NA, a, 0), (B, NB, b, 1), (C, NC, c, 2), (D, ND, d, 3));
tuple_impls!(
    (A, NA, a, 0),
    (B, NB, b, 1),
    (C, NC, c, 2),
    (D, ND, d, 3),
    (E, NE, e, 4)
);
tuple_impls!(
    (A, NA, a, 0),
    (B, NB, b, 1),
    (C, NC, c, 2),
    (D, ND, d, 3),
    (E, NE, e, 4),
    (G, NG, g, 5)
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{source, source_unset, Source};

    #[test]
    fn generator_calls_closure_with_borrowed_values() {
        let add = |left: &i32, right: &i32| left + right;
        let snapshot = (Revisioned::new(2, 1), Revisioned::new(3, 1));

        let sum = Generator::<(i32, i32)>::invoke(&add, <(i32, i32)>::refs(&snapshot));
        assert_eq!(sum, 5);
    }

    #[test]
    fn snapshot_reports_revisions_in_order() {
        let first = source(1);
        let second = source(String::from("a"));
        second.assign(String::from("b"));

        let (values, revisions) = (first.clone(), second.clone())
            .snapshot()
            .expect("both dependencies are set");
        assert_eq!(*values.0, 1);
        assert_eq!(values.1.value(), "b");
        assert_eq!(revisions.as_slice(), &[1, 2]);
        assert_eq!(<(Source<i32>, Source<String>) as Dependencies>::ARITY, 2);
    }

    #[test]
    fn snapshot_is_none_while_any_dependency_is_unset() {
        let set = source(1);
        let unset = source_unset::<i32>();

        assert!((set, unset.clone()).snapshot().is_none());
        unset.assign(4);
        assert!((unset,).snapshot().is_some());
    }

    #[test]
    fn unset_node_reports_unavailable() {
        let unset = source_unset::<i32>();
        assert!(matches!(unset.value(), Err(Error::Unavailable)));
        assert_eq!(unset.revision(), UNSET_REVISION);
        assert!(!unset.is_set());
    }
}
