//! Sources and Variables
//!
//! A [`Source`] is a node without dependencies; its value is assigned from
//! outside the graph. A [`Variable`] is a source that can also be updated
//! from its own current value.
//!
//! # How Assignment Works
//!
//! 1. The current snapshot is loaded.
//!
//! 2. A new snapshot is built with revision `current + 1` (or `1` if the
//!    source was never set).
//!
//! 3. The new snapshot is installed with a compare-and-swap. If another
//!    assignment won the race, steps 1 to 3 are repeated against the winner.
//!
//! 4. If the comparator reports the new value different from the one it
//!    replaced, the observable is notified on the calling thread. An equal
//!    value is installed all the same (its revision still advances) but
//!    nobody is notified.

use std::fmt::{self, Debug};
use std::sync::Arc;

use arc_swap::{ArcSwapOption, Guard};
use tracing::debug;

use super::comparator::{Comparator, Equal};
use super::observable::Observable;
use super::same_snapshot;
use crate::graph::{Node, Revision, Revisioned, UNSET_REVISION};

struct SourceInner<T> {
    slot: ArcSwapOption<Revisioned<T>>,
    observable: Observable,
    comparator: Box<dyn Comparator<T>>,
}

/// A node whose value is assigned from outside the graph.
///
/// # Example
///
/// ```rust,ignore
/// let count = source(0);
/// let doubled = transform(|count: &i32| count * 2, (count.clone(),));
///
/// count.assign(5);
/// assert_eq!(*doubled.value()?, 10);
/// ```
pub struct Source<T> {
    inner: Arc<SourceInner<T>>,
}

/// Create a source holding `value` at revision 1.
pub fn source<T>(value: T) -> Source<T>
where
    T: PartialEq + Send + Sync + 'static,
{
    Source::with_comparator(Some(value), Equal)
}

/// Create a source with no value (revision 0).
pub fn source_unset<T>() -> Source<T>
where
    T: PartialEq + Send + Sync + 'static,
{
    Source::with_comparator(None, Equal)
}

impl<T: Send + Sync + 'static> Source<T> {
    /// Create a source that uses `comparator` to suppress notifications.
    pub fn with_comparator<C: Comparator<T>>(value: Option<T>, comparator: C) -> Self {
        Self {
            inner: Arc::new(SourceInner {
                slot: ArcSwapOption::new(value.map(|value| Arc::new(Revisioned::new(value, 1)))),
                observable: Observable::new(),
                comparator: Box::new(comparator),
            }),
        }
    }

    /// Install `value` and notify dependents if it changed.
    ///
    /// Returns the revision the value was installed with.
    pub fn assign(&self, value: T) -> Revision {
        let value = Arc::new(value);
        self.commit_with(|_| Some(Arc::clone(&value)))
    }

    /// Install the value produced by `next` from the current one.
    ///
    /// `next` is called again after every lost race. Returning `None` leaves
    /// the source untouched.
    fn commit_with<F>(&self, mut next: F) -> Revision
    where
        F: FnMut(Option<&T>) -> Option<Arc<T>>,
    {
        let inner = &self.inner;
        let mut current = inner.slot.load_full();
        loop {
            let Some(value) = next(current.as_deref().map(Revisioned::value)) else {
                return current.map_or(UNSET_REVISION, |current| current.revision());
            };
            let revision = current.as_ref().map_or(UNSET_REVISION, |current| current.revision()) + 1;
            let changed = current
                .as_ref()
                .map_or(true, |current| !inner.comparator.equal(current.value(), &*value));

            let candidate = Arc::new(Revisioned::from_shared(value, revision));
            let previous = inner.slot.compare_and_swap(&current, Some(candidate));
            if same_snapshot(&*previous, &current) {
                if changed {
                    inner.observable.notify();
                } else {
                    debug!(revision, "source value unchanged, notification suppressed");
                }
                return revision;
            }
            current = Guard::into_inner(previous);
        }
    }
}

impl<T: Send + Sync + 'static> Node for Source<T> {
    type Value = T;

    fn get(&self) -> Option<Revisioned<T>> {
        self.inner.slot.load_full().map(|current| (*current).clone())
    }

    fn observable(&self) -> &Observable {
        &self.inner.observable
    }
}

impl<T> Clone for Source<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Debug> Debug for Source<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("current", &self.inner.slot.load_full())
            .field("observable", &self.inner.observable)
            .finish()
    }
}

/// A source that can also be updated from its current value.
pub struct Variable<T> {
    source: Source<T>,
}

/// Create a variable holding `value` at revision 1.
pub fn variable<T>(value: T) -> Variable<T>
where
    T: PartialEq + Send + Sync + 'static,
{
    Variable {
        source: source(value),
    }
}

impl<T: Send + Sync + 'static> Variable<T> {
    /// Create a variable that uses `comparator` to suppress notifications.
    pub fn with_comparator<C: Comparator<T>>(value: T, comparator: C) -> Self {
        Self {
            source: Source::with_comparator(Some(value), comparator),
        }
    }

    /// Install `value`; see [`Source::assign`].
    pub fn assign(&self, value: T) -> Revision {
        self.source.assign(value)
    }

    /// Replace the value with `f(current)`.
    ///
    /// Concurrent updates never get lost: if another thread installs a value
    /// between the read and the install, `f` runs again on the newer value.
    pub fn modify<F>(&self, f: F) -> Revision
    where
        F: Fn(&T) -> T,
    {
        self.source
            .commit_with(|current| current.map(|current| Arc::new(f(current))))
    }
}

impl<T: Send + Sync + 'static> Node for Variable<T> {
    type Value = T;

    fn get(&self) -> Option<Revisioned<T>> {
        self.source.get()
    }

    fn observable(&self) -> &Observable {
        self.source.observable()
    }
}

impl<T> Clone for Variable<T> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
        }
    }
}

impl<T: Debug> Debug for Variable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("current", &self.source.inner.slot.load_full())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::thread;

    fn count_notifications<N: Node>(node: &N) -> (Arc<AtomicI32>, crate::reactive::CallbackHandle) {
        let count = Arc::new(AtomicI32::new(0));
        let count_clone = count.clone();
        let handle = node.add_callback(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        (count, handle)
    }

    #[test]
    fn initial_value_has_revision_one() {
        let source = source(5);
        assert_eq!(*source.value().unwrap(), 5);
        assert_eq!(source.revision(), 1);
    }

    #[test]
    fn unset_source_becomes_available_on_assign() {
        let source = source_unset::<i32>();
        assert!(!source.is_set());

        assert_eq!(source.assign(5), 1);
        assert!(source.is_set());
        assert_eq!(*source.value().unwrap(), 5);
    }

    #[test]
    fn assign_notifies_and_advances_revision() {
        let source = source(0);
        let (count, _handle) = count_notifications(&source);

        assert_eq!(source.assign(1), 2);
        assert_eq!(source.assign(2), 3);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn equal_assignment_is_installed_silently() {
        let source = source(7);
        let (count, _handle) = count_notifications(&source);

        assert_eq!(source.assign(7), 2);
        assert_eq!(source.revision(), 2);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn custom_comparator_decides_notification() {
        let source = Source::with_comparator(Some(2), |a: &i32, b: &i32| a % 2 == b % 2);
        let (count, _handle) = count_notifications(&source);

        source.assign(4);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        // The equal value is still the current one.
        assert_eq!(*source.value().unwrap(), 4);

        source.assign(5);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clones_share_the_node() {
        let first = source(String::from("a"));
        let second = first.clone();

        second.assign(String::from("b"));
        assert_eq!(first.value().unwrap().as_str(), "b");
    }

    #[test]
    fn readers_keep_their_snapshot() {
        let source = source(vec![1, 2, 3]);
        let held = source.get().unwrap();

        source.assign(vec![4]);
        assert_eq!(held.value(), &vec![1, 2, 3]);
        assert_eq!(held.revision(), 1);
    }

    #[test]
    fn concurrent_assignments_each_advance_revision() {
        let source = source(0usize);
        thread::scope(|scope| {
            for worker in 0..8 {
                let source = &source;
                scope.spawn(move || {
                    for step in 0..100 {
                        source.assign(worker * 1000 + step);
                    }
                });
            }
        });

        assert_eq!(source.revision(), 801);
    }

    #[test]
    fn modify_derives_from_current_value() {
        let variable = variable(10);
        assert_eq!(variable.modify(|value| value + 5), 2);
        assert_eq!(*variable.value().unwrap(), 15);
    }

    #[test]
    fn concurrent_modify_loses_no_update() {
        let variable = variable(0);
        thread::scope(|scope| {
            for _ in 0..8 {
                let variable = &variable;
                scope.spawn(move || {
                    for _ in 0..1000 {
                        variable.modify(|value| value + 1);
                    }
                });
            }
        });

        assert_eq!(*variable.value().unwrap(), 8000);
        assert_eq!(variable.revision(), 8001);
    }
}
