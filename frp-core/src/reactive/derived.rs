//! Derived Nodes
//!
//! A derived node recomputes its value from a tuple of dependency nodes and
//! installs it without ever locking the graph.
//!
//! # How Evaluation Works
//!
//! 1. An evaluation is triggered once at construction and then by every
//!    notification of a dependency.
//!
//! 2. Every dependency is read once. If any of them was never set the
//!    evaluation stops; the node stays unset.
//!
//! 3. The dependency revisions form a revision vector `R`. If the installed
//!    commit already reflects `R`, the evaluation stops. This is what keeps
//!    bursts of notifications from recomputing the same inputs.
//!
//! 4. The strategy (whole value or per element) hands the generator to the
//!    executor. The result may arrive on another thread, much later.
//!
//! 5. The result is committed: if the installed commit reflects `R` by now,
//!    a newer result raced ahead and this one is discarded. Otherwise it is
//!    installed with a compare-and-swap at revision `installed + 1`, retrying
//!    against whatever won a lost race.
//!
//! 6. If the comparator reports the new value different from the one it
//!    replaced, dependents are notified on the committing thread.
//!
//! # Ownership
//!
//! The application (and every downstream node) holds a [`Derived`] handle.
//! Dependency callbacks and pending units of work only hold weak references
//! to the node, so dropping the last handle drops the node even while
//! results for it are still being generated.

use std::fmt::{self, Debug};
use std::sync::{Arc, Weak};

use arc_swap::{ArcSwapOption, Guard};
use tracing::{debug, trace};

use super::comparator::Comparator;
use super::observable::Observable;
use super::same_snapshot;
use crate::graph::{
    Arguments, Commit, Dependencies, Node, Registrations, Revisioned, Revisions, SharedCallback,
};

/// Receives finished results for one node.
pub(crate) trait Install<T, M>: Send + Sync + 'static {
    /// Commit `value` generated from dependency state `revisions`.
    fn install(&self, value: T, memo: M, revisions: &Revisions);
}

/// Where a strategy delivers the result of one evaluation.
pub(crate) struct Submit<T, M = ()> {
    target: Weak<dyn Install<T, M>>,
    revisions: Revisions,
}

impl<T: 'static, M: 'static> Submit<T, M> {
    /// Dependency revisions the result is generated from.
    pub(crate) fn revisions(&self) -> &Revisions {
        &self.revisions
    }

    /// Hand the result to the node, if it still exists.
    pub(crate) fn commit(&self, value: T, memo: M) {
        match self.target.upgrade() {
            Some(target) => target.install(value, memo, &self.revisions),
            None => trace!("node dropped before its value was generated"),
        }
    }
}

/// How a node turns a dependency snapshot into a value.
pub(crate) trait Strategy<Args: Arguments>: Send + Sync + 'static {
    /// Value type of the node.
    type Output: Send + Sync + 'static;

    /// Data attached to each commit, available to the next evaluation.
    type Memo: Send + Sync + 'static;

    /// Generate a value for `snapshot` and deliver it through `submit`.
    ///
    /// `previous` is the commit installed when the evaluation started.
    fn generate(
        &self,
        snapshot: Args::Snapshot,
        previous: Option<Arc<Commit<Self::Output, Self::Memo>>>,
        submit: Submit<Self::Output, Self::Memo>,
    );
}

struct DerivedCore<D, S, C>
where
    D: Dependencies,
    S: Strategy<D::Values>,
{
    slot: ArcSwapOption<Commit<S::Output, S::Memo>>,
    observable: Observable,
    dependencies: D,
    strategy: S,
    comparator: C,
}

impl<D, S, C> DerivedCore<D, S, C>
where
    D: Dependencies,
    S: Strategy<D::Values>,
    C: Comparator<S::Output>,
{
    fn evaluate(self: &Arc<Self>) {
        let Some((snapshot, revisions)) = self.dependencies.snapshot() else {
            trace!("dependency unset, evaluation skipped");
            return;
        };

        let previous = self.slot.load_full();
        if let Some(installed) = &previous {
            if installed.reflects(&revisions) {
                trace!(
                    revision = installed.revision(),
                    "inputs already reflected, evaluation skipped"
                );
                return;
            }
        }

        let target: Arc<dyn Install<S::Output, S::Memo>> = self.clone();
        let submit = Submit {
            target: Arc::downgrade(&target),
            revisions,
        };
        self.strategy.generate(snapshot, previous, submit);
    }
}

impl<D, S, C> Install<S::Output, S::Memo> for DerivedCore<D, S, C>
where
    D: Dependencies,
    S: Strategy<D::Values>,
    C: Comparator<S::Output>,
{
    fn install(&self, value: S::Output, memo: S::Memo, revisions: &Revisions) {
        let value = Arc::new(value);
        let memo = Arc::new(memo);
        let mut current = self.slot.load_full();
        loop {
            let revision = match &current {
                Some(installed) if installed.reflects(revisions) => {
                    debug!(
                        revision = installed.revision(),
                        "superseded by a newer commit, result discarded"
                    );
                    return;
                }
                Some(installed) => installed.revision() + 1,
                None => 1,
            };
            let changed = current
                .as_ref()
                .map_or(true, |installed| !self.comparator.equal(installed.value(), &*value));

            let candidate = Arc::new(Commit::new(
                Revisioned::from_shared(Arc::clone(&value), revision),
                revisions.clone(),
                Arc::clone(&memo),
            ));
            let previous = self.slot.compare_and_swap(&current, Some(candidate));
            if same_snapshot(&*previous, &current) {
                if changed {
                    self.observable.notify();
                } else {
                    debug!(revision, "derived value unchanged, notification suppressed");
                }
                return;
            }
            current = Guard::into_inner(previous);
        }
    }
}

/// Type-erased view of a node core, as seen through a [`Derived`] handle.
trait Upstream<T>: Send + Sync {
    fn current(&self) -> Option<Revisioned<T>>;

    fn revisions(&self) -> Option<Revisions>;

    fn observable(&self) -> &Observable;
}

impl<D, S, C> Upstream<S::Output> for DerivedCore<D, S, C>
where
    D: Dependencies,
    S: Strategy<D::Values>,
    C: Comparator<S::Output>,
{
    fn current(&self) -> Option<Revisioned<S::Output>> {
        self.slot.load_full().map(|commit| commit.current().clone())
    }

    fn revisions(&self) -> Option<Revisions> {
        self.slot.load_full().map(|commit| commit.revisions().clone())
    }

    fn observable(&self) -> &Observable {
        &self.observable
    }
}

struct DerivedInner<T> {
    _registrations: Registrations,
    upstream: Arc<dyn Upstream<T>>,
}

/// Handle to a node whose value is computed from other nodes.
///
/// Created by [`transform`](super::transform), [`map`](super::map),
/// [`filter`](super::filter) and [`map_cache`](super::map_cache).
pub struct Derived<T> {
    inner: Arc<DerivedInner<T>>,
}

impl<T: Send + Sync + 'static> Derived<T> {
    /// Dependency revisions the current value was generated from.
    pub fn revisions(&self) -> Option<Revisions> {
        self.inner.upstream.revisions()
    }
}

impl<T: Send + Sync + 'static> Node for Derived<T> {
    type Value = T;

    fn get(&self) -> Option<Revisioned<T>> {
        self.inner.upstream.current()
    }

    fn observable(&self) -> &Observable {
        self.inner.upstream.observable()
    }
}

impl<T> Clone for Derived<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Debug + Send + Sync + 'static> Debug for Derived<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Derived")
            .field("current", &self.get())
            .field("revisions", &self.revisions())
            .finish()
    }
}

/// Build a node over `dependencies` and evaluate it once.
///
/// Callbacks are registered before the first evaluation so a dependency
/// change racing with construction is never missed.
pub(crate) fn derive<D, S, C>(dependencies: D, strategy: S, comparator: C) -> Derived<S::Output>
where
    D: Dependencies,
    S: Strategy<D::Values>,
    C: Comparator<S::Output>,
{
    let core = Arc::new(DerivedCore {
        slot: ArcSwapOption::empty(),
        observable: Observable::new(),
        dependencies,
        strategy,
        comparator,
    });

    let weak = Arc::downgrade(&core);
    let callback: SharedCallback = Arc::new(move || {
        if let Some(core) = weak.upgrade() {
            core.evaluate();
        }
    });
    let registrations = core.dependencies.observe(&callback);
    core.evaluate();

    Derived {
        inner: Arc::new(DerivedInner {
            _registrations: registrations,
            upstream: core,
        }),
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
