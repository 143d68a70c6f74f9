//! Sink Implementation
//!
//! A [`Sink`] is the read-only end of a graph. It mirrors the value of one
//! node: whenever that node notifies, the sink copies the node's current
//! snapshot into its own slot.
//!
//! # Ordering
//!
//! Notifications for one node can arrive on several threads at once. The
//! sink only ever replaces its snapshot with one of a strictly higher
//! revision, so a late notification can never move it backwards.
//!
//! # Differences from a Derived Node
//!
//! - A sink has no observers and no revision of its own.
//! - A value installed silently (equal under the node's comparator) is not
//!   picked up until the node notifies again.

use std::fmt::{self, Debug};
use std::sync::Arc;

use arc_swap::{ArcSwapOption, Guard};
use tracing::trace;

use super::observable::CallbackHandle;
use super::same_snapshot;
use crate::error::{Error, Result};
use crate::graph::{Node, Revision, Revisioned};

type Read<T> = Box<dyn Fn() -> Option<Revisioned<T>> + Send + Sync>;

struct SinkState<T> {
    slot: ArcSwapOption<Revisioned<T>>,
    read: Read<T>,
}

impl<T> SinkState<T> {
    fn refresh(&self) {
        let Some(latest) = (self.read)() else {
            return;
        };
        let latest = Arc::new(latest);
        let mut current = self.slot.load_full();
        loop {
            if let Some(held) = &current {
                if held.revision() >= latest.revision() {
                    trace!(
                        held = held.revision(),
                        offered = latest.revision(),
                        "sink already holds a newer value"
                    );
                    return;
                }
            }
            let previous = self.slot.compare_and_swap(&current, Some(Arc::clone(&latest)));
            if same_snapshot(&*previous, &current) {
                return;
            }
            current = Guard::into_inner(previous);
        }
    }
}

/// Read-only mirror of a node's value.
///
/// # Example
///
/// ```rust,ignore
/// let count = source(1);
/// let view = sink(count.clone());
///
/// count.assign(2);
/// assert_eq!(*view.value()?, 2);
/// ```
pub struct Sink<T> {
    state: Arc<SinkState<T>>,
    _registration: CallbackHandle,
}

/// Mirror the value of `dependency`.
pub fn sink<N: Node>(dependency: N) -> Sink<N::Value> {
    let observed = dependency.clone();
    let state = Arc::new(SinkState {
        slot: ArcSwapOption::empty(),
        read: Box::new(move || observed.get()),
    });

    let weak = Arc::downgrade(&state);
    let registration = dependency.add_callback(move || {
        if let Some(state) = weak.upgrade() {
            state.refresh();
        }
    });
    state.refresh();

    Sink {
        state,
        _registration: registration,
    }
}

impl<T> Sink<T> {
    /// The mirrored snapshot, possibly empty.
    pub fn get(&self) -> Reference<T> {
        Reference {
            current: self.state.slot.load_full(),
        }
    }

    /// The mirrored value, or [`Error::Unavailable`] before the first one.
    pub fn value(&self) -> Result<Arc<T>> {
        self.state
            .slot
            .load_full()
            .map(|current| Arc::clone(current.shared()))
            .ok_or(Error::Unavailable)
    }

    /// Whether a value has been mirrored yet.
    pub fn is_available(&self) -> bool {
        self.state.slot.load().is_some()
    }

    /// Revision of the mirrored value, if any.
    pub fn revision(&self) -> Option<Revision> {
        self.state.slot.load_full().map(|current| current.revision())
    }
}

impl<T: Debug> Debug for Sink<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink")
            .field("current", &self.state.slot.load_full())
            .finish()
    }
}

/// A snapshot read from a [`Sink`].
///
/// Holding a reference keeps its value alive no matter how many newer values
/// the sink mirrors afterwards.
pub struct Reference<T> {
    current: Option<Arc<Revisioned<T>>>,
}

impl<T> Reference<T> {
    /// Whether the reference holds a value.
    pub fn is_available(&self) -> bool {
        self.current.is_some()
    }

    /// The value, or [`Error::Unavailable`] if the sink had none.
    pub fn value(&self) -> Result<&T> {
        self.current
            .as_deref()
            .map(Revisioned::value)
            .ok_or(Error::Unavailable)
    }

    /// Revision of the held value.
    pub fn revision(&self) -> Option<Revision> {
        self.current.as_ref().map(|current| current.revision())
    }
}

impl<T> Clone for Reference<T> {
    fn clone(&self) -> Self {
        Self {
            current: self.current.clone(),
        }
    }
}

impl<T: Debug> Debug for Reference<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.current {
            Some(current) => f.debug_tuple("Reference").field(current).finish(),
            None => f.write_str("Reference(<unavailable>)"),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
