//! Reactive Primitives
//!
//! This module implements change propagation on top of the graph model:
//! sources, derived nodes, sinks and the executors the derived nodes run
//! their functions on.
//!
//! # Concepts
//!
//! ## Sources
//!
//! A [`Source`] holds a value assigned from outside the graph. Assigning a
//! value that differs from the current one notifies every dependent node.
//! A [`Variable`] is a source that can also be updated from its own value.
//!
//! ## Derived Nodes
//!
//! A [`Derived`] node computes its value from a tuple of dependency nodes,
//! either as a whole ([`transform`]) or element by element ([`map`],
//! [`filter`], [`map_cache`]). It re-evaluates whenever a dependency notifies
//! and installs the result only if no newer result got there first.
//!
//! ## Sinks
//!
//! A [`Sink`] is a read-only mirror of one node, the usual way for the
//! application to read results.
//!
//! ## Executors
//!
//! Functions run on the calling thread unless paired with another
//! [`Executor`] through [`execute_on`].
//!
//! # Implementation Notes
//!
//! Propagation is push-based and lock-free: each node holds its current
//! snapshot in an atomically swappable slot and every install is a
//! compare-and-swap loop. A diamond-shaped graph may transiently show
//! siblings at different upstream revisions, but every node converges once
//! the sources stop changing.

mod comparator;
mod derived;
mod executor;
mod map;
mod observable;
mod sink;
mod source;
mod transform;

use std::sync::Arc;

pub use comparator::{Comparator, Elementwise, Equal};
pub use derived::Derived;
pub use executor::{
    execute_on, ExecuteOn, Executor, Immediate, IntoExecuteOn, TaskQueue, ThreadPool,
    ThreadPoolBuilder, Work,
};
pub use map::{filter, filter_with, map, map_cache, map_cache_with, map_with};
pub use observable::{CallbackHandle, CallbackId, Observable};
pub use sink::{sink, Reference, Sink};
pub use source::{source, source_unset, variable, Source, Variable};
pub use transform::{transform, transform_with};

/// Whether a compare-and-swap found the snapshot it expected.
pub(crate) fn same_snapshot<U>(found: &Option<Arc<U>>, expected: &Option<Arc<U>>) -> bool {
    match (found, expected) {
        (Some(found), Some(expected)) => Arc::ptr_eq(found, expected),
        (None, None) => true,
        _ => false,
    }
}
