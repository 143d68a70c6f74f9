//! FRP Core
//!
//! This crate provides a push-based, concurrent incremental computation
//! engine. It implements:
//!
//! - Sources holding externally assigned values
//! - Derived nodes combining dependencies as a whole or element by element
//! - Sinks mirroring results for the application
//! - Pluggable executors, from the calling thread to a thread pool
//!
//! Every node holds an immutable, revisioned snapshot. Changes propagate by
//! notification; a derived node recomputes only for inputs it has not
//! already reflected and discards results that a newer one overtook.
//!
//! # Architecture
//!
//! The crate is organized into two modules:
//!
//! - `graph`: revisions, commits, the node abstraction and fan-in collectors
//! - `reactive`: sources, derived nodes, sinks, comparators and executors
//!
//! # Example
//!
//! ```rust,ignore
//! use frp_core::reactive::{sink, source, transform};
//!
//! let top = source(2);
//! let left = transform(|x: &i32| x + 1, (top.clone(),));
//! let right = transform(|x: &i32| x + 2, (top.clone(),));
//! let bottom = sink(transform(|l: &i32, r: &i32| l * r, (left, right)));
//! assert_eq!(*bottom.value()?, 12);
//!
//! top.assign(6);
//! assert_eq!(*bottom.value()?, 56);
//! ```

pub mod graph;
pub mod reactive;

mod error;

pub use error::{Error, Result};
pub use graph::{Node, Revision, Revisioned, VectorView};
pub use reactive::{
    execute_on, filter, map, map_cache, sink, source, source_unset, transform, variable,
    Derived, Sink, Source, Variable,
};
