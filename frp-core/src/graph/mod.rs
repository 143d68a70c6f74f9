//! Dataflow Graph Model
//!
//! This module holds the data the graph is made of, independent of how
//! changes propagate:
//!
//! - Revisions, revisioned values and commits (`revision`)
//! - The [`Node`] abstraction and dependency tuples (`node`)
//! - Fan-in collectors for per-element work (`collector`)
//! - The read-only [`VectorView`] produced by those collectors (`view`)
//!
//! # Design Decisions
//!
//! 1. Values are never mutated in place. A node installs a whole new snapshot
//!    and readers keep whatever snapshot they loaded, so a reader can never
//!    see a half-written value.
//!
//! 2. The graph is not centralized. Each node knows its own dependencies and
//!    its own observers; there is no global registry to lock.
//!
//! 3. Dependency revisions are compared as a partial order so a derived node
//!    can tell whether it has already incorporated a combination of inputs.

mod collector;
mod node;
mod revision;
mod view;

pub use collector::{AppendCollector, CountingCollector, FixedSizeCollector};
pub use node::{Arguments, Dependencies, Generator, Node, Registrations, SharedCallback};
pub use revision::{Commit, Revision, Revisioned, Revisions, UNSET_REVISION};
pub use view::{Sequence, VectorView};
