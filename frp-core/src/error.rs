//! Error types.

use thiserror::Error;

/// Errors surfaced to callers of the graph.
///
/// Contention between concurrent commits is never reported; it is resolved
/// internally by retrying.
#[derive(Debug, Error)]
pub enum Error {
    /// A node or sink was read before any value was committed.
    #[error("value not available")]
    Unavailable,

    /// A worker thread of [`ThreadPool`](crate::reactive::ThreadPool) could
    /// not be started.
    #[error("failed to spawn worker thread")]
    Spawn(#[from] std::io::Error),
}

/// Result alias using [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;
