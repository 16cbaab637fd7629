//! Run error types.
//!
//! Returned by [`ToGRunner::run`](crate::ToGRunner::run) and by graph nodes. Only
//! configuration errors and total graph-store unavailability surface here; every
//! other failure (model, embedding, cache, timeout) degrades inside the run and
//! ends up as a status on the [`QueryResult`](crate::QueryResult).

use thiserror::Error;

use crate::config::ConfigError;
use crate::kg::GraphError;

/// Hard failure of one query execution.
///
/// Surfaced to the caller instead of a `QueryResult`. Everything not listed here
/// is handled by fallback paths.
#[derive(Debug, Error)]
pub enum RunError {
    /// The run configuration failed validation; no work was started.
    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),

    /// The graph store could not be reached, so no traversal can proceed.
    #[error("graph store unavailable: {0}")]
    GraphUnavailable(String),
}

impl RunError {
    /// Maps a graph error to a run error when it is fatal for the whole query.
    ///
    /// Returns `None` for per-entity query failures, which callers treat as an
    /// empty result for that entity.
    pub fn from_graph(err: &GraphError) -> Option<Self> {
        match err {
            GraphError::Unavailable(msg) => Some(RunError::GraphUnavailable(msg.clone())),
            GraphError::Query(_) => None,
        }
    }
}
