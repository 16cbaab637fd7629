//! Graph node trait: one transition in a StateGraph.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::error::RunError;

use super::Next;

/// One step in a graph: state in, (state out, next step).
///
/// Errors returned here abort the whole run, so nodes only return `Err` for
/// conditions the caller must see (invalid config, graph store down). Everything
/// else is folded into the state.
#[async_trait]
pub trait Node<S>: Send + Sync
where
    S: Clone + Send + Sync + Debug + 'static,
{
    /// Node id (e.g. `"resolve"`, `"explore"`). Must be unique within a graph.
    fn id(&self) -> &str;

    async fn run(&self, state: S) -> Result<(S, Next), RunError>;
}
