//! Conditional edges: route to the next node based on state.
//!
//! A source node has a routing function `(state) -> key`; the key is looked up
//! in the path map registered with the edge. Keys missing from the map end the run.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

/// Router function: takes a reference to state and returns a routing key.
pub type ConditionalRouterFn<S> = Arc<dyn Fn(&S) -> String + Send + Sync>;

/// Conditional edge definition: routing function plus its path map.
#[derive(Clone)]
pub struct ConditionalRouter<S> {
    pub(super) path: ConditionalRouterFn<S>,
    /// Map from routing key to node id (or END). Validated at compile time.
    pub(super) path_map: HashMap<String, String>,
}

impl<S> ConditionalRouter<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    pub fn new(path: ConditionalRouterFn<S>, path_map: HashMap<String, String>) -> Self {
        Self { path, path_map }
    }

    /// Resolves the next node id from the current state; `None` when the key is unmapped.
    pub fn resolve_next(&self, state: &S) -> Option<String> {
        let key = (self.path)(state);
        let target = self.path_map.get(&key).cloned();
        if target.is_none() {
            tracing::warn!(key = %key, "conditional router returned unmapped key; ending run");
        }
        target
    }
}

/// How to determine the next node after a given node runs.
#[derive(Clone)]
pub enum NextEntry<S> {
    /// Single fixed next node (or END).
    Unconditional(String),
    /// Next node is decided by the router from state.
    Conditional(ConditionalRouter<S>),
}
