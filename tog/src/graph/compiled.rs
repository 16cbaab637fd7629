//! Compiled state graph: immutable, supports invoke only.
//!
//! Built by `StateGraph::compile`. Runs from the entry node and, after each node,
//! follows the node's `Next` or its conditional router until END.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use crate::error::RunError;

use super::logging::{
    log_graph_complete, log_graph_error, log_graph_start, log_node_complete, log_node_start,
};
use super::state_graph::END;
use super::{Next, NextEntry, Node};

/// Compiled graph: immutable structure, cheap to clone and share across queries.
#[derive(Clone)]
pub struct CompiledStateGraph<S> {
    pub(super) nodes: HashMap<String, Arc<dyn Node<S>>>,
    pub(super) first_node_id: String,
    pub(super) next_map: HashMap<String, NextEntry<S>>,
    pub(super) max_steps: usize,
}

impl<S> CompiledStateGraph<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    /// Id of the node the graph starts from.
    pub fn entry(&self) -> &str {
        &self.first_node_id
    }

    fn resolve_next(&self, current_id: &str, state: &S, next: Next) -> Option<String> {
        if next == Next::End {
            return None;
        }
        match (self.next_map.get(current_id), next) {
            (Some(NextEntry::Conditional(router)), _) => {
                let target = router.resolve_next(state);
                tracing::debug!(from = %current_id, to = ?target, "conditional routing");
                target
            }
            (_, Next::Node(id)) => Some(id),
            (Some(NextEntry::Unconditional(id)), _) => Some(id.clone()),
            (None, _) => None,
        }
    }

    /// Runs the graph with the given state and returns the final state.
    ///
    /// A node error aborts the run and is returned unchanged. Reaching the step
    /// cap ends the run with the state as it is.
    pub async fn invoke(&self, state: S) -> Result<S, RunError> {
        let mut state = state;
        let mut current_id = self.first_node_id.clone();
        let mut steps = 0usize;
        log_graph_start(self.max_steps);

        loop {
            let Some(node) = self.nodes.get(&current_id).cloned() else {
                tracing::warn!(node_id = %current_id, "unknown node; ending run");
                break;
            };
            log_node_start(&current_id);
            let (new_state, next) = match node.run(state.clone()).await {
                Ok(out) => out,
                Err(e) => {
                    log_graph_error(&current_id, &e);
                    return Err(e);
                }
            };
            state = new_state;
            steps += 1;

            let next_id = self
                .resolve_next(&current_id, &state, next)
                .filter(|id| id != END);
            log_node_complete(&current_id, next_id.as_deref());
            match next_id {
                Some(id) if steps < self.max_steps => current_id = id,
                Some(id) => {
                    tracing::warn!(
                        steps,
                        next = %id,
                        "step limit reached; ending run with current state"
                    );
                    break;
                }
                None => break,
            }
        }

        log_graph_complete(steps);
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::graph::{Next, Node, StateGraph, END, START};

    struct AddNode {
        id: &'static str,
        delta: i32,
    }

    #[async_trait]
    impl Node<i32> for AddNode {
        fn id(&self) -> &str {
            self.id
        }
        async fn run(&self, state: i32) -> Result<(i32, Next), RunError> {
            Ok((state + self.delta, Next::Continue))
        }
    }

    struct FailNode;

    #[async_trait]
    impl Node<i32> for FailNode {
        fn id(&self) -> &str {
            "fail"
        }
        async fn run(&self, _state: i32) -> Result<(i32, Next), RunError> {
            Err(RunError::GraphUnavailable("down".into()))
        }
    }

    #[tokio::test]
    async fn invoke_follows_linear_edges() {
        let mut graph = StateGraph::<i32>::new();
        graph.add_node("a", Arc::new(AddNode { id: "a", delta: 1 }));
        graph.add_node("b", Arc::new(AddNode { id: "b", delta: 10 }));
        graph.add_edge(START, "a");
        graph.add_edge("a", "b");
        graph.add_edge("b", END);
        let compiled = graph.compile().unwrap();
        assert_eq!(compiled.entry(), "a");
        assert_eq!(compiled.invoke(0).await.unwrap(), 11);
    }

    /// **Scenario**: A conditional self-loop repeats the node until the router sends it to END.
    #[tokio::test]
    async fn invoke_conditional_loop_until_condition() {
        let mut graph = StateGraph::<i32>::new();
        graph.add_node("inc", Arc::new(AddNode { id: "inc", delta: 1 }));
        graph.add_edge(START, "inc");
        let path_map: HashMap<String, String> = [
            ("again".to_string(), "inc".to_string()),
            ("done".to_string(), END.to_string()),
        ]
        .into_iter()
        .collect();
        graph.add_conditional_edges(
            "inc",
            Arc::new(|s: &i32| if *s < 3 { "again".into() } else { "done".into() }),
            path_map,
        );
        let compiled = graph.compile().unwrap();
        assert_eq!(compiled.invoke(0).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn invoke_stops_at_step_limit() {
        let mut graph = StateGraph::<i32>::new();
        graph.add_node("inc", Arc::new(AddNode { id: "inc", delta: 1 }));
        graph.add_edge(START, "inc");
        graph.add_conditional_edges(
            "inc",
            Arc::new(|_: &i32| "again".into()),
            [
                ("again".to_string(), "inc".to_string()),
                ("never".to_string(), END.to_string()),
            ]
            .into_iter()
            .collect(),
        );
        let compiled = graph.with_max_steps(5).compile().unwrap();
        assert_eq!(compiled.invoke(0).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn invoke_returns_node_error() {
        let mut graph = StateGraph::<i32>::new();
        graph.add_node("fail", Arc::new(FailNode));
        graph.add_edge(START, "fail");
        graph.add_edge("fail", END);
        let compiled = graph.compile().unwrap();
        assert!(matches!(
            compiled.invoke(0).await,
            Err(RunError::GraphUnavailable(_))
        ));
    }
}
