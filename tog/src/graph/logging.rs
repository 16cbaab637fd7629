//! Structured logging for graph execution.

/// Log node execution start.
pub fn log_node_start(node_id: &str) {
    tracing::debug!(node_id = node_id, "Starting node execution");
}

/// Log node execution completion with the routing decision.
pub fn log_node_complete(node_id: &str, next_id: Option<&str>) {
    tracing::debug!(node_id = node_id, next = ?next_id, "Node execution complete");
}

pub fn log_graph_start(steps_limit: usize) {
    tracing::debug!(steps_limit, "Starting graph execution");
}

pub fn log_graph_complete(steps: usize) {
    tracing::debug!(steps, "Graph execution complete");
}

pub fn log_graph_error(node_id: &str, error: &crate::error::RunError) {
    tracing::error!(node_id = node_id, %error, "Graph execution error");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logging_functions_do_not_panic() {
        log_node_start("explore");
        log_node_complete("explore", Some("check_sufficiency"));
        log_node_complete("synthesize", None);
        log_graph_start(16);
        log_graph_complete(3);
        log_graph_error(
            "resolve",
            &crate::error::RunError::GraphUnavailable("down".to_string()),
        );
    }
}
