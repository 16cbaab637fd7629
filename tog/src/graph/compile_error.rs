//! Graph compilation error.

use thiserror::Error;

/// Error when compiling a state graph.
///
/// Returned by `StateGraph::compile()`. Validation ensures every id in edges
/// (except START/END) exists, there is exactly one entry edge, END is reachable
/// by some edge, and no node has both a plain and a conditional outgoing edge.
#[derive(Debug, Error)]
pub enum CompilationError {
    /// A node id in an edge was not registered via `add_node` (and is not START/END).
    #[error("node not found: {0}")]
    NodeNotFound(String),

    /// No edge has from_id == START, or more than one such edge.
    #[error("graph must have exactly one edge from START")]
    MissingStart,

    /// No edge (plain or conditional) leads to END.
    #[error("graph must have at least one edge to END")]
    MissingEnd,

    /// A node has more than one plain outgoing edge.
    #[error("node has more than one outgoing edge: {0}")]
    DuplicateEdge(String),

    /// A node has both an outgoing edge and conditional edges; it must have exactly one.
    #[error("node has both edge and conditional edges: {0}")]
    NodeHasBothEdgeAndConditional(String),

    /// A value in a conditional path_map is not a valid node id or END.
    #[error("conditional path_map invalid target: {0}")]
    InvalidConditionalPathMap(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: Display of NodeNotFound contains "node not found" and the node id.
    #[test]
    fn compilation_error_display_node_not_found() {
        let s = CompilationError::NodeNotFound("explore".to_string()).to_string();
        assert!(s.contains("node not found"), "{}", s);
        assert!(s.contains("explore"), "{}", s);
    }

    #[test]
    fn compilation_error_display_mentions_start_and_end() {
        assert!(CompilationError::MissingStart
            .to_string()
            .contains("START"));
        assert!(CompilationError::MissingEnd.to_string().contains("END"));
    }
}
