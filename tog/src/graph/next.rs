//! Next-step result from a graph node.

/// Next step after running a node.
///
/// - **Continue**: follow the node's outgoing edge (or its conditional router).
/// - **Node(id)**: jump to the given node, ignoring a plain outgoing edge.
/// - **End**: stop; the current state is the final result.
///
/// When the node has conditional edges, the router decides and `Next` is ignored
/// unless it is `End`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Next {
    Continue,
    Node(String),
    End,
}
