//! State graph runtime: nodes + explicit and conditional edges, compile and invoke.
//!
//! The ToG controller is a `StateGraph<ToGState>`; each node is one transition
//! of the exploration state machine.

mod compile_error;
mod compiled;
mod conditional;
mod logging;
mod next;
mod node;
mod retry;
mod state_graph;

pub use compile_error::CompilationError;
pub use compiled::CompiledStateGraph;
pub use conditional::{ConditionalRouter, ConditionalRouterFn, NextEntry};
pub use logging::{
    log_graph_complete, log_graph_error, log_graph_start, log_node_complete, log_node_start,
};
pub use next::Next;
pub use node::Node;
pub use retry::RetryPolicy;
pub use state_graph::{StateGraph, END, START};
