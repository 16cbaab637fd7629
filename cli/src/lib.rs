//! Library side of the `tog` binary: flag/settings layering, collaborator wiring
//! and result display. Kept out of `main.rs` so it can be unit tested.

mod backend;
mod display;
mod options;

pub use backend::{build_collaborators, DEFAULT_EMBEDDING_MODEL, DEFAULT_MODEL};
pub use display::{format_result, truncate_display};
pub use options::{engine_options, resolve_config, ConfigArgs};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("config file: {0}")]
    Load(#[from] tog_config::LoadError),
    #[error("graph: {0}")]
    Graph(#[from] tog::GraphError),
    #[error("{0}")]
    Config(#[from] tog::ConfigError),
    #[error("graph compilation failed: {0}")]
    Compilation(#[from] tog::CompilationError),
    #[error("{0}")]
    Run(#[from] tog::RunError),
    #[error("{0}")]
    Usage(String),
}
