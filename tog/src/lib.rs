//! # ToG
//!
//! Tree-of-Graphs question answering over a knowledge graph. A query is seeded
//! with topic entities pulled from the question, then explored hop by hop as a
//! beam search: relations and neighbors are scored, the best few are kept, and
//! the surviving entities become the next frontier. Optionally the model is asked
//! after every hop whether the evidence already answers the question. Finally an
//! answer is synthesized from the collected triplets.
//!
//! ## Design principles
//!
//! - **Single state type**: the controller is a [`StateGraph`] over [`ToGState`];
//!   each node (resolve, explore, check_sufficiency, synthesize) is one transition.
//! - **Degrade, don't fail**: model, embedding, cache and timeout failures fall back
//!   to cheaper paths and are recorded on the [`QueryResult`]. Only an invalid
//!   [`ToGConfig`] or an unreachable graph store return [`RunError`].
//! - **Pluggable collaborators**: [`LlmClient`], [`KnowledgeGraph`], [`Embedder`]
//!   and [`Cache`] are traits; in-memory and mock implementations ship for tests.
//!
//! ## Main modules
//!
//! - [`agent::tog`]: nodes, pruning strategies, [`ToGRunner`].
//! - [`graph`]: [`StateGraph`], [`CompiledStateGraph`], [`Node`], [`Next`], [`RetryPolicy`].
//! - [`config`]: [`ToGConfig`], [`validate_config`], [`EngineOptions`].
//! - [`kg`]: [`KnowledgeGraph`], [`ScopeFilter`], [`InMemoryGraph`].
//! - [`llm`]: [`LlmClient`], [`MockLlm`], [`ChatOpenAI`], [`RateLimitedLlm`].
//! - [`embedding`]: [`Embedder`], [`MockEmbedder`], [`OpenAIEmbedder`].
//! - [`cache`]: [`Cache`], [`InMemoryCache`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tog::{Collaborators, EngineOptions, InMemoryGraph, MockLlm, ToGConfig, ToGRunner};
//!
//! let graph = InMemoryGraph::load("graph.json")?;
//! let collaborators = Collaborators::new(Arc::new(MockLlm::new()), Arc::new(graph));
//! let runner = ToGRunner::new(collaborators, EngineOptions::default())?;
//! let result = runner.run("Who founded Acme?", &ToGConfig::default(), None).await?;
//! println!("{}", result.answer);
//! ```

pub mod agent;
pub mod cache;
pub mod config;
pub mod embedding;
pub mod error;
pub mod graph;
pub mod kg;
pub mod llm;

pub use agent::tog::{
    format_triplets, CandidateEntity, CandidateRelation, Collaborators, FrontierEntity, Phase,
    PruningStrategy, QueryResult, QueryStatus, ReasoningPath, ReasoningStep,
    SufficiencyAssessment, SufficiencyStatus, Termination, ToGRunner, ToGState, TopicEntity,
    Triplet,
};
pub use cache::{cache_key, Cache, CacheError, InMemoryCache};
pub use config::{
    validate_config, ConfigError, ConfigIssue, EngineOptions, PruningMethod, ToGConfig,
    ValidationReport,
};
pub use embedding::{EmbedError, Embedder, MockEmbedder, OpenAIEmbedder};
pub use error::RunError;
pub use graph::{CompilationError, CompiledStateGraph, Next, Node, RetryPolicy, StateGraph, END, START};
pub use kg::{EntityMatch, GraphEdge, GraphError, InMemoryGraph, KnowledgeGraph, ScopeFilter};
pub use llm::{
    ChatOpenAI, CompletionRequest, LlmClient, LlmResponse, LlmUsage, MockLlm, ModelError,
    RateLimitedLlm, ResponseSchema,
};

/// When running `cargo test -p tog`, initializes tracing from `RUST_LOG` so unit
/// tests can print logs with `--nocapture`.
#[cfg(test)]
mod test_logging {
    use ctor::ctor;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::Layer;

    #[ctor]
    fn init() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_filter(filter),
            )
            .try_init();
    }
}
