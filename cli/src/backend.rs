//! Wires the collaborators for one CLI invocation: snapshot graph, OpenAI chat
//! model behind an in-flight limit, optional embedder, in-memory hop cache.

use std::path::Path;
use std::sync::Arc;

use async_openai::config::OpenAIConfig;
use tog::{
    ChatOpenAI, Collaborators, InMemoryCache, InMemoryGraph, LlmClient, OpenAIEmbedder,
    PruningMethod, RateLimitedLlm,
};
use tog_config::Settings;

use crate::CliError;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// First non-empty of: environment variable `key`, settings value, default.
fn pick(key: &str, from_file: Option<&str>, default: Option<&str>) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| from_file.map(str::to_string))
        .or_else(|| default.map(str::to_string))
}

fn openai_config(settings: &Settings) -> OpenAIConfig {
    let mut config = OpenAIConfig::new();
    if let Some(base) = pick("OPENAI_BASE_URL", settings.llm.base_url.as_deref(), None) {
        config = config.with_api_base(base);
    }
    config
}

/// Loads the graph snapshot and builds the model clients.
///
/// An embedder is only created for `sentence_bert` pruning.
pub fn build_collaborators(
    graph_path: &Path,
    settings: &Settings,
    pruning: PruningMethod,
    max_in_flight: usize,
) -> Result<Collaborators, CliError> {
    let graph = InMemoryGraph::load(graph_path)?;
    tracing::info!(
        path = %graph_path.display(),
        entities = graph.entity_count(),
        edges = graph.edge_count(),
        "graph loaded"
    );

    let model = pick("OPENAI_MODEL", settings.llm.model.as_deref(), Some(DEFAULT_MODEL))
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());
    let chat: Arc<dyn LlmClient> = Arc::new(ChatOpenAI::with_config(openai_config(settings), model));
    let llm = Arc::new(RateLimitedLlm::new(chat, max_in_flight));

    let mut collaborators = Collaborators::new(llm, Arc::new(graph))
        .with_cache(Arc::new(InMemoryCache::new()));
    if pruning == PruningMethod::SentenceBert {
        let embedding_model = pick(
            "TOG_EMBEDDING_MODEL",
            settings.embedding.model.as_deref(),
            Some(DEFAULT_EMBEDDING_MODEL),
        )
        .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string());
        collaborators = collaborators.with_embedder(Arc::new(OpenAIEmbedder::with_config(
            openai_config(settings),
            embedding_model,
        )));
    }
    Ok(collaborators)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pick_prefers_env_then_file_then_default() {
        std::env::remove_var("TOG_CLI_TEST_PICK");
        assert_eq!(
            pick("TOG_CLI_TEST_PICK", Some("file"), Some("default")).as_deref(),
            Some("file")
        );
        assert_eq!(
            pick("TOG_CLI_TEST_PICK", None, Some("default")).as_deref(),
            Some("default")
        );
        std::env::set_var("TOG_CLI_TEST_PICK", "env");
        assert_eq!(
            pick("TOG_CLI_TEST_PICK", Some("file"), Some("default")).as_deref(),
            Some("env")
        );
        std::env::remove_var("TOG_CLI_TEST_PICK");
        assert_eq!(pick("TOG_CLI_TEST_PICK", None, None), None);
    }

    #[test]
    fn missing_snapshot_is_a_graph_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = build_collaborators(
            &dir.path().join("missing.json"),
            &Settings::default(),
            PruningMethod::Bm25,
            2,
        );
        assert!(matches!(result, Err(CliError::Graph(_))));
    }
}
