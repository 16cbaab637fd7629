//! Run settings read from `config.toml`: `[tog]`, `[llm]` and `[embedding]`.
//!
//! Every field is optional; callers layer flags over these and these over
//! built-in defaults. Values are not validated here.

use serde::Deserialize;

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub tog: TogSettings,
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub embedding: EmbeddingSettings,
}

/// `[tog]`: search parameters and engine limits.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TogSettings {
    pub search_width: Option<usize>,
    pub search_depth: Option<usize>,
    pub num_retain_entity: Option<usize>,
    /// `llm`, `bm25` or `sentence_bert`.
    pub pruning_method: Option<String>,
    pub enable_sufficiency_check: Option<bool>,
    pub exploration_temperature: Option<f32>,
    pub reasoning_temperature: Option<f32>,
    /// Overall query deadline in seconds.
    pub timeout_secs: Option<u64>,
    /// Frontier entities expanded in parallel.
    pub max_concurrency: Option<usize>,
}

/// `[llm]`: chat model endpoint.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmSettings {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub temperature: Option<f32>,
}

/// `[embedding]`: embedding model used by `sentence_bert` pruning.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingSettings {
    pub model: Option<String>,
}
