//! Run configuration for a ToG query: [`ToGConfig`], validation and engine options.
//!
//! `ToGConfig` is immutable per query and validated before any traversal starts.
//! Invalid values are reported all at once in a [`ValidationReport`]; nothing is
//! clamped. [`EngineOptions`] carries runner-level settings that are not part of
//! the per-query contract (deadline, fan-out limit, retry policy, cache TTL).

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::graph::RetryPolicy;

/// Largest accepted `search_width`.
pub const MAX_SEARCH_WIDTH: usize = 20;
/// Largest accepted `search_depth`.
pub const MAX_SEARCH_DEPTH: usize = 10;
/// Largest accepted `num_retain_entity`.
pub const MAX_RETAIN_ENTITY: usize = 50;
/// Temperatures must lie in `[0, MAX_TEMPERATURE]`.
pub const MAX_TEMPERATURE: f32 = 2.0;

/// Scoring/pruning strategy used at every hop of one query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PruningMethod {
    /// Model-guided scoring via structured output.
    #[default]
    Llm,
    /// Lexical Okapi BM25; deterministic, no external calls.
    Bm25,
    /// Embedding cosine similarity.
    SentenceBert,
}

impl PruningMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PruningMethod::Llm => "llm",
            PruningMethod::Bm25 => "bm25",
            PruningMethod::SentenceBert => "sentence_bert",
        }
    }
}

impl fmt::Display for PruningMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PruningMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "llm" => Ok(Self::Llm),
            "bm25" => Ok(Self::Bm25),
            "sentence_bert" | "sentence-bert" | "sentencebert" | "sbert" => Ok(Self::SentenceBert),
            other => Err(format!(
                "unknown pruning method: {} (use llm, bm25, or sentence_bert)",
                other
            )),
        }
    }
}

/// Immutable run parameters for one query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToGConfig {
    /// Max relations retained per frontier entity in each hop.
    pub search_width: usize,
    /// Max number of hops.
    pub search_depth: usize,
    /// Max entities carried into the next frontier.
    pub num_retain_entity: usize,
    pub pruning_method: PruningMethod,
    /// When true, ask the sufficiency checker after every hop.
    pub enable_sufficiency_check: bool,
    /// Temperature for resolver and pruning calls.
    pub exploration_temperature: f32,
    /// Temperature for sufficiency and synthesis calls.
    pub reasoning_temperature: f32,
}

impl Default for ToGConfig {
    fn default() -> Self {
        Self {
            search_width: 3,
            search_depth: 3,
            num_retain_entity: 5,
            pruning_method: PruningMethod::default(),
            enable_sufficiency_check: true,
            exploration_temperature: 0.4,
            reasoning_temperature: 0.0,
        }
    }
}

impl ToGConfig {
    /// Validates every bound; see [`validate_config`].
    pub fn validate(&self) -> ValidationReport {
        validate_config(self)
    }

    /// Like [`validate`](Self::validate) but returns `Err(ConfigError)` when invalid.
    pub fn ensure_valid(&self) -> Result<(), ConfigError> {
        let report = self.validate();
        if report.is_valid {
            Ok(())
        } else {
            Err(ConfigError::Invalid(report.errors))
        }
    }

    /// Stable hex digest of all fields. Two configs with equal fields share a fingerprint.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.search_width.to_le_bytes());
        hasher.update(self.search_depth.to_le_bytes());
        hasher.update(self.num_retain_entity.to_le_bytes());
        hasher.update(self.pruning_method.as_str().as_bytes());
        hasher.update([self.enable_sufficiency_check as u8]);
        hasher.update(self.exploration_temperature.to_bits().to_le_bytes());
        hasher.update(self.reasoning_temperature.to_bits().to_le_bytes());
        hex::encode(hasher.finalize())
    }
}

/// One violated bound.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfigIssue {
    /// Field name as it appears in [`ToGConfig`].
    pub field: String,
    pub message: String,
}

impl ConfigIssue {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of [`validate_config`]: `is_valid` is true iff `errors` is empty.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<ConfigIssue>,
}

/// Invalid configuration; fatal before any work starts.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("{}", join_issues(.0))]
    Invalid(Vec<ConfigIssue>),
}

fn join_issues(issues: &[ConfigIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn check_count(field: &str, value: usize, max: usize, errors: &mut Vec<ConfigIssue>) {
    if value < 1 {
        errors.push(ConfigIssue::new(field, "must be at least 1"));
    } else if value > max {
        errors.push(ConfigIssue::new(
            field,
            format!("must be at most {} (got {})", max, value),
        ));
    }
}

fn check_temperature(field: &str, value: f32, errors: &mut Vec<ConfigIssue>) {
    if !value.is_finite() || !(0.0..=MAX_TEMPERATURE).contains(&value) {
        errors.push(ConfigIssue::new(
            field,
            format!("must be within [0, {}] (got {})", MAX_TEMPERATURE, value),
        ));
    }
}

/// Checks width/depth/retain counts and both temperatures; collects every violation.
///
/// Callable independently of a run. The runner calls it first and refuses to
/// start when the report is invalid.
pub fn validate_config(config: &ToGConfig) -> ValidationReport {
    let mut errors = Vec::new();
    check_count("search_width", config.search_width, MAX_SEARCH_WIDTH, &mut errors);
    check_count("search_depth", config.search_depth, MAX_SEARCH_DEPTH, &mut errors);
    check_count(
        "num_retain_entity",
        config.num_retain_entity,
        MAX_RETAIN_ENTITY,
        &mut errors,
    );
    check_temperature(
        "exploration_temperature",
        config.exploration_temperature,
        &mut errors,
    );
    check_temperature(
        "reasoning_temperature",
        config.reasoning_temperature,
        &mut errors,
    );
    ValidationReport {
        is_valid: errors.is_empty(),
        errors,
    }
}

/// Runner-level settings shared by every query a [`ToGRunner`](crate::ToGRunner) executes.
#[derive(Clone, Debug)]
pub struct EngineOptions {
    /// Max frontier entities expanded concurrently within one hop.
    pub max_concurrency: usize,
    /// Overall deadline for exploration, measured from the start of `run`.
    pub deadline: Duration,
    /// Extra time granted to synthesis, even when exploration used the full deadline.
    pub synthesis_timeout: Duration,
    /// Retry/backoff applied to every model call.
    pub retry_policy: RetryPolicy,
    /// TTL for hop cache entries; `None` means entries never expire.
    pub cache_ttl: Option<Duration>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            deadline: Duration::from_secs(60),
            synthesis_timeout: Duration::from_secs(30),
            retry_policy: RetryPolicy::exponential(
                2,
                Duration::from_millis(200),
                Duration::from_secs(2),
                2.0,
            ),
            cache_ttl: Some(Duration::from_secs(600)),
        }
    }
}

impl EngineOptions {
    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n.max(1);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_synthesis_timeout(mut self, timeout: Duration) -> Self {
        self.synthesis_timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.cache_ttl = ttl;
        self
    }
}
