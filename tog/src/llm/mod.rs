//! Language-model collaborator: [`LlmClient`] trait, structured requests and retry.
//!
//! Every model interaction in the engine is one [`CompletionRequest`] naming the
//! [`ResponseSchema`] it expects back. Callers run requests through
//! [`complete_with_retry`] (transport failures, exponential backoff) and parse
//! the reply with [`parse_structured`]; what to do on malformed output is the
//! caller's decision.

mod mock;
mod openai;
mod rate_limit;

pub use mock::MockLlm;
pub use openai::ChatOpenAI;
pub use rate_limit::RateLimitedLlm;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::RetryPolicy;

/// Shape of the JSON object a request expects back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSchema {
    /// `{"entities": [{"name": str, "type": str?}]}`
    TopicEntities,
    /// `{"relations": [{"relation": str, "score": number, "rationale": str?}]}`
    RelationScores,
    /// `{"entities": [{"index": int, "score": number}]}`
    EntityScores,
    /// `{"status": "complete"|"incomplete", "confidence": number, "rationale": str}`
    Sufficiency,
    /// `{"answer": str, "confidence": number, "evidence": [int]?}`
    Answer,
}

impl ResponseSchema {
    pub fn name(&self) -> &'static str {
        match self {
            ResponseSchema::TopicEntities => "topic_entities",
            ResponseSchema::RelationScores => "relation_scores",
            ResponseSchema::EntityScores => "entity_scores",
            ResponseSchema::Sufficiency => "sufficiency",
            ResponseSchema::Answer => "answer",
        }
    }

    /// Compact description of the expected JSON, appended to system prompts.
    pub fn format_hint(&self) -> &'static str {
        match self {
            ResponseSchema::TopicEntities => {
                r#"{"entities": [{"name": "<entity as written>", "type": "<optional type>"}]}"#
            }
            ResponseSchema::RelationScores => {
                r#"{"relations": [{"relation": "<relation exactly as listed>", "score": <0..1>, "rationale": "<short>"}]}"#
            }
            ResponseSchema::EntityScores => {
                r#"{"entities": [{"index": <candidate index>, "score": <0..1>}]}"#
            }
            ResponseSchema::Sufficiency => {
                r#"{"status": "complete" | "incomplete", "confidence": <0..1>, "rationale": "<short>"}"#
            }
            ResponseSchema::Answer => {
                r#"{"answer": "<answer text>", "confidence": <0..1>, "evidence": [<triplet indices>]}"#
            }
        }
    }
}

/// One structured completion request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub temperature: f32,
    pub schema: ResponseSchema,
}

impl CompletionRequest {
    pub fn new(schema: ResponseSchema, prompt: impl Into<String>, temperature: f32) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            temperature,
            schema,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// Token usage for one call, when the provider reports it.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LlmUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Raw reply text; parse with [`parse_structured`].
#[derive(Clone, Debug)]
pub struct LlmResponse {
    pub content: String,
    pub usage: Option<LlmUsage>,
}

impl LlmResponse {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: None,
        }
    }
}

/// Model call failure.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelError {
    #[error("model rate limited or out of quota: {0}")]
    RateLimited(String),
    #[error("model call timed out: {0}")]
    Timeout(String),
    #[error("malformed model output: {0}")]
    Malformed(String),
    #[error("model request failed: {0}")]
    Request(String),
}

impl ModelError {
    /// Transport-level failures are retried with backoff; malformed output is not.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ModelError::Malformed(_))
    }
}

/// Language model: one structured completion per call.
///
/// Implementations: [`MockLlm`] (scripted, for tests), [`ChatOpenAI`] (real API),
/// [`RateLimitedLlm`] (wraps another client with an in-flight limit).
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<LlmResponse, ModelError>;
}

/// Calls `llm`, retrying retryable failures per `policy` with its backoff delays.
pub async fn complete_with_retry(
    llm: &dyn LlmClient,
    request: &CompletionRequest,
    policy: &RetryPolicy,
) -> Result<LlmResponse, ModelError> {
    let mut attempt = 0;
    loop {
        match llm.complete(request).await {
            Ok(resp) => return Ok(resp),
            Err(e) if e.is_retryable() && policy.should_retry(attempt) => {
                let delay = policy.delay(attempt);
                tracing::debug!(
                    schema = request.schema.name(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "retrying model call"
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Returns the JSON object embedded in model output: a ```json fenced block,
/// else the span from the first `{` to the last `}`.
pub fn extract_json_block(content: &str) -> Option<&str> {
    if let Some(start) = content.find("```") {
        let rest = &content[start + 3..];
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        if let Some(end) = rest.find("```") {
            let inner = rest[..end].trim();
            if inner.starts_with('{') {
                return Some(inner);
            }
        }
    }
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

/// Parses the JSON object in `content` into `T`; `ModelError::Malformed` otherwise.
pub fn parse_structured<T: DeserializeOwned>(content: &str) -> Result<T, ModelError> {
    let block = extract_json_block(content)
        .ok_or_else(|| ModelError::Malformed("no JSON object in output".to_string()))?;
    serde_json::from_str(block).map_err(|e| ModelError::Malformed(e.to_string()))
}

/// [`complete_with_retry`] followed by [`parse_structured`].
pub async fn complete_structured<T: DeserializeOwned>(
    llm: &dyn LlmClient,
    request: &CompletionRequest,
    policy: &RetryPolicy,
) -> Result<T, ModelError> {
    let resp = complete_with_retry(llm, request, policy).await?;
    parse_structured(&resp.content)
}
