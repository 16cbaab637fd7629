//! OpenAI Chat Completions client implementing [`LlmClient`].
//!
//! Requires `OPENAI_API_KEY` (or explicit config). Each request is sent as a
//! system + user message pair in JSON-object response mode; the system message
//! ends with the JSON shape the request's
//! [`ResponseSchema`](crate::llm::ResponseSchema) expects.

use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestUserMessage, CreateChatCompletionRequestArgs, ResponseFormat,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, trace};

use crate::llm::{CompletionRequest, LlmClient, LlmResponse, LlmUsage, ModelError};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// OpenAI chat client.
///
/// Uses `OPENAI_API_KEY` from the environment by default; or provide config via
/// [`ChatOpenAI::with_config`] (custom key or base URL for compatible servers).
pub struct ChatOpenAI {
    client: Client<OpenAIConfig>,
    model: String,
    request_timeout: Duration,
}

impl ChatOpenAI {
    /// Build client with default config (API key from `OPENAI_API_KEY` env).
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            model: model.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Build client with custom config (e.g. custom API key or base URL).
    pub fn with_config(config: OpenAIConfig, model: impl Into<String>) -> Self {
        Self {
            client: Client::with_config(config),
            model: model.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Per-call timeout; an elapsed call fails with `ModelError::Timeout`.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn to_messages(request: &CompletionRequest) -> Vec<ChatCompletionRequestMessage> {
        let system = match &request.system {
            Some(s) => format!(
                "{}\n\nRespond with a single JSON object of this shape and nothing else:\n{}",
                s,
                request.schema.format_hint()
            ),
            None => format!(
                "Respond with a single JSON object of this shape and nothing else:\n{}",
                request.schema.format_hint()
            ),
        };
        vec![
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage::from(
                system.as_str(),
            )),
            ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage::from(
                request.prompt.as_str(),
            )),
        ]
    }
}

fn classify(err: OpenAIError) -> ModelError {
    let msg = err.to_string();
    let lower = msg.to_lowercase();
    if lower.contains("rate limit") || lower.contains("429") || lower.contains("quota") {
        ModelError::RateLimited(msg)
    } else if matches!(err, OpenAIError::JSONDeserialize(..)) {
        ModelError::Malformed(msg)
    } else {
        ModelError::Request(msg)
    }
}

#[async_trait]
impl LlmClient for ChatOpenAI {
    async fn complete(&self, request: &CompletionRequest) -> Result<LlmResponse, ModelError> {
        let trace_id = uuid::Uuid::new_v4().to_string();
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(self.model.clone());
        args.messages(Self::to_messages(request));
        args.temperature(request.temperature);
        args.response_format(ResponseFormat::JsonObject);
        let body = args
            .build()
            .map_err(|e| ModelError::Request(format!("OpenAI request build failed: {}", e)))?;

        debug!(
            trace_id = %trace_id,
            model = %self.model,
            schema = request.schema.name(),
            temperature = request.temperature,
            "OpenAI chat create"
        );
        if let Ok(js) = serde_json::to_string_pretty(&body) {
            trace!(trace_id = %trace_id, request = %js, "OpenAI request body");
        }

        let response = tokio::time::timeout(self.request_timeout, self.client.chat().create(body))
            .await
            .map_err(|_| {
                ModelError::Timeout(format!(
                    "no response within {}s",
                    self.request_timeout.as_secs()
                ))
            })?
            .map_err(classify)?;

        if let Ok(js) = serde_json::to_string_pretty(&response) {
            trace!(trace_id = %trace_id, response = %js, "OpenAI response body");
        }

        let usage = response.usage.as_ref().map(|u| LlmUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ModelError::Malformed("OpenAI returned no content".to_string()))?;

        Ok(LlmResponse { content, usage })
    }
}
