//! Scripted LLM for tests and offline runs.
//!
//! Replies are scripted per [`ResponseSchema`]: either a queue of canned outputs
//! (the last one repeats once the queue drains) or a handler that sees the full
//! request. Unscripted schemas get a neutral default. Every request is recorded.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::llm::{CompletionRequest, LlmClient, LlmResponse, ModelError, ResponseSchema};

type Handler = Arc<dyn Fn(&CompletionRequest) -> Result<String, ModelError> + Send + Sync>;

enum Script {
    Queue(VecDeque<Result<String, ModelError>>),
    Handler(Handler),
}

/// Mock LLM: per-schema scripted replies plus a request log.
///
/// Defaults when a schema has no script: topic extraction and scoring reply
/// with malformed output (so callers take their fallback path), sufficiency
/// replies "incomplete", answers reply `"mock answer"` at confidence 0.5.
pub struct MockLlm {
    scripts: Mutex<HashMap<ResponseSchema, Script>>,
    requests: Mutex<Vec<CompletionRequest>>,
    latency: Option<Duration>,
}

impl Default for MockLlm {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLlm {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            latency: None,
        }
    }

    /// Queues one reply for `schema`.
    pub fn with_reply(self, schema: ResponseSchema, content: impl Into<String>) -> Self {
        self.push(schema, Ok(content.into()));
        self
    }

    /// Queues one failure for `schema`.
    pub fn with_error(self, schema: ResponseSchema, error: ModelError) -> Self {
        self.push(schema, Err(error));
        self
    }

    /// Replies to `schema` by calling `handler` with each request.
    pub fn with_handler<F>(self, schema: ResponseSchema, handler: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<String, ModelError> + Send + Sync + 'static,
    {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts.insert(schema, Script::Handler(Arc::new(handler)));
        }
        self
    }

    /// Sleeps this long before every reply.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn push(&self, schema: ResponseSchema, reply: Result<String, ModelError>) {
        if let Ok(mut scripts) = self.scripts.lock() {
            match scripts
                .entry(schema)
                .or_insert_with(|| Script::Queue(VecDeque::new()))
            {
                Script::Queue(q) => q.push_back(reply),
                slot @ Script::Handler(_) => *slot = Script::Queue(VecDeque::from([reply])),
            }
        }
    }

    /// All requests received so far, in call order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Number of requests received for `schema`.
    pub fn calls_for(&self, schema: ResponseSchema) -> usize {
        self.requests
            .lock()
            .map(|r| r.iter().filter(|req| req.schema == schema).count())
            .unwrap_or(0)
    }

    fn default_reply(schema: ResponseSchema) -> Result<String, ModelError> {
        match schema {
            ResponseSchema::TopicEntities
            | ResponseSchema::RelationScores
            | ResponseSchema::EntityScores => Err(ModelError::Malformed(format!(
                "no scripted reply for {}",
                schema.name()
            ))),
            ResponseSchema::Sufficiency => Ok(
                r#"{"status": "incomplete", "confidence": 0.0, "rationale": "mock"}"#.to_string(),
            ),
            ResponseSchema::Answer => {
                Ok(r#"{"answer": "mock answer", "confidence": 0.5}"#.to_string())
            }
        }
    }

    fn next_reply(&self, request: &CompletionRequest) -> Result<String, ModelError> {
        let mut scripts = self
            .scripts
            .lock()
            .map_err(|_| ModelError::Request("mock script lock poisoned".to_string()))?;
        let handler = match scripts.get_mut(&request.schema) {
            Some(Script::Handler(h)) => Arc::clone(h),
            Some(Script::Queue(q)) if q.len() > 1 => {
                return q
                    .pop_front()
                    .unwrap_or_else(|| Self::default_reply(request.schema))
            }
            Some(Script::Queue(q)) => {
                return q
                    .front()
                    .cloned()
                    .unwrap_or_else(|| Self::default_reply(request.schema))
            }
            None => return Self::default_reply(request.schema),
        };
        drop(scripts);
        handler(request)
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn complete(&self, request: &CompletionRequest) -> Result<LlmResponse, ModelError> {
        if let Ok(mut log) = self.requests.lock() {
            log.push(request.clone());
        }
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.next_reply(request).map(LlmResponse::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(schema: ResponseSchema) -> CompletionRequest {
        CompletionRequest::new(schema, "prompt", 0.0)
    }

    #[tokio::test]
    async fn queue_drains_then_repeats_last() {
        let llm = MockLlm::new()
            .with_reply(ResponseSchema::Answer, "first")
            .with_reply(ResponseSchema::Answer, "second");
        let r = &req(ResponseSchema::Answer);
        assert_eq!(llm.complete(r).await.unwrap().content, "first");
        assert_eq!(llm.complete(r).await.unwrap().content, "second");
        assert_eq!(llm.complete(r).await.unwrap().content, "second");
        assert_eq!(llm.calls_for(ResponseSchema::Answer), 3);
    }

    #[tokio::test]
    async fn unscripted_schemas_use_defaults() {
        let llm = MockLlm::new();
        assert!(matches!(
            llm.complete(&req(ResponseSchema::RelationScores)).await,
            Err(ModelError::Malformed(_))
        ));
        let answer = llm.complete(&req(ResponseSchema::Answer)).await.unwrap();
        assert!(answer.content.contains("mock answer"));
    }

    #[tokio::test]
    async fn handler_sees_request() {
        let llm = MockLlm::new().with_handler(ResponseSchema::EntityScores, |r| {
            Ok(format!("echo:{}", r.prompt))
        });
        let out = llm
            .complete(&req(ResponseSchema::EntityScores))
            .await
            .unwrap();
        assert_eq!(out.content, "echo:prompt");
        assert_eq!(llm.requests().len(), 1);
    }
}
