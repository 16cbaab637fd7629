//! Answer synthesizer and its graph node.
//!
//! With evidence: answer from the numbered triplets, status `completed`.
//! Without evidence, or when that call fails: answer from the question alone,
//! status `fallback`, confidence capped. When even that fails the result is
//! `failed` with an explanatory answer; synthesis never errors.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::Instant;

use crate::error::RunError;
use crate::graph::{Next, Node, RetryPolicy};
use crate::llm::{
    complete_with_retry, parse_structured, CompletionRequest, LlmClient, ModelError,
    ResponseSchema,
};

use super::prompt::{
    answer_prompt, fallback_answer_prompt, with_strict_addon, ANSWER_SYSTEM,
    FALLBACK_ANSWER_SYSTEM,
};
use super::state::{Phase, QueryResult, QueryStatus, Termination, ToGState, Triplet};

/// Highest confidence a fallback answer may carry.
pub const FALLBACK_CONFIDENCE_CAP: f32 = 0.3;

const DEFAULT_CONFIDENCE: f32 = 0.5;

#[derive(Deserialize)]
struct AnswerReply {
    answer: String,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    evidence: Vec<usize>,
}

/// Synthesized answer before it is wrapped into a [`QueryResult`].
#[derive(Clone, Debug, PartialEq)]
pub struct Synthesis {
    pub answer: String,
    pub confidence: f32,
    pub evidence: Vec<usize>,
    pub status: QueryStatus,
}

pub struct AnswerSynthesizer {
    llm: Arc<dyn LlmClient>,
    retry: RetryPolicy,
    timeout: Duration,
}

impl AnswerSynthesizer {
    pub fn new(llm: Arc<dyn LlmClient>, retry: RetryPolicy, timeout: Duration) -> Self {
        Self {
            llm,
            retry,
            timeout,
        }
    }

    /// One structured answer call, retried once with the strict addon when the
    /// reply does not parse. Bounded by `deadline`.
    async fn ask(&self, request: CompletionRequest, deadline: Instant) -> Result<AnswerReply, ModelError> {
        let strict = CompletionRequest {
            system: Some(with_strict_addon(request.system.as_deref().unwrap_or_default())),
            ..request.clone()
        };
        let mut last = ModelError::Malformed("no reply".to_string());
        for req in [request, strict] {
            let resp = tokio::time::timeout_at(deadline, complete_with_retry(self.llm.as_ref(), &req, &self.retry))
                .await
                .map_err(|_| ModelError::Timeout("synthesis timeout reached".to_string()))??;
            match parse_structured::<AnswerReply>(&resp.content) {
                Ok(reply) if !reply.answer.trim().is_empty() => return Ok(reply),
                Ok(_) => last = ModelError::Malformed("empty answer".to_string()),
                Err(e) => last = e,
            }
        }
        Err(last)
    }

    /// Answer for `question` from `triplets` (may be empty), within the synthesis timeout.
    pub async fn synthesize(
        &self,
        question: &str,
        triplets: &[Triplet],
        notes: &[String],
        temperature: f32,
    ) -> Synthesis {
        let deadline = Instant::now() + self.timeout;

        if !triplets.is_empty() {
            let request = CompletionRequest::new(
                ResponseSchema::Answer,
                answer_prompt(question, triplets, notes),
                temperature,
            )
            .with_system(ANSWER_SYSTEM);
            match self.ask(request, deadline).await {
                Ok(reply) => {
                    let evidence = reply
                        .evidence
                        .into_iter()
                        .filter(|i| *i < triplets.len())
                        .collect();
                    return Synthesis {
                        answer: reply.answer,
                        confidence: clamp_confidence(reply.confidence),
                        evidence,
                        status: QueryStatus::Completed,
                    };
                }
                Err(e) => {
                    tracing::warn!(error = %e, "grounded synthesis failed; answering from question alone");
                }
            }
        }

        let request = CompletionRequest::new(
            ResponseSchema::Answer,
            fallback_answer_prompt(question),
            temperature,
        )
        .with_system(FALLBACK_ANSWER_SYSTEM);
        match self.ask(request, deadline).await {
            Ok(reply) => Synthesis {
                answer: reply.answer,
                confidence: clamp_confidence(reply.confidence).min(FALLBACK_CONFIDENCE_CAP),
                evidence: Vec::new(),
                status: QueryStatus::Fallback,
            },
            Err(e) => {
                tracing::warn!(error = %e, "fallback synthesis failed");
                Synthesis {
                    answer: format!(
                        "Unable to produce an answer: the language model did not respond usably ({}).",
                        e
                    ),
                    confidence: 0.0,
                    evidence: Vec::new(),
                    status: QueryStatus::Failed,
                }
            }
        }
    }
}

fn clamp_confidence(c: Option<f32>) -> f32 {
    c.filter(|c| c.is_finite())
        .map(|c| c.clamp(0.0, 1.0))
        .unwrap_or(DEFAULT_CONFIDENCE)
}

/// Graph node: synthesize and write `state.result`.
pub struct SynthesizeNode {
    synthesizer: AnswerSynthesizer,
}

impl SynthesizeNode {
    pub fn new(synthesizer: AnswerSynthesizer) -> Self {
        Self { synthesizer }
    }
}

fn termination_for(state: &ToGState) -> Termination {
    state.termination.unwrap_or(match state.phase {
        Phase::Sufficient => Termination::Sufficient,
        Phase::Stalled => Termination::Stalled,
        _ => Termination::Exhausted,
    })
}

#[async_trait]
impl Node<ToGState> for SynthesizeNode {
    fn id(&self) -> &str {
        super::SYNTHESIZE
    }

    async fn run(&self, state: ToGState) -> Result<(ToGState, Next), RunError> {
        let mut state = state;
        let termination = termination_for(&state);
        state.phase = Phase::Synthesizing;

        let triplets = state.path.triplets();
        let mut notes: Vec<String> = state
            .path
            .steps()
            .iter()
            .flat_map(|s| s.notes.iter().cloned())
            .collect();
        for d in &state.degradations {
            if !notes.contains(d) {
                notes.push(d.clone());
            }
        }
        let synthesis = self
            .synthesizer
            .synthesize(
                &state.question,
                &triplets,
                &notes,
                state.config.reasoning_temperature,
            )
            .await;

        let result = QueryResult {
            answer: synthesis.answer,
            confidence: synthesis.confidence,
            path: state.path.clone(),
            triplets,
            evidence: synthesis.evidence,
            processing_time_ms: state.started.elapsed().as_millis() as u64,
            status: synthesis.status,
            topic_entities: state.topic_entities.clone(),
            termination,
            degradations: state.degradations.clone(),
        };
        tracing::info!(
            status = ?result.status,
            termination = ?result.termination,
            steps = result.path.len(),
            confidence = result.confidence,
            elapsed_ms = result.processing_time_ms,
            "query finished"
        );
        state.termination = Some(termination);
        state.result = Some(result);
        state.phase = Phase::Done;
        Ok((state, Next::Continue))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlm;

    fn triplet() -> Triplet {
        Triplet {
            subject: "A".into(),
            relation: "WORKS_WITH".into(),
            object: "C".into(),
            confidence: Some(0.7),
            step_depth: 1,
            step_index: 0,
        }
    }

    fn synthesizer(llm: Arc<MockLlm>) -> AnswerSynthesizer {
        AnswerSynthesizer::new(llm, RetryPolicy::none(), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn grounded_answer_keeps_valid_evidence() {
        let llm = Arc::new(MockLlm::new().with_reply(
            ResponseSchema::Answer,
            r#"{"answer": "A works with C", "confidence": 0.9, "evidence": [0, 5]}"#,
        ));
        let s = synthesizer(llm).synthesize("q", &[triplet()], &[], 0.0).await;
        assert_eq!(s.status, QueryStatus::Completed);
        assert_eq!(s.evidence, vec![0]);
        assert!((s.confidence - 0.9).abs() < 1e-6);
    }

    #[tokio::test]
    async fn empty_evidence_falls_back_with_capped_confidence() {
        let llm = Arc::new(MockLlm::new().with_reply(
            ResponseSchema::Answer,
            r#"{"answer": "probably X", "confidence": 0.95}"#,
        ));
        let s = synthesizer(llm.clone()).synthesize("q", &[], &[], 0.0).await;
        assert_eq!(s.status, QueryStatus::Fallback);
        assert!(s.confidence <= FALLBACK_CONFIDENCE_CAP);
        assert_eq!(llm.calls_for(ResponseSchema::Answer), 1);
    }

    #[tokio::test]
    async fn model_down_yields_failed_result() {
        let llm = Arc::new(
            MockLlm::new().with_error(ResponseSchema::Answer, ModelError::Request("down".into())),
        );
        let s = synthesizer(llm).synthesize("q", &[triplet()], &[], 0.0).await;
        assert_eq!(s.status, QueryStatus::Failed);
        assert_eq!(s.confidence, 0.0);
        assert!(s.answer.contains("Unable to produce an answer"));
    }

    #[tokio::test]
    async fn grounded_failure_tries_fallback() {
        let llm = Arc::new(
            MockLlm::new()
                .with_error(ResponseSchema::Answer, ModelError::Request("flaky".into()))
                .with_reply(ResponseSchema::Answer, r#"{"answer": "guess", "confidence": 0.6}"#),
        );
        let s = synthesizer(llm).synthesize("q", &[triplet()], &[], 0.0).await;
        assert_eq!(s.status, QueryStatus::Fallback);
        assert!((s.confidence - 0.3).abs() < 1e-6);
    }
}
