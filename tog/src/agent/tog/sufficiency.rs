//! Sufficiency checker and its graph node.
//!
//! Asks the model whether the triplets gathered so far answer the question.
//! Any failure reads as `incomplete`. Each depth is assessed at most once.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::RunError;
use crate::graph::{Next, Node, RetryPolicy};
use crate::llm::{complete_structured, CompletionRequest, LlmClient, ResponseSchema};

use super::prompt::{sufficiency_prompt, SUFFICIENCY_SYSTEM};
use super::state::{
    Phase, ReasoningPath, SufficiencyAssessment, SufficiencyStatus, Termination, ToGState,
};

#[derive(Deserialize)]
struct SufficiencyReply {
    status: String,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    rationale: String,
}

pub struct SufficiencyChecker {
    llm: Arc<dyn LlmClient>,
    retry: RetryPolicy,
}

impl SufficiencyChecker {
    pub fn new(llm: Arc<dyn LlmClient>, retry: RetryPolicy) -> Self {
        Self { llm, retry }
    }

    /// Verdict on the evidence in `path` after `depth` hops.
    pub async fn assess(
        &self,
        question: &str,
        path: &ReasoningPath,
        depth: usize,
        temperature: f32,
    ) -> SufficiencyAssessment {
        let request = CompletionRequest::new(
            ResponseSchema::Sufficiency,
            sufficiency_prompt(question, &path.triplets(), depth),
            temperature,
        )
        .with_system(SUFFICIENCY_SYSTEM);
        let reply =
            match complete_structured::<SufficiencyReply>(self.llm.as_ref(), &request, &self.retry)
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(depth, error = %e, "sufficiency check failed; treating as incomplete");
                    return SufficiencyAssessment::incomplete(format!("check failed: {}", e));
                }
            };
        let status = match reply.status.trim().to_lowercase().as_str() {
            "complete" | "sufficient" | "yes" => SufficiencyStatus::Complete,
            "incomplete" | "insufficient" | "no" => SufficiencyStatus::Incomplete,
            other => {
                tracing::warn!(depth, status = %other, "unknown sufficiency status; treating as incomplete");
                return SufficiencyAssessment::incomplete(format!("unknown status: {}", other));
            }
        };
        let confidence = reply
            .confidence
            .filter(|c| c.is_finite())
            .map(|c| c.clamp(0.0, 1.0))
            .unwrap_or(0.5);
        SufficiencyAssessment {
            status,
            confidence,
            rationale: reply.rationale,
        }
    }
}

/// Graph node: assess the current depth once, then mark SUFFICIENT or EXHAUSTED
/// or leave the state exploring.
pub struct CheckSufficiencyNode {
    checker: SufficiencyChecker,
}

impl CheckSufficiencyNode {
    pub fn new(checker: SufficiencyChecker) -> Self {
        Self { checker }
    }
}

#[async_trait]
impl Node<ToGState> for CheckSufficiencyNode {
    fn id(&self) -> &str {
        super::CHECK_SUFFICIENCY
    }

    async fn run(&self, state: ToGState) -> Result<(ToGState, Next), RunError> {
        let mut state = state;
        let depth = state.depth;
        if !state.assessed_depths.insert(depth) {
            tracing::debug!(depth, "depth already assessed");
            return Ok((state, Next::Continue));
        }

        let assessment = tokio::time::timeout_at(
            state.deadline,
            self.checker.assess(
                &state.question,
                &state.path,
                depth,
                state.config.reasoning_temperature,
            ),
        )
        .await
        .unwrap_or_else(|_| SufficiencyAssessment::incomplete("deadline reached"));
        tracing::debug!(depth, status = ?assessment.status, confidence = assessment.confidence, "sufficiency");

        let complete = assessment.is_complete();
        state.path.record_sufficiency(depth, assessment);
        if complete {
            state.phase = Phase::Sufficient;
            state.termination = Some(Termination::Sufficient);
        } else if depth >= state.config.search_depth {
            state.phase = Phase::Exhausted;
            state.termination = Some(Termination::Exhausted);
        }
        Ok((state, Next::Continue))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockLlm, ModelError};

    async fn assess_with(llm: MockLlm) -> SufficiencyAssessment {
        SufficiencyChecker::new(Arc::new(llm), RetryPolicy::none())
            .assess("q", &ReasoningPath::new(), 1, 0.0)
            .await
    }

    #[tokio::test]
    async fn complete_reply_is_complete() {
        let a = assess_with(MockLlm::new().with_reply(
            ResponseSchema::Sufficiency,
            r#"{"status": "Complete", "confidence": 1.4, "rationale": "direct"}"#,
        ))
        .await;
        assert!(a.is_complete());
        assert_eq!(a.confidence, 1.0);
        assert_eq!(a.rationale, "direct");
    }

    #[tokio::test]
    async fn failures_read_as_incomplete() {
        let a = assess_with(MockLlm::new().with_reply(ResponseSchema::Sufficiency, "yes!")).await;
        assert!(!a.is_complete());
        let a = assess_with(
            MockLlm::new().with_error(ResponseSchema::Sufficiency, ModelError::Timeout("t".into())),
        )
        .await;
        assert!(!a.is_complete());
        let a = assess_with(
            MockLlm::new().with_reply(ResponseSchema::Sufficiency, r#"{"status": "maybe"}"#),
        )
        .await;
        assert!(!a.is_complete());
    }
}
