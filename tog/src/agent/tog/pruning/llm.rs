//! Model-guided scoring through structured output.
//!
//! Malformed replies get one retry with a stricter prompt, then uniform scores.
//! Transport failures (after the retry policy) are returned to the caller, which
//! degrades to BM25.

use std::sync::Arc;

use serde::Deserialize;

use crate::agent::tog::prompt::{
    entity_score_prompt, relation_score_prompt, with_strict_addon, ENTITY_SCORE_SYSTEM,
    RELATION_SCORE_SYSTEM,
};
use crate::agent::tog::state::CandidateEntity;
use crate::agent::tog::text::humanize_relation;
use crate::graph::RetryPolicy;
use crate::llm::{
    complete_with_retry, parse_structured, CompletionRequest, LlmClient, ModelError,
    ResponseSchema,
};

use super::uniform;

#[derive(Deserialize)]
struct RelationScoresReply {
    relations: Vec<RelationScoreItem>,
}

#[derive(Deserialize)]
struct RelationScoreItem {
    relation: String,
    score: f32,
    #[serde(default)]
    rationale: Option<String>,
}

#[derive(Deserialize)]
struct EntityScoresReply {
    entities: Vec<EntityScoreItem>,
}

#[derive(Deserialize)]
struct EntityScoreItem {
    index: usize,
    score: f32,
}

fn clamp_unit(x: f32) -> f32 {
    if x.is_finite() {
        x.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn same_relation(listed: &str, replied: &str) -> bool {
    let replied = replied.trim();
    listed.eq_ignore_ascii_case(replied) || humanize_relation(listed) == humanize_relation(replied)
}

/// Maps a relation reply onto `relations`; `None` when nothing in it matches.
fn relation_scores_from(reply: &RelationScoresReply, relations: &[String]) -> Option<Vec<f32>> {
    let mut matched = false;
    let scores = relations
        .iter()
        .map(|r| {
            reply
                .relations
                .iter()
                .find(|item| same_relation(r, &item.relation))
                .map(|item| {
                    matched = true;
                    if let Some(why) = &item.rationale {
                        tracing::trace!(relation = %r, score = item.score, rationale = %why, "relation scored");
                    }
                    clamp_unit(item.score)
                })
                .unwrap_or(0.0)
        })
        .collect();
    matched.then_some(scores)
}

fn entity_scores_from(reply: &EntityScoresReply, n: usize) -> Option<Vec<f32>> {
    let mut scores = vec![0.0; n];
    let mut matched = false;
    for item in &reply.entities {
        if let Some(slot) = scores.get_mut(item.index) {
            *slot = clamp_unit(item.score);
            matched = true;
        }
    }
    matched.then_some(scores)
}

/// LLM scorer.
#[derive(Clone)]
pub struct LlmPruner {
    llm: Arc<dyn LlmClient>,
    retry: RetryPolicy,
}

impl LlmPruner {
    pub fn new(llm: Arc<dyn LlmClient>, retry: RetryPolicy) -> Self {
        Self { llm, retry }
    }

    /// Sends `request`, then once more with the strict addon if the reply does not
    /// parse into something `extract` accepts. `Ok(None)` means both replies were
    /// unusable.
    async fn ask<R, T>(
        &self,
        request: CompletionRequest,
        extract: impl Fn(&R) -> Option<T>,
    ) -> Result<Option<T>, ModelError>
    where
        R: serde::de::DeserializeOwned,
    {
        let system = request.system.clone().unwrap_or_default();
        let strict = CompletionRequest {
            system: Some(with_strict_addon(&system)),
            ..request.clone()
        };
        for (attempt, req) in [request, strict].iter().enumerate() {
            let resp = complete_with_retry(self.llm.as_ref(), req, &self.retry).await;
            let resp = match resp {
                Ok(resp) => resp,
                Err(ModelError::Malformed(e)) => {
                    tracing::debug!(attempt, error = %e, "malformed scoring reply");
                    continue;
                }
                Err(e) => return Err(e),
            };
            match parse_structured::<R>(&resp.content) {
                Ok(reply) => match extract(&reply) {
                    Some(out) => return Ok(Some(out)),
                    None => tracing::debug!(attempt, "scoring reply matched no candidates"),
                },
                Err(e) => tracing::debug!(attempt, error = %e, "unparsable scoring reply"),
            }
        }
        Ok(None)
    }

    /// Raw per-relation scores in [0, 1]; uniform when the model never replied usably.
    pub async fn relation_scores(
        &self,
        entity_name: &str,
        relations: &[String],
        question: &str,
        top_k: usize,
        temperature: f32,
    ) -> Result<Vec<f32>, ModelError> {
        let request = CompletionRequest::new(
            ResponseSchema::RelationScores,
            relation_score_prompt(question, entity_name, relations, top_k),
            temperature,
        )
        .with_system(RELATION_SCORE_SYSTEM);
        let scores = self
            .ask(request, |reply: &RelationScoresReply| {
                relation_scores_from(reply, relations)
            })
            .await?;
        Ok(scores.unwrap_or_else(|| {
            tracing::warn!(entity = %entity_name, "relation scoring unparsable after retry; using input order");
            uniform(relations.len())
        }))
    }

    /// Relevance in [0, 1] per candidate; uniform when the model never replied usably.
    pub async fn entity_relevance(
        &self,
        candidates: &[CandidateEntity],
        question: &str,
        context: &str,
        temperature: f32,
    ) -> Result<Vec<f32>, ModelError> {
        let request = CompletionRequest::new(
            ResponseSchema::EntityScores,
            entity_score_prompt(question, context, candidates),
            temperature,
        )
        .with_system(ENTITY_SCORE_SYSTEM);
        let n = candidates.len();
        let scores = self
            .ask(request, |reply: &EntityScoresReply| entity_scores_from(reply, n))
            .await?;
        Ok(scores.unwrap_or_else(|| {
            tracing::warn!("entity scoring unparsable after retry; using input order");
            uniform(n)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlm;

    fn rels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn parses_scores_and_matches_humanized_names() {
        let llm = Arc::new(MockLlm::new().with_reply(
            ResponseSchema::RelationScores,
            r#"{"relations": [{"relation": "born in", "score": 0.9, "rationale": "place"}]}"#,
        ));
        let pruner = LlmPruner::new(llm, RetryPolicy::none());
        let scores = pruner
            .relation_scores("Ada", &rels(&["works_at", "BORN_IN"]), "where born?", 3, 0.0)
            .await
            .unwrap();
        assert_eq!(scores, vec![0.0, 0.9]);
    }

    /// **Scenario**: Malformed output → one stricter retry → uniform scores, no error.
    #[tokio::test]
    async fn malformed_twice_gives_uniform() {
        let llm = Arc::new(
            MockLlm::new().with_reply(ResponseSchema::RelationScores, "I think works_at is best"),
        );
        let pruner = LlmPruner::new(llm.clone(), RetryPolicy::none());
        let scores = pruner
            .relation_scores("Ada", &rels(&["a", "b", "c", "d"]), "q", 2, 0.0)
            .await
            .unwrap();
        assert_eq!(scores, vec![0.25; 4]);
        assert_eq!(llm.calls_for(ResponseSchema::RelationScores), 2);
        let second = &llm.requests()[1];
        assert!(second
            .system
            .as_deref()
            .unwrap_or("")
            .contains("could not be parsed"));
    }

    #[tokio::test]
    async fn retry_with_strict_prompt_can_recover() {
        let llm = Arc::new(
            MockLlm::new()
                .with_reply(ResponseSchema::EntityScores, "not json")
                .with_reply(
                    ResponseSchema::EntityScores,
                    r#"{"entities": [{"index": 1, "score": 0.8}, {"index": 7, "score": 1.0}]}"#,
                ),
        );
        let pruner = LlmPruner::new(llm, RetryPolicy::none());
        let candidates = vec![candidate("x"), candidate("y")];
        let rel = pruner
            .entity_relevance(&candidates, "q", "", 0.0)
            .await
            .unwrap();
        assert_eq!(rel, vec![0.0, 0.8]);
    }

    #[tokio::test]
    async fn transport_failure_is_returned() {
        let llm = Arc::new(MockLlm::new().with_error(
            ResponseSchema::RelationScores,
            ModelError::RateLimited("quota".into()),
        ));
        let pruner = LlmPruner::new(llm, RetryPolicy::none());
        let err = pruner
            .relation_scores("Ada", &rels(&["a"]), "q", 1, 0.0)
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::RateLimited(_)));
    }

    fn candidate(id: &str) -> CandidateEntity {
        CandidateEntity {
            id: id.into(),
            name: id.to_uppercase(),
            entity_type: "t".into(),
            source_id: "s".into(),
            source_name: "S".into(),
            relation: "r".into(),
            relation_score: 1.0,
            score: 0.0,
        }
    }
}
