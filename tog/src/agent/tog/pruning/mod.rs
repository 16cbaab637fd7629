//! Pruning strategies: score candidate relations and entities, keep the best.
//!
//! One interface, three variants, dispatched explicitly on [`PruningStrategy`].
//! The variant is chosen once per query from
//! [`ToGConfig::pruning_method`](crate::config::ToGConfig::pruning_method). No
//! scoring call ever fails: model and embedding failures degrade to BM25 and
//! carry a note for the result.

mod bm25;
mod llm;
mod sentence_bert;

pub use bm25::{bm25_scores, Bm25Pruner};
pub use llm::LlmPruner;
pub use sentence_bert::EmbeddingPruner;

use std::fmt;
use std::sync::Arc;

use crate::config::PruningMethod;
use crate::embedding::Embedder;
use crate::graph::RetryPolicy;
use crate::llm::LlmClient;

use super::state::CandidateEntity;

/// Scores for one call, plus a degradation note when a fallback scorer was used.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoreOutcome {
    pub scores: Vec<f32>,
    pub note: Option<String>,
}

impl ScoreOutcome {
    fn plain(scores: Vec<f32>) -> Self {
        Self { scores, note: None }
    }

    fn degraded(scores: Vec<f32>, note: &str) -> Self {
        Self {
            scores,
            note: Some(note.to_string()),
        }
    }
}

pub const LLM_DEGRADED: &str = "llm pruning degraded to bm25";
pub const EMBEDDING_DEGRADED: &str = "sentence_bert pruning degraded to bm25";

/// Equal scores summing to 1.
pub fn uniform(n: usize) -> Vec<f32> {
    if n == 0 {
        return Vec::new();
    }
    vec![1.0 / n as f32; n]
}

/// Rescales non-negative raw scores to sum to 1. Negative or non-finite values
/// count as zero; an all-zero input becomes uniform.
pub fn normalize_scores(raw: &[f32]) -> Vec<f32> {
    let clean: Vec<f32> = raw
        .iter()
        .map(|x| if x.is_finite() && *x > 0.0 { *x } else { 0.0 })
        .collect();
    let total: f32 = clean.iter().sum();
    if total <= 0.0 {
        return uniform(raw.len());
    }
    clean.iter().map(|x| x / total).collect()
}

/// `0.5 * relation_score + 0.5 * relevance`, in [0, 1].
pub fn aggregate_score(relation_score: f32, relevance: f32) -> f32 {
    (0.5 * relation_score + 0.5 * relevance).clamp(0.0, 1.0)
}

/// Keeps the `width` highest-scoring items, highest first. Equal scores keep
/// their input order.
pub fn prune<T>(items: Vec<T>, width: usize, score: impl Fn(&T) -> f32) -> Vec<T> {
    let mut items = items;
    items.sort_by(|a, b| score(b).total_cmp(&score(a)));
    items.truncate(width);
    items
}

/// Scoring strategy selected for one query.
#[derive(Clone)]
pub enum PruningStrategy {
    Llm(LlmPruner),
    Bm25(Bm25Pruner),
    SentenceBert(EmbeddingPruner),
}

impl fmt::Debug for PruningStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PruningStrategy({})", self.method())
    }
}

impl PruningStrategy {
    /// Builds the variant for `method`. The embedding variant starts with an
    /// empty per-query vector cache.
    pub fn select(
        method: PruningMethod,
        llm: Arc<dyn LlmClient>,
        embedder: Option<Arc<dyn Embedder>>,
        retry: RetryPolicy,
    ) -> Self {
        match method {
            PruningMethod::Llm => PruningStrategy::Llm(LlmPruner::new(llm, retry)),
            PruningMethod::Bm25 => PruningStrategy::Bm25(Bm25Pruner),
            PruningMethod::SentenceBert => {
                PruningStrategy::SentenceBert(EmbeddingPruner::new(embedder))
            }
        }
    }

    pub fn method(&self) -> PruningMethod {
        match self {
            PruningStrategy::Llm(_) => PruningMethod::Llm,
            PruningStrategy::Bm25(_) => PruningMethod::Bm25,
            PruningStrategy::SentenceBert(_) => PruningMethod::SentenceBert,
        }
    }

    /// Normalized score per relation (sums to 1 over `relations`), in input order.
    pub async fn score_relations(
        &self,
        entity_name: &str,
        relations: &[String],
        question: &str,
        top_k: usize,
        temperature: f32,
    ) -> ScoreOutcome {
        if relations.is_empty() {
            return ScoreOutcome::plain(Vec::new());
        }
        let outcome = match self {
            PruningStrategy::Bm25(p) => ScoreOutcome::plain(p.relation_scores(relations, question)),
            PruningStrategy::Llm(p) => match p
                .relation_scores(entity_name, relations, question, top_k, temperature)
                .await
            {
                Ok(s) => ScoreOutcome::plain(s),
                Err(e) => {
                    tracing::warn!(entity = %entity_name, error = %e, "relation scoring model failed; using bm25");
                    ScoreOutcome::degraded(Bm25Pruner.relation_scores(relations, question), LLM_DEGRADED)
                }
            },
            PruningStrategy::SentenceBert(p) => match p.relation_scores(relations, question).await {
                Ok(s) => ScoreOutcome::plain(s),
                Err(e) => {
                    tracing::warn!(entity = %entity_name, error = %e, "relation embedding failed; using bm25");
                    ScoreOutcome::degraded(
                        Bm25Pruner.relation_scores(relations, question),
                        EMBEDDING_DEGRADED,
                    )
                }
            },
        };
        ScoreOutcome {
            scores: normalize_scores(&outcome.scores),
            note: outcome.note,
        }
    }

    /// Aggregate score per candidate (see [`aggregate_score`]), in input order.
    pub async fn score_entities(
        &self,
        candidates: &[CandidateEntity],
        question: &str,
        context: &str,
        temperature: f32,
    ) -> ScoreOutcome {
        if candidates.is_empty() {
            return ScoreOutcome::plain(Vec::new());
        }
        let relevance = match self {
            PruningStrategy::Bm25(p) => ScoreOutcome::plain(p.entity_relevance(candidates, question)),
            PruningStrategy::Llm(p) => match p
                .entity_relevance(candidates, question, context, temperature)
                .await
            {
                Ok(s) => ScoreOutcome::plain(s),
                Err(e) => {
                    tracing::warn!(error = %e, "entity scoring model failed; using bm25");
                    ScoreOutcome::degraded(Bm25Pruner.entity_relevance(candidates, question), LLM_DEGRADED)
                }
            },
            PruningStrategy::SentenceBert(p) => match p.entity_relevance(candidates, question).await {
                Ok(s) => ScoreOutcome::plain(s),
                Err(e) => {
                    tracing::warn!(error = %e, "entity embedding failed; using bm25");
                    ScoreOutcome::degraded(
                        Bm25Pruner.entity_relevance(candidates, question),
                        EMBEDDING_DEGRADED,
                    )
                }
            },
        };
        let scores = candidates
            .iter()
            .zip(relevance.scores.iter().chain(std::iter::repeat(&0.0)))
            .map(|(c, r)| aggregate_score(c.relation_score, *r))
            .collect();
        ScoreOutcome {
            scores,
            note: relevance.note,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::MockEmbedder;
    use crate::llm::{MockLlm, ModelError, ResponseSchema};

    #[test]
    fn normalize_sums_to_one_and_handles_zero() {
        let n = normalize_scores(&[2.0, 1.0, 1.0]);
        assert!((n.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert!((n[0] - 0.5).abs() < 1e-6);
        assert_eq!(normalize_scores(&[0.0, -1.0]), vec![0.5, 0.5]);
        assert_eq!(normalize_scores(&[f32::NAN, 3.0]), vec![0.0, 1.0]);
        assert!(normalize_scores(&[]).is_empty());
    }

    #[test]
    fn prune_is_stable_and_bounded() {
        let items = vec![("a", 0.2), ("b", 0.5), ("c", 0.2), ("d", 0.5), ("e", 0.1)];
        let kept = prune(items, 3, |(_, s)| *s);
        let ids: Vec<_> = kept.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec!["b", "d", "a"]);
    }

    #[test]
    fn aggregate_is_half_and_half() {
        assert!((aggregate_score(1.0, 0.0) - 0.5).abs() < 1e-6);
        assert!((aggregate_score(0.4, 0.8) - 0.6).abs() < 1e-6);
    }

    fn relations() -> Vec<String> {
        vec!["born_in".into(), "works_at".into(), "married_to".into()]
    }

    async fn sum_for(strategy: &PruningStrategy) -> f32 {
        strategy
            .score_relations("Ada", &relations(), "Where was Ada born?", 2, 0.0)
            .await
            .scores
            .iter()
            .sum()
    }

    /// **Scenario**: Relation scores sum to 1 for every strategy.
    #[tokio::test]
    async fn every_strategy_normalizes_relation_scores() {
        let llm: Arc<dyn LlmClient> = Arc::new(MockLlm::new().with_reply(
            ResponseSchema::RelationScores,
            r#"{"relations": [{"relation": "born_in", "score": 0.9}, {"relation": "works_at", "score": 0.3}]}"#,
        ));
        let embedder: Arc<dyn Embedder> = Arc::new(MockEmbedder::default());
        for method in [PruningMethod::Llm, PruningMethod::Bm25, PruningMethod::SentenceBert] {
            let s = PruningStrategy::select(method, llm.clone(), Some(embedder.clone()), RetryPolicy::none());
            assert_eq!(s.method(), method);
            assert!((sum_for(&s).await - 1.0).abs() < 1e-5, "{}", method);
        }
    }

    #[tokio::test]
    async fn model_failure_degrades_to_bm25_with_note() {
        let llm: Arc<dyn LlmClient> = Arc::new(
            MockLlm::new().with_error(ResponseSchema::RelationScores, ModelError::Timeout("slow".into())),
        );
        let s = PruningStrategy::select(PruningMethod::Llm, llm, None, RetryPolicy::none());
        let out = s
            .score_relations("Ada", &relations(), "Where was Ada born?", 2, 0.0)
            .await;
        assert_eq!(out.note.as_deref(), Some(LLM_DEGRADED));
        assert!(out.scores[0] > out.scores[1]);
    }

    #[tokio::test]
    async fn missing_embedder_degrades_to_bm25_with_note() {
        let llm: Arc<dyn LlmClient> = Arc::new(MockLlm::new());
        let s = PruningStrategy::select(PruningMethod::SentenceBert, llm, None, RetryPolicy::none());
        let out = s
            .score_relations("Ada", &relations(), "Where was Ada born?", 2, 0.0)
            .await;
        assert_eq!(out.note.as_deref(), Some(EMBEDDING_DEGRADED));
    }
}
