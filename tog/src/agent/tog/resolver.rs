//! Entity resolver: question → topic entities in the graph.
//!
//! The model names the phrases; the graph supplies candidates; lexical
//! similarity decides. Model failure falls back to heuristic phrase extraction.

use std::sync::Arc;

use serde::Deserialize;

use crate::graph::RetryPolicy;
use crate::kg::{EntityMatch, GraphError, KnowledgeGraph, ScopeFilter};
use crate::llm::{complete_structured, CompletionRequest, LlmClient, ResponseSchema};

use super::prompt::{topic_entity_prompt, TOPIC_ENTITY_SYSTEM};
use super::state::TopicEntity;
use super::text::{extract_candidate_phrases, lexical_similarity};

/// Candidates below this similarity to their phrase are dropped.
pub const SIMILARITY_FLOOR: f32 = 0.6;

pub const RESOLVER_DEGRADED: &str = "topic extraction degraded to heuristics";

#[derive(Deserialize)]
struct TopicEntitiesReply {
    entities: Vec<PhraseItem>,
}

#[derive(Clone, Debug, Deserialize)]
struct PhraseItem {
    name: String,
    #[serde(default, rename = "type")]
    entity_type: Option<String>,
}

/// Resolved topic entities plus a note when the heuristic path was used.
#[derive(Clone, Debug, Default)]
pub struct Resolution {
    pub entities: Vec<TopicEntity>,
    pub note: Option<String>,
}

/// Similarity of `phrase` to the closest of the match's name and aliases.
fn best_similarity(phrase: &str, m: &EntityMatch) -> f32 {
    m.aliases
        .iter()
        .map(|a| lexical_similarity(phrase, a))
        .fold(lexical_similarity(phrase, &m.name), f32::max)
}

pub struct EntityResolver {
    llm: Arc<dyn LlmClient>,
    graph: Arc<dyn KnowledgeGraph>,
    retry: RetryPolicy,
}

impl EntityResolver {
    pub fn new(llm: Arc<dyn LlmClient>, graph: Arc<dyn KnowledgeGraph>, retry: RetryPolicy) -> Self {
        Self { llm, graph, retry }
    }

    async fn phrases(&self, question: &str, temperature: f32) -> (Vec<PhraseItem>, Option<String>) {
        let request = CompletionRequest::new(
            ResponseSchema::TopicEntities,
            topic_entity_prompt(question),
            temperature,
        )
        .with_system(TOPIC_ENTITY_SYSTEM);
        let heuristic = || {
            extract_candidate_phrases(question)
                .into_iter()
                .map(|name| PhraseItem {
                    name,
                    entity_type: None,
                })
                .collect::<Vec<_>>()
        };
        match complete_structured::<TopicEntitiesReply>(self.llm.as_ref(), &request, &self.retry).await {
            Ok(reply) => {
                let items: Vec<PhraseItem> = reply
                    .entities
                    .into_iter()
                    .filter(|p| !p.name.trim().is_empty())
                    .collect();
                if items.is_empty() {
                    tracing::debug!("model named no entities; using heuristic phrases");
                    (heuristic(), None)
                } else {
                    (items, None)
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "topic extraction failed; using heuristic phrases");
                (heuristic(), Some(RESOLVER_DEGRADED.to_string()))
            }
        }
    }

    async fn search(&self, phrase: &PhraseItem) -> Result<Vec<EntityMatch>, GraphError> {
        let typed = self
            .graph
            .search_entities(&phrase.name, phrase.entity_type.as_deref())
            .await?;
        if typed.is_empty() && phrase.entity_type.is_some() {
            return self.graph.search_entities(&phrase.name, None).await;
        }
        Ok(typed)
    }

    /// Topic entities for `question`, best first, at most `limit`.
    ///
    /// Empty is a valid outcome. Only `GraphError::Unavailable` is returned as an
    /// error; a failed search for one phrase skips that phrase.
    pub async fn resolve(
        &self,
        question: &str,
        temperature: f32,
        limit: usize,
        scope: Option<&ScopeFilter>,
    ) -> Result<Resolution, GraphError> {
        let (phrases, note) = self.phrases(question, temperature).await;
        tracing::debug!(phrases = ?phrases.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(), "topic phrases");

        let mut found: Vec<TopicEntity> = Vec::new();
        for phrase in &phrases {
            let matches = match self.search(phrase).await {
                Ok(m) => m,
                Err(e @ GraphError::Unavailable(_)) => return Err(e),
                Err(e) => {
                    tracing::warn!(phrase = %phrase.name, error = %e, "entity search failed; skipping phrase");
                    continue;
                }
            };
            let matches = match scope {
                Some(s) => s.filter_matches(matches),
                None => matches,
            };
            for m in matches {
                let similarity = best_similarity(&phrase.name, &m);
                if similarity < SIMILARITY_FLOOR {
                    continue;
                }
                match found.iter_mut().find(|t| t.id == m.id) {
                    Some(existing) if existing.confidence < similarity => existing.confidence = similarity,
                    Some(_) => {}
                    None => found.push(TopicEntity {
                        id: m.id,
                        name: m.name,
                        entity_type: m.entity_type,
                        confidence: similarity,
                        degree: m.degree,
                    }),
                }
            }
        }

        found.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| b.degree.cmp(&a.degree))
        });
        found.truncate(limit);
        Ok(Resolution {
            entities: found,
            note,
        })
    }
}
