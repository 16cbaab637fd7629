//! Explore node: one hop of EXPLORING(d).
//!
//! Per frontier entity (concurrently, bounded): fetch edges, score relation
//! types, keep that entity's best `search_width` relations. Barrier. Gather the
//! neighbors of every kept relation, score and dedupe them, keep
//! `num_retain_entity`. Those become the next frontier. A step is appended only
//! when something was retained.
//!
//! On deadline the hop keeps every expansion that already finished, whatever
//! its position in the frontier.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};

use crate::cache::{cache_key, Cache};
use crate::error::RunError;
use crate::graph::{Next, Node};
use crate::kg::{GraphEdge, GraphError, KnowledgeGraph};

use super::prompt::format_triplets;
use super::pruning::{aggregate_score, prune};
use super::state::{
    CandidateEntity, CandidateRelation, ExploredEntity, FrontierEntity, Phase, ReasoningStep,
    Termination, ToGState,
};

/// Neighbors considered per retained relation of one entity.
pub const MAX_CANDIDATES_PER_RELATION: usize = 50;

/// Cached result of expanding one entity at one depth.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct CachedExpansion {
    edges: Vec<GraphEdge>,
    relations: Vec<String>,
    scores: Vec<f32>,
}

struct Expansion {
    index: usize,
    entity: FrontierEntity,
    edges: Vec<GraphEdge>,
    relations: Vec<String>,
    scores: Vec<f32>,
    note: Option<String>,
}

pub struct ExploreNode {
    graph: Arc<dyn KnowledgeGraph>,
    cache: Option<Arc<dyn Cache>>,
    cache_ttl: Option<Duration>,
    max_concurrency: usize,
}

/// Relation types in first-seen order.
fn distinct_relations(edges: &[GraphEdge]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for e in edges {
        if !out.contains(&e.relation) {
            out.push(e.relation.clone());
        }
    }
    out
}

impl ExploreNode {
    pub fn new(
        graph: Arc<dyn KnowledgeGraph>,
        cache: Option<Arc<dyn Cache>>,
        cache_ttl: Option<Duration>,
        max_concurrency: usize,
    ) -> Self {
        Self {
            graph,
            cache,
            cache_ttl,
            max_concurrency: max_concurrency.max(1),
        }
    }

    async fn cached(&self, key: &str) -> Option<CachedExpansion> {
        let cache = self.cache.as_ref()?;
        match cache.get(key).await {
            Ok(Some(v)) => serde_json::from_value(v)
                .map_err(|e| tracing::debug!(error = %e, "ignoring undecodable cache entry"))
                .ok(),
            Ok(None) => None,
            Err(e) => {
                tracing::debug!(error = %e, "cache read failed; treating as miss");
                None
            }
        }
    }

    async fn store(&self, key: &str, value: &CachedExpansion) {
        let Some(cache) = self.cache.as_ref() else {
            return;
        };
        let Ok(json) = serde_json::to_value(value) else {
            return;
        };
        if let Err(e) = cache.set(key, json, self.cache_ttl).await {
            tracing::debug!(error = %e, "cache write failed; ignored");
        }
    }

    /// Fetches and scores the relations of one entity. Only `Unavailable` is an error.
    async fn expand(
        &self,
        index: usize,
        entity: &FrontierEntity,
        state: &ToGState,
        depth: usize,
    ) -> Result<Expansion, GraphError> {
        let key = cache_key(&[&entity.id, &depth.to_string(), &state.run_fingerprint]);
        if let Some(hit) = self.cached(&key).await {
            tracing::debug!(entity = %entity.id, depth, "relation scores from cache");
            return Ok(Expansion {
                index,
                entity: entity.clone(),
                edges: hit.edges,
                relations: hit.relations,
                scores: hit.scores,
                note: None,
            });
        }

        let (edges, cacheable) = match self.graph.fetch_relations(&entity.id).await {
            Ok(edges) => (edges, true),
            Err(e @ GraphError::Unavailable(_)) => return Err(e),
            Err(e) => {
                tracing::warn!(entity = %entity.id, error = %e, "fetch_relations failed; no edges");
                (Vec::new(), false)
            }
        };
        let edges = match &state.scope {
            Some(scope) => scope.filter_edges(edges),
            None => edges,
        };
        let relations = distinct_relations(&edges);
        let outcome = state
            .strategy
            .score_relations(
                &entity.name,
                &relations,
                &state.question,
                state.config.search_width,
                state.config.exploration_temperature,
            )
            .await;

        let expansion = CachedExpansion {
            edges,
            relations,
            scores: outcome.scores,
        };
        if cacheable && outcome.note.is_none() {
            self.store(&key, &expansion).await;
        }
        Ok(Expansion {
            index,
            entity: entity.clone(),
            edges: expansion.edges,
            relations: expansion.relations,
            scores: expansion.scores,
            note: outcome.note,
        })
    }

    fn stall(state: &mut ToGState, timed_out: bool) {
        state.phase = Phase::Stalled;
        state.termination = Some(if timed_out {
            Termination::TimedOut
        } else {
            Termination::Stalled
        });
    }
}

#[async_trait]
impl Node<ToGState> for ExploreNode {
    fn id(&self) -> &str {
        super::EXPLORE
    }

    async fn run(&self, state: ToGState) -> Result<(ToGState, Next), RunError> {
        let mut state = state;
        let depth = state.depth + 1;
        state.phase = Phase::Exploring { depth };
        if state.deadline_passed() {
            tracing::warn!(depth, "deadline reached before hop");
            Self::stall(&mut state, true);
            return Ok((state, Next::Continue));
        }

        let mut expansions: Vec<Expansion> = Vec::with_capacity(state.frontier.len());
        let mut timed_out = false;
        {
            let pending: Vec<_> = state
                .frontier
                .iter()
                .enumerate()
                .map(|(index, entity)| self.expand(index, entity, &state, depth))
                .collect();
            let mut results = stream::iter(pending).buffer_unordered(self.max_concurrency);
            loop {
                match tokio::time::timeout_at(state.deadline, results.next()).await {
                    Ok(Some(Ok(expansion))) => expansions.push(expansion),
                    Ok(Some(Err(e))) => {
                        return Err(RunError::from_graph(&e)
                            .unwrap_or_else(|| RunError::GraphUnavailable(e.to_string())))
                    }
                    Ok(None) => break,
                    Err(_) => {
                        timed_out = true;
                        break;
                    }
                }
            }
        }
        expansions.sort_by_key(|x| x.index);

        let mut notes: Vec<String> = Vec::new();
        for note in expansions.iter().filter_map(|x| x.note.clone()) {
            if !notes.contains(&note) {
                notes.push(note.clone());
            }
            state.note_degradation(note);
        }

        let mut relations: Vec<CandidateRelation> = Vec::new();
        let mut candidates: Vec<CandidateEntity> = Vec::new();
        for x in &expansions {
            let own: Vec<CandidateRelation> = x
                .relations
                .iter()
                .zip(&x.scores)
                .map(|(relation, score)| CandidateRelation {
                    source_id: x.entity.id.clone(),
                    source_name: x.entity.name.clone(),
                    relation: relation.clone(),
                    score: *score,
                })
                .collect();
            for rel in prune(own, state.config.search_width, |r| r.score) {
                let neighbors = x
                    .edges
                    .iter()
                    .filter(|e| e.relation == rel.relation)
                    .filter(|e| e.neighbor_id != x.entity.id)
                    .filter(|e| x.entity.parent.as_deref() != Some(e.neighbor_id.as_str()))
                    .take(MAX_CANDIDATES_PER_RELATION);
                candidates.extend(neighbors.map(|e| CandidateEntity {
                    id: e.neighbor_id.clone(),
                    name: e.neighbor_name.clone(),
                    entity_type: e.neighbor_type.clone(),
                    source_id: x.entity.id.clone(),
                    source_name: x.entity.name.clone(),
                    relation: rel.relation.clone(),
                    relation_score: rel.score,
                    score: 0.0,
                }));
                relations.push(rel);
            }
        }

        if !candidates.is_empty() {
            let context = format_triplets(&state.path.triplets());
            let scored = tokio::time::timeout_at(
                state.deadline,
                state.strategy.score_entities(
                    &candidates,
                    &state.question,
                    &context,
                    state.config.exploration_temperature,
                ),
            )
            .await;
            match scored {
                Ok(outcome) => {
                    for (c, s) in candidates.iter_mut().zip(outcome.scores) {
                        c.score = s;
                    }
                    if let Some(note) = outcome.note {
                        if !notes.contains(&note) {
                            notes.push(note.clone());
                        }
                        state.note_degradation(note);
                    }
                }
                Err(_) => {
                    timed_out = true;
                    for c in candidates.iter_mut() {
                        c.score = aggregate_score(c.relation_score, 0.0);
                    }
                }
            }
        }

        let mut deduped: Vec<CandidateEntity> = Vec::with_capacity(candidates.len());
        for c in candidates {
            match deduped.iter_mut().find(|d| d.id == c.id) {
                Some(existing) if c.score > existing.score => *existing = c,
                Some(_) => {}
                None => deduped.push(c),
            }
        }
        let retained = prune(deduped, state.config.num_retain_entity, |c| c.score);

        if timed_out {
            notes.push(format!(
                "deadline reached during hop {}; {} of {} entities expanded",
                depth,
                expansions.len(),
                state.frontier.len()
            ));
        }
        tracing::debug!(
            depth,
            frontier = state.frontier.len(),
            expanded = expansions.len(),
            relations = relations.len(),
            retained = retained.len(),
            timed_out,
            "hop complete"
        );

        state.depth = depth;
        state.frontier = retained
            .iter()
            .map(|c| FrontierEntity {
                id: c.id.clone(),
                name: c.name.clone(),
                entity_type: c.entity_type.clone(),
                parent: Some(c.source_id.clone()),
            })
            .collect();
        if !retained.is_empty() {
            state.path.push(ReasoningStep {
                depth,
                entities_explored: expansions
                    .iter()
                    .map(|x| ExploredEntity {
                        id: x.entity.id.clone(),
                        name: x.entity.name.clone(),
                    })
                    .collect(),
                relations,
                entities: retained,
                sufficiency: None,
                notes,
            });
        }

        if timed_out || state.frontier.is_empty() {
            Self::stall(&mut state, timed_out);
        } else if !state.config.enable_sufficiency_check && depth >= state.config.search_depth {
            state.phase = Phase::Exhausted;
            state.termination = Some(Termination::Exhausted);
        }
        Ok((state, Next::Continue))
    }
}
