//! Knowledge-graph collaborator: the [`KnowledgeGraph`] trait and its data types.
//!
//! The engine only ever asks two things of a graph store: the outgoing edges of
//! one entity, and the entities whose name looks like a phrase. [`ScopeFilter`]
//! narrows both answers for a single query.

mod in_memory;

pub use in_memory::{GraphSnapshot, InMemoryGraph, SnapshotEdge, SnapshotEntity};

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Graph store failure.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GraphError {
    /// Store cannot be reached at all; aborts the query.
    #[error("graph store unavailable: {0}")]
    Unavailable(String),
    /// One lookup failed; the caller treats it as an empty result.
    #[error("graph query failed: {0}")]
    Query(String),
}

/// One outgoing edge of an entity, with the neighbor it leads to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub relation: String,
    pub neighbor_id: String,
    pub neighbor_name: String,
    pub neighbor_type: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// Entity returned by a name search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityMatch {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    /// Number of edges touching the entity; resolver tie-breaker.
    pub degree: usize,
    /// Alternative names the store searched alongside `name`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

/// Graph store the engine reads from.
///
/// `fetch_relations` returns edges in a stable order; the engine preserves that
/// order on score ties.
#[async_trait]
pub trait KnowledgeGraph: Send + Sync {
    async fn fetch_relations(&self, entity_id: &str) -> Result<Vec<GraphEdge>, GraphError>;

    async fn search_entities(
        &self,
        name: &str,
        entity_type: Option<&str>,
    ) -> Result<Vec<EntityMatch>, GraphError>;
}

/// Per-query restriction on which entity and relation types are visible.
///
/// An empty set means "no restriction". Type comparison is case-insensitive.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopeFilter {
    #[serde(default)]
    pub entity_types: HashSet<String>,
    #[serde(default)]
    pub relation_types: HashSet<String>,
}

impl ScopeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.entity_types = types
            .into_iter()
            .map(|t| t.as_ref().to_lowercase())
            .collect();
        self
    }

    pub fn with_relation_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.relation_types = types
            .into_iter()
            .map(|t| t.as_ref().to_lowercase())
            .collect();
        self
    }

    pub fn is_unrestricted(&self) -> bool {
        self.entity_types.is_empty() && self.relation_types.is_empty()
    }

    pub fn allows_entity_type(&self, entity_type: &str) -> bool {
        self.entity_types.is_empty() || self.entity_types.contains(&entity_type.to_lowercase())
    }

    pub fn allows_relation(&self, relation: &str) -> bool {
        self.relation_types.is_empty() || self.relation_types.contains(&relation.to_lowercase())
    }

    /// Order-independent text form, used when keying cached hop results.
    pub fn fingerprint(&self) -> String {
        let mut entities: Vec<&str> = self.entity_types.iter().map(String::as_str).collect();
        let mut relations: Vec<&str> = self.relation_types.iter().map(String::as_str).collect();
        entities.sort_unstable();
        relations.sort_unstable();
        format!("entities={};relations={}", entities.join(","), relations.join(","))
    }

    /// Keeps edges whose relation and neighbor type are both in scope.
    pub fn filter_edges(&self, edges: Vec<GraphEdge>) -> Vec<GraphEdge> {
        if self.is_unrestricted() {
            return edges;
        }
        edges
            .into_iter()
            .filter(|e| self.allows_relation(&e.relation) && self.allows_entity_type(&e.neighbor_type))
            .collect()
    }

    pub fn filter_matches(&self, matches: Vec<EntityMatch>) -> Vec<EntityMatch> {
        if self.entity_types.is_empty() {
            return matches;
        }
        matches
            .into_iter()
            .filter(|m| self.allows_entity_type(&m.entity_type))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(relation: &str, neighbor_type: &str) -> GraphEdge {
        GraphEdge {
            relation: relation.to_string(),
            neighbor_id: "n".to_string(),
            neighbor_name: "N".to_string(),
            neighbor_type: neighbor_type.to_string(),
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn scope_fingerprint_ignores_insertion_order() {
        let a = ScopeFilter::new().with_entity_types(["Person", "City"]);
        let b = ScopeFilter::new().with_entity_types(["city", "person"]);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), ScopeFilter::new().fingerprint());
    }

    #[test]
    fn unrestricted_scope_keeps_everything() {
        let scope = ScopeFilter::new();
        assert!(scope.is_unrestricted());
        assert_eq!(scope.filter_edges(vec![edge("r", "t")]).len(), 1);
    }

    #[test]
    fn scope_filters_relations_and_neighbor_types_case_insensitively() {
        let scope = ScopeFilter::new()
            .with_relation_types(["Works_At"])
            .with_entity_types(["company"]);
        let kept = scope.filter_edges(vec![
            edge("works_at", "Company"),
            edge("works_at", "Person"),
            edge("lives_in", "Company"),
        ]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].neighbor_type, "Company");
    }

    #[test]
    fn graph_error_display() {
        let e = GraphError::Query("unknown entity x".into());
        assert!(e.to_string().contains("unknown entity x"));
    }
}
