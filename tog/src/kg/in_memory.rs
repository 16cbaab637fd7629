//! In-memory graph store, loadable from a JSON snapshot.
//!
//! Edges are directed unless marked `bidirectional`. Adjacency lists keep
//! insertion order, so `fetch_relations` is stable across calls.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{EntityMatch, GraphEdge, GraphError, KnowledgeGraph};

/// Serialized form of a graph: `{"entities": [...], "edges": [...]}`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub entities: Vec<SnapshotEntity>,
    #[serde(default)]
    pub edges: Vec<SnapshotEdge>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnapshotEntity {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default = "default_entity_type")]
    pub entity_type: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnapshotEdge {
    pub source: String,
    pub relation: String,
    pub target: String,
    #[serde(default)]
    pub bidirectional: bool,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

fn default_entity_type() -> String {
    "entity".to_string()
}

#[derive(Clone, Debug)]
struct StoredEntity {
    name: String,
    entity_type: String,
    aliases: Vec<String>,
}

/// Reference [`KnowledgeGraph`] held entirely in memory.
///
/// Build with [`add_entity`](Self::add_entity) / [`add_edge`](Self::add_edge), or
/// load a [`GraphSnapshot`] with [`from_snapshot`](Self::from_snapshot) /
/// [`load`](Self::load). Read-only once shared.
#[derive(Clone, Debug, Default)]
pub struct InMemoryGraph {
    entities: HashMap<String, StoredEntity>,
    order: Vec<String>,
    adjacency: HashMap<String, Vec<GraphEdge>>,
    degree: HashMap<String, usize>,
    latency: Option<Duration>,
}

fn tokens(s: &str) -> HashSet<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

fn name_matches(query: &str, query_tokens: &HashSet<String>, candidate: &str) -> bool {
    let c = candidate.to_lowercase();
    c == query
        || (query.len() >= 3 && c.len() >= 3 && (c.contains(query) || query.contains(c.as_str())))
        || !tokens(&c).is_disjoint(query_tokens)
}

impl InMemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeps this long in every `fetch_relations` call. Simulates a remote store.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Adds or replaces an entity. Existing edges are kept.
    pub fn add_entity(
        &mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        entity_type: impl Into<String>,
    ) -> &mut Self {
        let id = id.into();
        if !self.entities.contains_key(&id) {
            self.order.push(id.clone());
        }
        self.entities.insert(
            id,
            StoredEntity {
                name: name.into(),
                entity_type: entity_type.into(),
                aliases: Vec::new(),
            },
        );
        self
    }

    /// Adds an alternative name searched by `search_entities`.
    pub fn add_alias(&mut self, id: &str, alias: impl Into<String>) -> Result<&mut Self, GraphError> {
        let entity = self
            .entities
            .get_mut(id)
            .ok_or_else(|| GraphError::Query(format!("unknown entity: {}", id)))?;
        entity.aliases.push(alias.into());
        Ok(self)
    }

    /// Adds a directed edge `source -relation-> target`. Both entities must exist.
    pub fn add_edge(&mut self, source: &str, relation: &str, target: &str) -> Result<&mut Self, GraphError> {
        self.insert_edge(source, relation, target, BTreeMap::new())?;
        Ok(self)
    }

    /// Adds `source -relation-> target` and `target -relation-> source`.
    pub fn add_bidirectional_edge(
        &mut self,
        source: &str,
        relation: &str,
        target: &str,
    ) -> Result<&mut Self, GraphError> {
        self.insert_edge(source, relation, target, BTreeMap::new())?;
        self.insert_edge(target, relation, source, BTreeMap::new())?;
        Ok(self)
    }

    fn insert_edge(
        &mut self,
        source: &str,
        relation: &str,
        target: &str,
        metadata: BTreeMap<String, serde_json::Value>,
    ) -> Result<(), GraphError> {
        if !self.entities.contains_key(source) {
            return Err(GraphError::Query(format!("edge source not found: {}", source)));
        }
        let neighbor = self
            .entities
            .get(target)
            .ok_or_else(|| GraphError::Query(format!("edge target not found: {}", target)))?;
        let edge = GraphEdge {
            relation: relation.to_string(),
            neighbor_id: target.to_string(),
            neighbor_name: neighbor.name.clone(),
            neighbor_type: neighbor.entity_type.clone(),
            metadata,
        };
        self.adjacency.entry(source.to_string()).or_default().push(edge);
        *self.degree.entry(source.to_string()).or_default() += 1;
        *self.degree.entry(target.to_string()).or_default() += 1;
        Ok(())
    }

    /// Builds a graph from a snapshot; edges naming unknown entities are rejected.
    pub fn from_snapshot(snapshot: GraphSnapshot) -> Result<Self, GraphError> {
        let mut graph = Self::new();
        for e in snapshot.entities {
            graph.add_entity(e.id.clone(), e.name, e.entity_type);
            for alias in e.aliases {
                graph.add_alias(&e.id, alias)?;
            }
        }
        for e in snapshot.edges {
            graph.insert_edge(&e.source, &e.relation, &e.target, e.metadata.clone())?;
            if e.bidirectional {
                graph.insert_edge(&e.target, &e.relation, &e.source, e.metadata)?;
            }
        }
        tracing::debug!(
            entities = graph.entity_count(),
            edges = graph.edge_count(),
            "graph snapshot loaded"
        );
        Ok(graph)
    }

    pub fn from_json_str(json: &str) -> Result<Self, GraphError> {
        let snapshot: GraphSnapshot = serde_json::from_str(json)
            .map_err(|e| GraphError::Unavailable(format!("invalid graph snapshot: {}", e)))?;
        Self::from_snapshot(snapshot)
    }

    /// Reads a JSON snapshot file. Unreadable or unparsable files are `Unavailable`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GraphError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            GraphError::Unavailable(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&raw)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Directed edge count (a bidirectional edge counts twice).
    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl KnowledgeGraph for InMemoryGraph {
    async fn fetch_relations(&self, entity_id: &str) -> Result<Vec<GraphEdge>, GraphError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if !self.entities.contains_key(entity_id) {
            return Err(GraphError::Query(format!("unknown entity: {}", entity_id)));
        }
        Ok(self.adjacency.get(entity_id).cloned().unwrap_or_default())
    }

    async fn search_entities(
        &self,
        name: &str,
        entity_type: Option<&str>,
    ) -> Result<Vec<EntityMatch>, GraphError> {
        let query = name.trim().to_lowercase();
        let query_tokens = tokens(&query);
        let wanted_type = entity_type.map(str::to_lowercase);
        let matches = self
            .order
            .iter()
            .filter_map(|id| self.entities.get(id).map(|e| (id, e)))
            .filter(|(_, e)| {
                wanted_type
                    .as_deref()
                    .map_or(true, |t| e.entity_type.to_lowercase() == t)
            })
            .filter(|(_, e)| {
                name_matches(&query, &query_tokens, &e.name)
                    || e.aliases.iter().any(|a| name_matches(&query, &query_tokens, a))
            })
            .map(|(id, e)| EntityMatch {
                id: id.clone(),
                name: e.name.clone(),
                entity_type: e.entity_type.clone(),
                degree: self.degree.get(id).copied().unwrap_or(0),
                aliases: e.aliases.clone(),
            })
            .collect();
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> InMemoryGraph {
        let mut g = InMemoryGraph::new();
        g.add_entity("a", "Ada Lovelace", "person")
            .add_entity("b", "Analytical Engine", "machine")
            .add_entity("c", "Charles Babbage", "person");
        g.add_edge("a", "wrote_notes_on", "b").unwrap();
        g.add_bidirectional_edge("a", "collaborated_with", "c")
            .unwrap();
        g
    }

    #[tokio::test]
    async fn fetch_relations_is_directed_and_ordered() {
        let g = triangle();
        let edges = g.fetch_relations("a").await.unwrap();
        let rels: Vec<_> = edges.iter().map(|e| e.relation.as_str()).collect();
        assert_eq!(rels, vec!["wrote_notes_on", "collaborated_with"]);
        assert!(g.fetch_relations("b").await.unwrap().is_empty());
        assert_eq!(g.fetch_relations("c").await.unwrap()[0].neighbor_id, "a");
    }

    #[tokio::test]
    async fn fetch_relations_unknown_entity_is_query_error() {
        let g = triangle();
        assert!(matches!(
            g.fetch_relations("zzz").await,
            Err(GraphError::Query(_))
        ));
    }

    #[tokio::test]
    async fn search_matches_tokens_and_reports_degree() {
        let g = triangle();
        let hits = g.search_entities("lovelace", None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");
        assert_eq!(hits[0].degree, 3);
        assert!(hits[0].aliases.is_empty());
        assert!(g
            .search_entities("lovelace", Some("machine"))
            .await
            .unwrap()
            .is_empty());
    }

    #[test]
    fn snapshot_with_unknown_edge_target_is_rejected() {
        let json = r#"{
            "entities": [{"id": "a", "name": "A"}],
            "edges": [{"source": "a", "relation": "r", "target": "missing"}]
        }"#;
        assert!(matches!(
            InMemoryGraph::from_json_str(json),
            Err(GraphError::Query(_))
        ));
    }

    #[test]
    fn snapshot_bidirectional_edges_count_twice() {
        let json = r#"{
            "entities": [{"id": "a", "name": "A", "type": "t"}, {"id": "b", "name": "B"}],
            "edges": [{"source": "a", "relation": "r", "target": "b", "bidirectional": true}]
        }"#;
        let g = InMemoryGraph::from_json_str(json).unwrap();
        assert_eq!(g.entity_count(), 2);
        assert_eq!(g.edge_count(), 2);
    }
}
