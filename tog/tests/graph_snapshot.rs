//! Loading `InMemoryGraph` from JSON snapshot files.


use std::io::Write;

use tog::{GraphError, InMemoryGraph, KnowledgeGraph};

const SNAPSHOT: &str = r#"{
  "entities": [
    {"id": "q1", "name": "Marie Curie", "type": "person", "aliases": ["Maria Skłodowska"]},
    {"id": "q2", "name": "Pierre Curie", "type": "person"},
    {"id": "q3", "name": "Nobel Prize in Physics", "type": "award"},
    {"id": "q4", "name": "Warsaw"}
  ],
  "edges": [
    {"source": "q1", "relation": "spouse", "target": "q2", "bidirectional": true},
    {"source": "q1", "relation": "award_received", "target": "q3", "metadata": {"year": 1903}},
    {"source": "q1", "relation": "born_in", "target": "q4"}
  ]
}"#;

#[tokio::test]
async fn snapshot_file_round_trips_into_queries() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(SNAPSHOT.as_bytes()).unwrap();

    let graph = InMemoryGraph::load(file.path()).unwrap();
    assert_eq!(graph.entity_count(), 4);
    assert_eq!(graph.edge_count(), 4);

    let edges = graph.fetch_relations("q1").await.unwrap();
    let relations: Vec<&str> = edges.iter().map(|e| e.relation.as_str()).collect();
    assert_eq!(relations, vec!["spouse", "award_received", "born_in"]);
    assert_eq!(edges[1].metadata["year"], serde_json::json!(1903));
    assert_eq!(edges[2].neighbor_type, "entity");

    let back = graph.fetch_relations("q2").await.unwrap();
    assert_eq!(back.len(), 1);
    assert_eq!(back[0].neighbor_id, "q1");

    let by_alias = graph.search_entities("Skłodowska", None).await.unwrap();
    assert_eq!(by_alias[0].id, "q1");
    assert_eq!(by_alias[0].degree, 4);
}

#[tokio::test]
async fn typed_search_is_case_insensitive() {
    let graph = InMemoryGraph::from_json_str(SNAPSHOT).unwrap();
    let people = graph.search_entities("Curie", Some("PERSON")).await.unwrap();
    let ids: Vec<&str> = people.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["q1", "q2"]);
    assert!(graph
        .search_entities("Curie", Some("award"))
        .await
        .unwrap()
        .is_empty());
}

#[test]
fn missing_or_garbled_snapshot_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.json");
    assert!(matches!(
        InMemoryGraph::load(&missing),
        Err(GraphError::Unavailable(_))
    ));
    assert!(matches!(
        InMemoryGraph::from_json_str("{not json"),
        Err(GraphError::Unavailable(_))
    ));
}
