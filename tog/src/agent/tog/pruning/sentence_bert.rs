//! Embedding similarity scoring.
//!
//! Cosine similarity between the question and each descriptor, mapped from
//! [-1, 1] to [0, 1]. Vectors are cached for the lifetime of one query, keyed by
//! the SHA-256 of the text.

use std::sync::Arc;

use dashmap::DashMap;
use sha2::{Digest, Sha256};

use crate::agent::tog::state::CandidateEntity;
use crate::agent::tog::text::humanize_relation;
use crate::embedding::{cosine_similarity, EmbedError, Embedder};

fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Embedding scorer. `embedder: None` makes every call fail so the caller degrades.
#[derive(Clone)]
pub struct EmbeddingPruner {
    embedder: Option<Arc<dyn Embedder>>,
    cache: Arc<DashMap<String, Vec<f32>>>,
}

impl EmbeddingPruner {
    pub fn new(embedder: Option<Arc<dyn Embedder>>) -> Self {
        Self {
            embedder,
            cache: Arc::new(DashMap::new()),
        }
    }

    /// Distinct texts embedded so far in this query.
    pub fn cached_vectors(&self) -> usize {
        self.cache.len()
    }

    /// Vectors for `texts`, embedding only those not cached yet (one batch call).
    async fn vectors(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let embedder = self
            .embedder
            .as_ref()
            .ok_or_else(|| EmbedError::Request("no embedder configured".to_string()))?;
        let keys: Vec<String> = texts.iter().map(|t| content_hash(t)).collect();

        let mut missing: Vec<&str> = Vec::new();
        let mut missing_keys: Vec<&str> = Vec::new();
        for (text, key) in texts.iter().zip(&keys) {
            if !self.cache.contains_key(key) && !missing_keys.contains(&key.as_str()) {
                missing.push(text);
                missing_keys.push(key);
            }
        }
        if !missing.is_empty() {
            let vectors = embedder.embed(&missing).await?;
            if vectors.len() != missing.len() {
                return Err(EmbedError::InvalidResponse(format!(
                    "expected {} vectors, got {}",
                    missing.len(),
                    vectors.len()
                )));
            }
            for (key, v) in missing_keys.iter().zip(vectors) {
                self.cache.insert((*key).to_string(), v);
            }
        }

        keys.iter()
            .map(|k| {
                self.cache
                    .get(k)
                    .map(|v| v.clone())
                    .ok_or_else(|| EmbedError::InvalidResponse("vector missing from cache".to_string()))
            })
            .collect()
    }

    /// `(cos(question, text) + 1) / 2` for each text.
    async fn similarities(&self, question: &str, texts: Vec<String>) -> Result<Vec<f32>, EmbedError> {
        let mut all = Vec::with_capacity(texts.len() + 1);
        all.push(question.to_string());
        all.extend(texts);
        let vectors = self.vectors(&all).await?;
        let (q, rest) = vectors
            .split_first()
            .ok_or_else(|| EmbedError::InvalidResponse("no question vector".to_string()))?;
        Ok(rest
            .iter()
            .map(|v| (cosine_similarity(q, v) + 1.0) / 2.0)
            .collect())
    }

    pub async fn relation_scores(
        &self,
        relations: &[String],
        question: &str,
    ) -> Result<Vec<f32>, EmbedError> {
        self.similarities(question, relations.iter().map(|r| humanize_relation(r)).collect())
            .await
    }

    pub async fn entity_relevance(
        &self,
        candidates: &[CandidateEntity],
        question: &str,
    ) -> Result<Vec<f32>, EmbedError> {
        self.similarities(question, candidates.iter().map(CandidateEntity::descriptor).collect())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::MockEmbedder;

    #[tokio::test]
    async fn scores_lie_in_unit_interval_and_cache_dedupes() {
        let embedder = Arc::new(MockEmbedder::new(4096));
        let pruner = EmbeddingPruner::new(Some(embedder.clone()));
        let rels = vec!["born_in".to_string(), "works_at".to_string()];
        let s = pruner.relation_scores(&rels, "where was she born").await.unwrap();
        assert_eq!(s.len(), 2);
        assert!(s.iter().all(|x| (0.0..=1.0).contains(x)));
        assert!(s[0] > s[1]);
        assert_eq!(pruner.cached_vectors(), 3);

        pruner.relation_scores(&rels, "where was she born").await.unwrap();
        assert_eq!(embedder.calls(), 1);
    }

    #[tokio::test]
    async fn missing_embedder_is_an_error() {
        let pruner = EmbeddingPruner::new(None);
        assert!(pruner
            .relation_scores(&["r".to_string()], "q")
            .await
            .is_err());
    }
}
