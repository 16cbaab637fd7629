//! Okapi BM25 scoring of the question against candidate descriptors.
//!
//! The corpus is the candidate set itself, so scores are only comparable within
//! one call. Deterministic and offline.

use std::collections::{HashMap, HashSet};

use crate::agent::tog::state::CandidateEntity;
use crate::agent::tog::text::{humanize_relation, tokenize};

pub const K1: f32 = 1.2;
pub const B: f32 = 0.75;

/// Strips a common English suffix from longer tokens so `founded` meets `founder`.
fn stem(token: &str) -> String {
    for suffix in ["ing", "ed", "er", "es", "s"] {
        if token.len() > suffix.len() + 3 {
            if let Some(stripped) = token.strip_suffix(suffix) {
                return stripped.to_string();
            }
        }
    }
    token.to_string()
}

fn terms(text: &str) -> Vec<String> {
    tokenize(text).iter().map(|t| stem(t)).collect()
}

/// Raw BM25 score of `query` against each document, in document order.
pub fn bm25_scores(query: &str, documents: &[String]) -> Vec<f32> {
    let docs: Vec<Vec<String>> = documents.iter().map(|d| terms(d)).collect();
    let n = docs.len();
    if n == 0 {
        return Vec::new();
    }
    let avg_doc_len = (docs.iter().map(Vec::len).sum::<usize>() as f32 / n as f32).max(1.0);

    let query_terms: Vec<String> = {
        let mut seen = HashSet::new();
        terms(query)
            .into_iter()
            .filter(|t| seen.insert(t.clone()))
            .collect()
    };
    let doc_freq: HashMap<&str, usize> = query_terms
        .iter()
        .map(|t| (t.as_str(), docs.iter().filter(|d| d.contains(t)).count()))
        .collect();

    docs.iter()
        .map(|doc| {
            let len = doc.len() as f32;
            query_terms
                .iter()
                .map(|t| {
                    let tf = doc.iter().filter(|d| *d == t).count() as f32;
                    if tf == 0.0 {
                        return 0.0;
                    }
                    let df = doc_freq.get(t.as_str()).copied().unwrap_or(0) as f32;
                    let idf = (1.0 + (n as f32 - df + 0.5) / (df + 0.5)).ln();
                    idf * tf * (K1 + 1.0) / (tf + K1 * (1.0 - B + B * len / avg_doc_len))
                })
                .sum()
        })
        .collect()
}

/// Lexical scorer; holds no state.
#[derive(Clone, Copy, Debug, Default)]
pub struct Bm25Pruner;

impl Bm25Pruner {
    /// Raw scores for relation types; the caller normalizes.
    pub fn relation_scores(&self, relations: &[String], question: &str) -> Vec<f32> {
        let docs: Vec<String> = relations.iter().map(|r| humanize_relation(r)).collect();
        bm25_scores(question, &docs)
    }

    /// Relevance in [0, 1]: BM25 divided by the best score in the set.
    pub fn entity_relevance(&self, candidates: &[CandidateEntity], question: &str) -> Vec<f32> {
        let docs: Vec<String> = candidates.iter().map(CandidateEntity::descriptor).collect();
        let raw = bm25_scores(question, &docs);
        let max = raw.iter().copied().fold(0.0f32, f32::max);
        if max <= 0.0 {
            return vec![0.0; raw.len()];
        }
        raw.iter().map(|s| s / max).collect()
    }
}
