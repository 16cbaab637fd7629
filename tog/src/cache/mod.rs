//! Cache collaborator for per-entity relation scoring.
//!
//! Values are JSON so any serializable result can be stored. The engine treats
//! every cache failure as a miss and every write as advisory.

mod in_memory;

pub use in_memory::InMemoryCache;

use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
    #[error("cache error: {0}")]
    Other(String),
}

/// Key-value cache with optional TTL.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Returns `None` if the key is not found or has expired.
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError>;

    /// `ttl = None` never expires.
    async fn set(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError>;
}

/// Hex SHA-256 over `parts` joined by NUL; used for cache keys.
pub fn cache_key(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, p) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update([0u8]);
        }
        hasher.update(p.as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cache_trait_object() {
        let cache: Box<dyn Cache> = Box::new(InMemoryCache::new());
        cache
            .set("key", serde_json::json!({"v": 1}), None)
            .await
            .unwrap();
        assert_eq!(
            cache.get("key").await.unwrap(),
            Some(serde_json::json!({"v": 1}))
        );
    }

    #[test]
    fn cache_key_separates_parts() {
        assert_ne!(cache_key(&["ab", "c"]), cache_key(&["a", "bc"]));
        assert_eq!(cache_key(&["a", "b"]), cache_key(&["a", "b"]));
        assert_eq!(cache_key(&["x"]).len(), 64);
    }
}
