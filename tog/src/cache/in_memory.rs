//! In-memory cache backed by a concurrent map.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{Cache, CacheError};

struct CacheEntry {
    value: serde_json::Value,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|t| t <= Instant::now())
    }
}

/// In-memory [`Cache`] with per-entry TTL. Expired entries are dropped on read.
///
/// # Example
///
/// ```rust,ignore
/// use tog::cache::{Cache, InMemoryCache};
///
/// let cache = InMemoryCache::new();
/// cache.set("k", serde_json::json!(1), Some(Duration::from_secs(60))).await?;
/// assert_eq!(cache.get("k").await?, Some(serde_json::json!(1)));
/// ```
#[derive(Default)]
pub struct InMemoryCache {
    data: DashMap<String, CacheEntry>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live (unexpired) entries.
    pub fn len(&self) -> usize {
        self.data.iter().filter(|e| !e.is_expired()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError> {
        let hit = match self.data.get(key) {
            Some(entry) if !entry.is_expired() => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if hit {
            self.data.remove(key);
        }
        Ok(None)
    }

    async fn set(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let expires_at = ttl.map(|d| Instant::now() + d);
        self.data
            .insert(key.to_string(), CacheEntry { value, expires_at });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn in_memory_cache_basic() {
        let cache = InMemoryCache::new();
        assert_eq!(cache.get("missing").await.unwrap(), None);
        cache.set("k", json!("v"), None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(json!("v")));
        cache.set("k", json!("v2"), None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(json!("v2")));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn in_memory_cache_ttl_expires() {
        let cache = InMemoryCache::new();
        cache
            .set("k", json!(1), Some(Duration::from_millis(20)))
            .await
            .unwrap();
        assert!(cache.get("k").await.unwrap().is_some());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(cache.is_empty());
    }
}
