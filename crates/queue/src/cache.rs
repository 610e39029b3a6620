//! In-memory payload cache with TTL + size bound: an
//! `Arc<RwLock<HashMap<..>>>` with an `Instant`-stamped entry and
//! size-capped eviction of the oldest entry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use resume_spine_shared::PayloadRef;
use tokio::sync::RwLock;
use tracing::debug;

struct CachedPayload {
    text: String,
    cached_at: Instant,
}

/// The Document store → Queue Engine contract backing the payload
/// cache; a real implementation reads from object storage or a table
/// the upstream HTTP surface already wrote to before enqueueing.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn fetch_text(&self, payload_ref: &PayloadRef) -> Option<String>;
}

pub struct PayloadCache {
    entries: Arc<RwLock<HashMap<PayloadRef, CachedPayload>>>,
    ttl: Duration,
    max_entries: usize,
}

impl PayloadCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
            max_entries,
        }
    }

    pub async fn get(&self, payload_ref: &PayloadRef) -> Option<String> {
        let cache = self.entries.read().await;
        cache.get(payload_ref).and_then(|entry| {
            if entry.cached_at.elapsed() < self.ttl {
                Some(entry.text.clone())
            } else {
                None
            }
        })
    }

    pub async fn put(&self, payload_ref: PayloadRef, text: String) {
        let mut cache = self.entries.write().await;

        if cache.len() >= self.max_entries && !cache.contains_key(&payload_ref) {
            if let Some(oldest_key) = cache
                .iter()
                .min_by_key(|(_, v)| v.cached_at)
                .map(|(k, _)| k.clone())
            {
                cache.remove(&oldest_key);
                debug!("Evicted oldest payload cache entry to stay under limit");
            }
        }

        cache.insert(
            payload_ref,
            CachedPayload {
                text,
                cached_at: Instant::now(),
            },
        );
    }

    /// Removes entries past their TTL. Run by the Cleanup Orchestrator's
    /// periodic sweep.
    pub async fn evict_stale(&self) -> usize {
        let mut cache = self.entries.write().await;
        let before = cache.len();
        cache.retain(|_, entry| entry.cached_at.elapsed() < self.ttl);
        before - cache.len()
    }

    /// Drops every entry. Used by the Cleanup Orchestrator's emergency
    /// sweep on memory pressure onset.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_within_ttl_returns_value() {
        let cache = PayloadCache::new(Duration::from_secs(60), 10);
        let key = PayloadRef("p1".to_string());
        cache.put(key.clone(), "hello".to_string()).await;
        assert_eq!(cache.get(&key).await, Some("hello".to_string()));
    }

    #[tokio::test]
    async fn expired_entry_returns_none() {
        let cache = PayloadCache::new(Duration::from_millis(10), 10);
        let key = PayloadRef("p1".to_string());
        cache.put(key.clone(), "hello".to_string()).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.get(&key).await, None);
    }

    #[tokio::test]
    async fn size_bound_evicts_oldest() {
        let cache = PayloadCache::new(Duration::from_secs(60), 2);
        cache.put(PayloadRef("a".to_string()), "1".to_string()).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        cache.put(PayloadRef("b".to_string()), "2".to_string()).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        cache.put(PayloadRef("c".to_string()), "3".to_string()).await;

        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.get(&PayloadRef("a".to_string())).await, None);
        assert_eq!(cache.get(&PayloadRef("c".to_string())).await, Some("3".to_string()));
    }

    #[tokio::test]
    async fn clear_drops_everything() {
        let cache = PayloadCache::new(Duration::from_secs(60), 10);
        cache.put(PayloadRef("a".to_string()), "1".to_string()).await;
        cache.clear().await;
        assert_eq!(cache.len().await, 0);
    }
}
