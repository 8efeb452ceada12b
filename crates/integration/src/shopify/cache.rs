//! Short-lived cache for successful read responses.
//!
//! Backed by `moka` with a per-entry TTL. A read of an expired key always
//! reports a miss and drops the entry. Expired entries may also be evicted
//! earlier by moka's own housekeeping, which runs alongside other cache
//! operations. There is no capacity bound, so the cache holds every distinct
//! read shape until it expires or [`ResponseCache::clear`] is called.

use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::Expiry;
use moka::future::Cache;
use serde_json::Value;

/// A cached payload and the TTL it was stored with.
#[derive(Debug, Clone)]
struct CacheEntry {
    payload: Arc<Value>,
    ttl: Duration,
}

/// Expires each entry `ttl` after insertion.
struct EntryTtl;

impl Expiry<String, CacheEntry> for EntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Snapshot of the cache contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of live entries.
    pub count: usize,
    /// Keys of the live entries, sorted.
    pub keys: Vec<String>,
}

/// Response cache owned by a [`super::ShopifyClient`].
///
/// Cloning shares the underlying storage.
#[derive(Clone)]
pub struct ResponseCache {
    entries: Cache<String, CacheEntry>,
    default_ttl: Duration,
}

impl ResponseCache {
    /// Create an empty cache whose entries default to `default_ttl`.
    #[must_use]
    pub fn new(default_ttl: Duration) -> Self {
        let entries = Cache::builder().expire_after(EntryTtl).build();
        Self {
            entries,
            default_ttl,
        }
    }

    /// Derive the cache key for a request.
    ///
    /// The URL must be fully qualified, query string included.
    #[must_use]
    pub fn key(method: &str, url: &str, body: Option<&Value>) -> String {
        let body = body.map_or_else(|| "null".to_string(), Value::to_string);
        format!("{method}_{url}_{body}")
    }

    /// Look up a live entry.
    pub async fn get(&self, key: &str) -> Option<Arc<Value>> {
        if let Some(entry) = self.entries.get(key).await {
            return Some(entry.payload);
        }
        // Expired entries are invisible to `get`; drop them now.
        self.entries.invalidate(key).await;
        None
    }

    /// Store a payload, using the default TTL when `ttl` is `None`.
    pub async fn set(&self, key: String, payload: Arc<Value>, ttl: Option<Duration>) {
        let entry = CacheEntry {
            payload,
            ttl: ttl.unwrap_or(self.default_ttl),
        };
        self.entries.insert(key, entry).await;
    }

    /// Remove every entry.
    pub async fn clear(&self) {
        self.entries.invalidate_all();
        self.entries.run_pending_tasks().await;
    }

    /// Count and list the live entries.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .map(|(key, _)| key.as_ref().clone())
            .collect();
        keys.sort();
        CacheStats {
            count: keys.len(),
            keys,
        }
    }

    /// Default TTL applied by [`ResponseCache::set`].
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        self.default_ttl
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_get_returns_stored_payload() {
        let cache = ResponseCache::new(Duration::from_secs(300));
        let key = ResponseCache::key("GET", "https://demo/admin/api/2023-10/shop.json", None);
        cache
            .set(key.clone(), Arc::new(json!({"shop": {"id": 1}})), None)
            .await;

        let hit = cache.get(&key).await.expect("cache hit");
        assert_eq!(hit["shop"]["id"], 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let cache = ResponseCache::new(Duration::from_secs(300));
        cache
            .set(
                "k".to_string(),
                Arc::new(json!(1)),
                Some(Duration::from_millis(50)),
            )
            .await;
        assert!(cache.get("k").await.is_some());

        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(cache.get("k").await.is_none());
        assert_eq!(cache.stats().count, 0);
    }

    #[tokio::test]
    async fn test_clear_and_stats() {
        let cache = ResponseCache::new(Duration::from_secs(300));
        cache.set("b".to_string(), Arc::new(json!(2)), None).await;
        cache.set("a".to_string(), Arc::new(json!(1)), None).await;

        let stats = cache.stats();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.keys, vec!["a".to_string(), "b".to_string()]);

        cache.clear().await;
        assert!(cache.get("a").await.is_none());
        assert_eq!(cache.stats().count, 0);
    }

    #[test]
    fn test_key_includes_method_url_and_body() {
        let url = "https://demo/admin/api/2023-10/orders.json?limit=50&status=any";
        assert_eq!(
            ResponseCache::key("GET", url, None),
            format!("GET_{url}_null")
        );
        assert_ne!(
            ResponseCache::key("GET", url, None),
            ResponseCache::key("GET", url, Some(&json!({"a": 1})))
        );
    }

    #[tokio::test]
    async fn test_concurrent_writers_do_not_corrupt_entries() {
        let cache = ResponseCache::new(Duration::from_secs(300));
        let mut handles = Vec::new();
        for i in 0..32 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .set(format!("key-{i}"), Arc::new(json!(i)), None)
                    .await;
                cache.get(&format!("key-{i}")).await
            }));
        }
        for (i, handle) in handles.into_iter().enumerate() {
            let value = handle.await.expect("join").expect("hit");
            assert_eq!(*value, json!(i));
        }
        assert_eq!(cache.stats().count, 32);
    }
}
