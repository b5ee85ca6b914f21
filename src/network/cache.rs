//! Hot resource cache
//!
//! Short-lived in-memory copies of fetched resources, keyed by absolute URL.
//! Entries expire after a fixed time-to-live. Capacity is a byte budget:
//! each entry weighs its body plus key, and once the total passes the budget
//! moka evicts the least valuable entries first.

use super::Response;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Default time-to-live for cached resources (5 minutes)
pub const DEFAULT_HOT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Default byte budget across all cached bodies (256 MiB)
pub const DEFAULT_HOT_CACHE_MAX_BYTES: u64 = 256 * 1024 * 1024;

/// A cached resource body
#[derive(Debug, Clone)]
pub struct CachedResource {
    pub body: Vec<u8>,
    pub content_type: Option<String>,
    /// Declared Content-Length, if the origin sent one
    pub content_length: Option<u64>,
    pub cached_at: DateTime<Utc>,
}

impl From<Response> for CachedResource {
    fn from(response: Response) -> Self {
        let content_type = response.content_type().map(str::to_string);
        let content_length = response.content_length();
        Self {
            body: response.into_body(),
            content_type,
            content_length,
            cached_at: Utc::now(),
        }
    }
}

/// Expiring in-memory cache of resource bodies
#[derive(Clone)]
pub struct HotCache {
    entries: Cache<String, Arc<CachedResource>>,
}

impl HotCache {
    /// Create a cache with default limits
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_HOT_CACHE_TTL, DEFAULT_HOT_CACHE_MAX_BYTES)
    }

    /// Create a cache holding at most `max_bytes` of keys and bodies
    pub fn with_limits(ttl: Duration, max_bytes: u64) -> Self {
        Self {
            entries: Cache::builder()
                .time_to_live(ttl)
                .weigher(weigh)
                .max_capacity(max_bytes)
                .build(),
        }
    }

    /// Get a cached resource if it has not expired
    pub async fn get(&self, url: &str) -> Option<Arc<CachedResource>> {
        self.entries.get(url).await
    }

    /// Store a resource, replacing any previous copy
    pub async fn insert(&self, url: impl Into<String>, resource: CachedResource) -> Arc<CachedResource> {
        let resource = Arc::new(resource);
        self.entries.insert(url.into(), Arc::clone(&resource)).await;
        resource
    }

    pub async fn remove(&self, url: &str) {
        self.entries.invalidate(url).await;
    }

    /// Apply pending expirations and evictions, returning the entry count afterwards
    pub async fn run_maintenance(&self) -> u64 {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count()
    }

    /// Approximate number of cached entries
    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }

    /// Approximate bytes held, as counted against the budget
    pub fn weighted_size(&self) -> u64 {
        self.entries.weighted_size()
    }
}

fn weigh(url: &String, resource: &Arc<CachedResource>) -> u32 {
    url.len()
        .saturating_add(resource.body.len())
        .try_into()
        .unwrap_or(u32::MAX)
}

impl Default for HotCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(body: &[u8]) -> CachedResource {
        CachedResource {
            body: body.to_vec(),
            content_type: Some("text/plain".to_string()),
            content_length: Some(body.len() as u64),
            cached_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_cache_put_get() {
        let cache = HotCache::new();
        cache.insert("https://example.com/", resource(b"Hello, World!")).await;

        let cached = cache.get("https://example.com/").await;
        assert_eq!(cached.unwrap().body, b"Hello, World!");
        assert!(cache.get("https://example.com/other").await.is_none());
    }

    #[tokio::test]
    async fn test_cache_expires() {
        let cache = HotCache::with_limits(Duration::from_millis(50), 100);
        cache.insert("https://example.com/", resource(b"x")).await;
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(cache.get("https://example.com/").await.is_none());
    }

    #[tokio::test]
    async fn test_cache_remove_and_count() {
        let cache = HotCache::new();
        cache.insert("a", resource(b"1")).await;
        cache.insert("b", resource(b"2")).await;
        assert_eq!(cache.run_maintenance().await, 2);

        cache.remove("a").await;
        assert_eq!(cache.run_maintenance().await, 1);
    }

    #[tokio::test]
    async fn test_cache_stays_within_byte_budget() {
        let cache = HotCache::with_limits(DEFAULT_HOT_CACHE_TTL, 4096);
        for i in 0..8 {
            cache.insert(format!("https://example.com/{i}.png"), resource(&[0u8; 1024])).await;
        }
        cache.run_maintenance().await;

        assert!(cache.weighted_size() <= 4096, "holding {} bytes", cache.weighted_size());
        assert!(cache.entry_count() < 8);
    }

    #[tokio::test]
    async fn test_body_larger_than_budget_is_not_kept() {
        let cache = HotCache::with_limits(DEFAULT_HOT_CACHE_TTL, 1024);
        cache.insert("https://example.com/huge.bin", resource(&[0u8; 4096])).await;
        cache.run_maintenance().await;

        assert!(cache.get("https://example.com/huge.bin").await.is_none());
        assert_eq!(cache.weighted_size(), 0);
    }

    #[test]
    fn test_from_response() {
        let url = url::Url::parse("https://example.com/a.png").unwrap();
        let response = Response::new(url, 200, vec![1, 2, 3])
            .with_headers(Some("image/png".to_string()), Some(3));
        let cached = CachedResource::from(response);
        assert_eq!(cached.content_type.as_deref(), Some("image/png"));
        assert_eq!(cached.content_length, Some(3));
        assert_eq!(cached.body, vec![1, 2, 3]);
    }
}
