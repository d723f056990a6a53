//! In-memory key-value store using moka

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache as MokaCache;
use moka::Expiry;

use crate::domain::cache::Cache;
use crate::domain::DomainError;

#[derive(Debug, Clone)]
pub struct InMemoryCacheConfig {
    /// Maximum number of entries
    pub max_capacity: u64,
    /// Entries not read for this long are evicted
    pub time_to_idle: Option<Duration>,
}

impl Default for InMemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            time_to_idle: None,
        }
    }
}

impl InMemoryCacheConfig {
    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = capacity;
        self
    }

    pub fn with_time_to_idle(mut self, tti: Duration) -> Self {
        self.time_to_idle = Some(tti);
        self
    }
}

#[derive(Debug, Clone)]
struct StoredValue {
    data: String,
    ttl: Option<Duration>,
}

/// Per-entry expiry; `None` keeps the entry until evicted by capacity
struct PerEntryTtl;

impl Expiry<String, StoredValue> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &StoredValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }
}

/// Process-local store: bounded capacity, TTL per entry
#[derive(Debug)]
pub struct InMemoryCache {
    cache: MokaCache<String, StoredValue>,
    config: InMemoryCacheConfig,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::with_config(InMemoryCacheConfig::default())
    }

    pub fn with_config(config: InMemoryCacheConfig) -> Self {
        let mut builder = MokaCache::builder()
            .max_capacity(config.max_capacity)
            .expire_after(PerEntryTtl);

        if let Some(tti) = config.time_to_idle {
            builder = builder.time_to_idle(tti);
        }

        Self {
            cache: builder.build(),
            config,
        }
    }

    pub fn max_capacity(&self) -> u64 {
        self.config.max_capacity
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError> {
        Ok(self.cache.get(key).await.map(|entry| entry.data))
    }

    async fn set_raw(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), DomainError> {
        let entry = StoredValue {
            data: value.to_string(),
            ttl,
        };

        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self.cache.remove(key).await.is_some())
    }

    async fn exists(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self.cache.contains_key(key))
    }

    async fn clear(&self) -> Result<(), DomainError> {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        Ok(())
    }

    async fn size(&self) -> Result<usize, DomainError> {
        self.cache.run_pending_tasks().await;
        Ok(self.cache.entry_count() as usize)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::{CacheEntry, CacheExt, CacheKey, QueryNormalizer};
    use crate::domain::usage::TokenCount;

    const MINUTE: Option<Duration> = Some(Duration::from_secs(60));

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = InMemoryCache::new();

        cache.set("key1", &"value1", MINUTE).await.unwrap();

        let result: Option<String> = cache.get("key1").await.unwrap();
        assert_eq!(result, Some("value1".to_string()));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let cache = InMemoryCache::new();

        let result: Option<String> = cache.get("missing").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_delete() {
        let cache = InMemoryCache::new();
        cache.set("key1", &"value1", MINUTE).await.unwrap();

        assert!(cache.delete("key1").await.unwrap());
        assert!(!cache.delete("key1").await.unwrap());
        assert!(!cache.exists("key1").await.unwrap());
    }

    #[tokio::test]
    async fn test_ttl_expiration() {
        let cache = InMemoryCache::new();

        cache
            .set("key1", &"value1", Some(Duration::from_millis(50)))
            .await
            .unwrap();
        assert!(cache.exists("key1").await.unwrap());

        tokio::time::sleep(Duration::from_millis(120)).await;

        let result: Option<String> = cache.get("key1").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_no_ttl_persists() {
        let cache = InMemoryCache::new();

        cache.set("forever", &"value", None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(cache.exists("forever").await.unwrap());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_ttl() {
        let cache = InMemoryCache::new();

        cache
            .set("key", &"short", Some(Duration::from_millis(50)))
            .await
            .unwrap();
        cache.set("key", &"long", MINUTE).await.unwrap();

        tokio::time::sleep(Duration::from_millis(120)).await;

        let result: Option<String> = cache.get("key").await.unwrap();
        assert_eq!(result, Some("long".to_string()));
    }

    #[tokio::test]
    async fn test_clear_and_size() {
        let cache = InMemoryCache::new();

        cache.set("key1", &"value1", MINUTE).await.unwrap();
        cache.set("key2", &"value2", MINUTE).await.unwrap();
        assert_eq!(cache.size().await.unwrap(), 2);

        cache.clear().await.unwrap();
        assert_eq!(cache.size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cache_entry_roundtrip() {
        let cache = InMemoryCache::with_config(InMemoryCacheConfig::default().with_max_capacity(100));
        let key: CacheKey = QueryNormalizer::new().key_for("What is AI?");
        let entry = CacheEntry::new(
            key.clone(),
            "What is AI?",
            "Artificial intelligence is...",
            "openai",
            "gpt-3.5-turbo",
            TokenCount::exact(4, 12),
        );

        cache.set(&key.namespaced(), &entry, MINUTE).await.unwrap();

        let stored: CacheEntry = cache.get(&key.namespaced()).await.unwrap().unwrap();
        assert_eq!(stored.response, "Artificial intelligence is...");
        assert_eq!(stored.usage.total(), 16);
        assert_eq!(cache.max_capacity(), 100);
        assert_eq!(cache.backend_name(), "memory");
    }
}
