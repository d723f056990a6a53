//! Storage seam for exact-match cache entries

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::domain::DomainError;

/// Backend holding serialized cache entries, with optional per-entry TTL.
///
/// Values cross the trait as JSON strings so it stays object-safe.
#[async_trait]
pub trait Cache: Send + Sync + Debug {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError>;

    /// Sets a raw JSON value; `None` stores the entry without expiry
    async fn set_raw(&self, key: &str, value: &str, ttl: Option<Duration>)
        -> Result<(), DomainError>;

    /// `true` when an entry was removed
    async fn delete(&self, key: &str) -> Result<bool, DomainError>;

    async fn exists(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self.get_raw(key).await?.is_some())
    }

    /// Clears all entries owned by this store
    async fn clear(&self) -> Result<(), DomainError>;

    /// Approximate; expired entries may still be counted
    async fn size(&self) -> Result<usize, DomainError>;

    /// Short backend label used in logs and metrics
    fn backend_name(&self) -> &'static str;
}

fn decode<V: DeserializeOwned>(backend: &str, key: &str, raw: &str) -> Result<V, DomainError> {
    serde_json::from_str(raw).map_err(|e| {
        DomainError::cache_unavailable(backend, format!("Corrupt value under {}: {}", key, e))
    })
}

fn encode<V: Serialize>(backend: &str, key: &str, value: &V) -> Result<String, DomainError> {
    serde_json::to_string(value).map_err(|e| {
        DomainError::cache_unavailable(backend, format!("Cannot encode value for {}: {}", key, e))
    })
}

/// Typed access on top of the raw JSON methods of [`Cache`]
pub trait CacheExt: Cache {
    fn get<'a, V>(
        &'a self,
        key: &'a str,
    ) -> impl std::future::Future<Output = Result<Option<V>, DomainError>> + Send
    where
        V: DeserializeOwned + Send,
    {
        async move {
            self.get_raw(key)
                .await?
                .map(|raw| decode(self.backend_name(), key, &raw))
                .transpose()
        }
    }

    fn set<'a, V>(
        &'a self,
        key: &'a str,
        value: &'a V,
        ttl: Option<Duration>,
    ) -> impl std::future::Future<Output = Result<(), DomainError>> + Send
    where
        V: Serialize + Send + Sync,
    {
        async move {
            let raw = encode(self.backend_name(), key, value)?;
            self.set_raw(key, &raw, ttl).await
        }
    }
}

impl<T: Cache + ?Sized> CacheExt for T {}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Mock key-value store for testing
    #[derive(Debug, Default)]
    pub struct MockCache {
        entries: Mutex<HashMap<String, (String, Option<Duration>)>>,
        error: Mutex<Option<String>>,
        delay: Option<Duration>,
        sets: AtomicUsize,
    }

    impl MockCache {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_error(self, error: impl Into<String>) -> Self {
            *self.error.lock().unwrap() = Some(error.into());
            self
        }

        /// Every operation sleeps this long before answering
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn set_count(&self) -> usize {
            self.sets.load(Ordering::SeqCst)
        }

        pub fn ttl_of(&self, key: &str) -> Option<Option<Duration>> {
            self.entries.lock().unwrap().get(key).map(|(_, ttl)| *ttl)
        }

        async fn check(&self) -> Result<(), DomainError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            if let Some(error) = self.error.lock().unwrap().clone() {
                return Err(DomainError::cache_unavailable("mock", error));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Cache for MockCache {
        async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError> {
            self.check().await?;
            let entries = self.entries.lock().unwrap();

            Ok(entries.get(key).map(|(json, _)| json.clone()))
        }

        async fn set_raw(
            &self,
            key: &str,
            value: &str,
            ttl: Option<Duration>,
        ) -> Result<(), DomainError> {
            self.check().await?;
            self.sets.fetch_add(1, Ordering::SeqCst);
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), (value.to_string(), ttl));
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<bool, DomainError> {
            self.check().await?;
            Ok(self.entries.lock().unwrap().remove(key).is_some())
        }

        async fn clear(&self) -> Result<(), DomainError> {
            self.check().await?;
            self.entries.lock().unwrap().clear();
            Ok(())
        }

        async fn size(&self) -> Result<usize, DomainError> {
            self.check().await?;
            Ok(self.entries.lock().unwrap().len())
        }

        fn backend_name(&self) -> &'static str {
            "mock"
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::domain::cache::{CacheEntry, QueryNormalizer};
        use crate::domain::usage::TokenCount;

        #[tokio::test]
        async fn test_entry_survives_typed_roundtrip_with_ttl() {
            let cache = MockCache::new();
            let key = QueryNormalizer::new().key_for("What is Rust?");
            let entry = CacheEntry::new(
                key.clone(),
                "What is Rust?",
                "A language",
                "openai",
                "gpt-4",
                TokenCount::exact(4, 2),
            );

            cache
                .set(key.as_str(), &entry, Some(Duration::from_secs(60)))
                .await
                .unwrap();

            let stored: Option<CacheEntry> = cache.get(key.as_str()).await.unwrap();
            assert_eq!(stored.unwrap().response, "A language");
            assert_eq!(cache.set_count(), 1);
            assert_eq!(cache.ttl_of(key.as_str()), Some(Some(Duration::from_secs(60))));
        }

        #[tokio::test]
        async fn test_corrupt_value_surfaces_as_cache_error() {
            let cache = MockCache::new();
            cache.set_raw("k", "not json", None).await.unwrap();

            let result: Result<Option<CacheEntry>, _> = cache.get("k").await;
            assert!(matches!(
                result,
                Err(DomainError::CacheUnavailable { ref store, .. }) if store == "mock"
            ));
        }

        #[tokio::test]
        async fn test_failing_backend() {
            let cache = MockCache::new().with_error("connection refused");

            let result: Result<Option<String>, _> = cache.get("key").await;
            assert!(matches!(result, Err(DomainError::CacheUnavailable { .. })));
            assert!(cache.exists("key").await.is_err());
        }

        #[tokio::test]
        async fn test_clear_and_delete() {
            let cache = MockCache::new();
            cache.set("a", &1u32, None).await.unwrap();
            cache.set("b", &2u32, None).await.unwrap();

            assert!(cache.delete("a").await.unwrap());
            assert!(!cache.delete("a").await.unwrap());
            cache.clear().await.unwrap();
            assert_eq!(cache.size().await.unwrap(), 0);
        }
    }
}
