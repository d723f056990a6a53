//! Exact-match store selection and settings

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::cache::{Cache, QueryNormalizer};
use crate::domain::DomainError;

use super::in_memory::{InMemoryCache, InMemoryCacheConfig};
use super::redis::{RedisCache, RedisCacheConfig};

/// Supported key-value store backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    /// Process-local moka cache
    #[default]
    InMemory,
    Redis,
}

impl std::fmt::Display for CacheBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheBackend::InMemory => write!(f, "in_memory"),
            CacheBackend::Redis => write!(f, "redis"),
        }
    }
}

/// `cache` section of the application config
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackend,
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Entry lifetime; 0 stores without expiry
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
    /// Deadline for each store, index or embedding call
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,
    #[serde(default)]
    pub case_insensitive_keys: bool,
    #[serde(default = "default_write_enabled")]
    pub write_enabled: bool,
}

fn default_key_prefix() -> String {
    "llm-cache".to_string()
}

fn default_ttl_secs() -> u64 {
    3600
}

fn default_max_capacity() -> u64 {
    10_000
}

fn default_operation_timeout_ms() -> u64 {
    500
}

fn default_write_enabled() -> bool {
    true
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            redis_url: None,
            key_prefix: default_key_prefix(),
            ttl_secs: default_ttl_secs(),
            max_capacity: default_max_capacity(),
            operation_timeout_ms: default_operation_timeout_ms(),
            case_insensitive_keys: false,
            write_enabled: default_write_enabled(),
        }
    }
}

impl CacheConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    pub fn normalizer(&self) -> QueryNormalizer {
        QueryNormalizer::new().with_case_insensitive(self.case_insensitive_keys)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.operation_timeout_ms == 0 {
            return Err(DomainError::configuration(
                "cache.operation_timeout_ms must be greater than 0",
            ));
        }

        if self.backend == CacheBackend::Redis && self.redis_url.is_none() {
            return Err(DomainError::configuration(
                "cache.redis_url is required for the redis backend",
            ));
        }

        Ok(())
    }
}

/// Builds the configured key-value store
#[derive(Debug, Default)]
pub struct CacheFactory;

impl CacheFactory {
    pub fn new() -> Self {
        Self
    }

    pub async fn create(&self, config: &CacheConfig) -> Result<Arc<dyn Cache>, DomainError> {
        match config.backend {
            CacheBackend::InMemory => {
                let cache = InMemoryCache::with_config(
                    InMemoryCacheConfig::default().with_max_capacity(config.max_capacity),
                );
                Ok(Arc::new(cache))
            }
            CacheBackend::Redis => {
                let url = config.redis_url.clone().ok_or_else(|| {
                    DomainError::configuration("Redis URL is required for Redis cache backend")
                })?;

                let redis_config =
                    RedisCacheConfig::new(url).with_key_prefix(config.key_prefix.clone());

                let cache = RedisCache::new(redis_config).await?;
                Ok(Arc::new(cache))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::CacheExt;

    #[test]
    fn test_backend_deserialize() {
        let config: CacheConfig =
            serde_json::from_str(r#"{"backend": "redis", "redis_url": "redis://localhost"}"#)
                .unwrap();

        assert_eq!(config.backend, CacheBackend::Redis);
        assert_eq!(config.ttl_secs, 3600);
        assert_eq!(config.operation_timeout(), Duration::from_millis(500));
        assert!(config.write_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_redis_requires_url() {
        let config = CacheConfig {
            backend: CacheBackend::Redis,
            ..Default::default()
        };

        assert!(matches!(
            config.validate(),
            Err(DomainError::Configuration { .. })
        ));
    }

    #[test]
    fn test_normalizer_follows_case_setting() {
        let config = CacheConfig {
            case_insensitive_keys: true,
            ..Default::default()
        };

        assert_eq!(
            config.normalizer().key_for("What is AI?"),
            config.normalizer().key_for("what IS ai?")
        );
        assert_ne!(
            CacheConfig::default().normalizer().key_for("What is AI?"),
            CacheConfig::default().normalizer().key_for("what is ai?")
        );
    }

    #[tokio::test]
    async fn test_factory_create_in_memory() {
        let cache = CacheFactory::new().create(&CacheConfig::default()).await.unwrap();

        cache
            .set("test", &"value", Some(Duration::from_secs(60)))
            .await
            .unwrap();

        let result: Option<String> = cache.get("test").await.unwrap();
        assert_eq!(result, Some("value".to_string()));
        assert_eq!(cache.backend_name(), "memory");
    }

    #[tokio::test]
    async fn test_factory_create_redis_missing_url() {
        let config = CacheConfig {
            backend: CacheBackend::Redis,
            redis_url: None,
            ..Default::default()
        };

        assert!(CacheFactory::new().create(&config).await.is_err());
    }

    #[test]
    fn test_backend_display() {
        assert_eq!(CacheBackend::InMemory.to_string(), "in_memory");
        assert_eq!(CacheBackend::Redis.to_string(), "redis");
    }
}
