//! Redis key-value store

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use crate::domain::cache::Cache;
use crate::domain::DomainError;

const STORE: &str = "redis";

#[derive(Debug, Clone)]
pub struct RedisCacheConfig {
    /// Connection URL, e.g. `redis://127.0.0.1:6379`
    pub url: String,
    /// Every key is stored as `<prefix>:<key>`
    pub key_prefix: String,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: "llm-cache".to_string(),
        }
    }
}

impl RedisCacheConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    fn prefix_key(&self, key: &str) -> String {
        if self.key_prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}:{}", self.key_prefix, key)
        }
    }
}

/// Store backed by a shared, auto-reconnecting Redis connection
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
    config: RedisCacheConfig,
}

impl fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCache")
            .field("config", &self.config)
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

fn store_error(action: &str, e: redis::RedisError) -> DomainError {
    DomainError::cache_unavailable(STORE, format!("{}: {}", action, e))
}

impl RedisCache {
    pub async fn new(config: RedisCacheConfig) -> Result<Self, DomainError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| store_error("Failed to create Redis client", e))?;

        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| store_error("Failed to connect to Redis", e))?;

        Ok(Self { connection, config })
    }

    /// Walk every key under our prefix with SCAN
    async fn scan_prefixed(&self) -> Result<Vec<String>, DomainError> {
        let pattern = self.config.prefix_key("*");
        let mut conn = self.connection.clone();
        let mut cursor = 0u64;
        let mut found = Vec::new();

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(500)
                .query_async(&mut conn)
                .await
                .map_err(|e| store_error("Failed to scan keys", e))?;

            found.extend(keys);
            cursor = next;

            if cursor == 0 {
                break;
            }
        }

        Ok(found)
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError> {
        let mut conn = self.connection.clone();

        conn.get(self.config.prefix_key(key))
            .await
            .map_err(|e| store_error(&format!("Failed to get key '{}'", key), e))
    }

    async fn set_raw(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), DomainError> {
        let prefixed_key = self.config.prefix_key(key);
        let mut conn = self.connection.clone();

        let result: redis::RedisResult<()> = match ttl {
            Some(ttl) => conn.set_ex(&prefixed_key, value, ttl.as_secs().max(1)).await,
            None => conn.set(&prefixed_key, value).await,
        };

        result.map_err(|e| store_error(&format!("Failed to set key '{}'", key), e))
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        let mut conn = self.connection.clone();

        let deleted: i64 = conn
            .del(self.config.prefix_key(key))
            .await
            .map_err(|e| store_error(&format!("Failed to delete key '{}'", key), e))?;

        Ok(deleted > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool, DomainError> {
        let mut conn = self.connection.clone();

        conn.exists(self.config.prefix_key(key))
            .await
            .map_err(|e| store_error(&format!("Failed to check key '{}'", key), e))
    }

    async fn clear(&self) -> Result<(), DomainError> {
        let keys = self.scan_prefixed().await?;

        if keys.is_empty() {
            return Ok(());
        }

        let mut conn = self.connection.clone();
        let _: i64 = conn
            .del(&keys)
            .await
            .map_err(|e| store_error("Failed to delete keys", e))?;

        Ok(())
    }

    async fn size(&self) -> Result<usize, DomainError> {
        Ok(self.scan_prefixed().await?.len())
    }

    fn backend_name(&self) -> &'static str {
        STORE
    }
}
