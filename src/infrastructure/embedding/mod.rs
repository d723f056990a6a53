//! Embedding provider implementations

mod cached;
mod hash;
mod openai;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub use cached::{CachedEmbeddingProvider, EmbeddingCacheStats};
pub use hash::HashEmbeddingProvider;
pub use openai::{OpenAiEmbeddingProvider, DEFAULT_EMBEDDING_MODEL};

pub use super::llm::{HttpClient, HttpClientTrait};
use crate::domain::{DomainError, EmbeddingProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    Hash,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingBackend,
    /// Falls back to `OPENAI_API_KEY`
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// Vectors kept in the embedding cache; 0 disables it
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

fn default_cache_capacity() -> u64 {
    1_000
}

fn default_cache_ttl_secs() -> u64 {
    86_400
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingBackend::default(),
            api_key: None,
            base_url: None,
            model: None,
            cache_capacity: default_cache_capacity(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

fn with_cache(
    config: &EmbeddingConfig,
    provider: Arc<dyn EmbeddingProvider>,
) -> Arc<dyn EmbeddingProvider> {
    if config.cache_capacity == 0 {
        return provider;
    }

    let ttl = (config.cache_ttl_secs > 0).then(|| Duration::from_secs(config.cache_ttl_secs));
    Arc::new(CachedEmbeddingProvider::new(provider, config.cache_capacity, ttl))
}

/// Build the embedder producing vectors of `dimensions` length, wrapped in
/// the embedding cache unless `cache_capacity` is 0
pub fn create_embedding_provider<F>(
    config: &EmbeddingConfig,
    dimensions: usize,
    env: F,
) -> Result<Arc<dyn EmbeddingProvider>, DomainError>
where
    F: Fn(&str) -> Option<String>,
{
    let provider: Arc<dyn EmbeddingProvider> = match config.provider {
        EmbeddingBackend::Hash => Arc::new(HashEmbeddingProvider::new(dimensions)),
        EmbeddingBackend::OpenAi => {
            let api_key = config
                .api_key
                .clone()
                .filter(|k| !k.trim().is_empty())
                .or_else(|| env("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()))
                .ok_or_else(|| {
                    DomainError::configuration(
                        "embedding.api_key (or OPENAI_API_KEY) is required for the openai embedder",
                    )
                })?;

            let mut provider = OpenAiEmbeddingProvider::new(HttpClient::new(), api_key, dimensions);
            if let Some(ref url) = config.base_url {
                provider = provider.with_base_url(url);
            }
            if let Some(ref model) = config.model {
                provider = provider.with_model(model);
            }

            Arc::new(provider)
        }
    };

    Ok(with_cache(config, provider))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::embedding::MockEmbeddingProvider;

    #[test]
    fn test_hash_backend_needs_no_key() {
        let config = EmbeddingConfig {
            provider: EmbeddingBackend::Hash,
            ..Default::default()
        };

        let provider = create_embedding_provider(&config, 32, |_| None).unwrap();
        assert_eq!(provider.provider_name(), "hash");
        assert_eq!(provider.dimensions(), 32);
    }

    #[test]
    fn test_openai_backend_requires_key() {
        let err = create_embedding_provider(&EmbeddingConfig::default(), 384, |_| None).unwrap_err();
        assert!(matches!(err, DomainError::Configuration { .. }));
    }

    #[test]
    fn test_openai_backend_env_key() {
        let provider = create_embedding_provider(&EmbeddingConfig::default(), 384, |var| {
            (var == "OPENAI_API_KEY").then(|| "sk-test".to_string())
        })
        .unwrap();

        assert_eq!(provider.provider_name(), "openai");
        assert_eq!(provider.dimensions(), 384);
    }

    #[test]
    fn test_backend_deserialize() {
        let config: EmbeddingConfig = serde_json::from_str(r#"{"provider": "hash"}"#).unwrap();
        assert_eq!(config.provider, EmbeddingBackend::Hash);
        assert_eq!(config.cache_capacity, 1_000);
        assert_eq!(config.cache_ttl_secs, 86_400);
    }

    #[tokio::test]
    async fn test_zero_capacity_skips_cache() {
        let mock = Arc::new(MockEmbeddingProvider::new(2));
        let config = EmbeddingConfig {
            cache_capacity: 0,
            ..Default::default()
        };

        let provider = with_cache(&config, mock.clone());
        provider.embed("a").await.unwrap();
        provider.embed("a").await.unwrap();
        assert_eq!(mock.call_count(), 2);

        let provider = with_cache(&EmbeddingConfig::default(), mock.clone());
        provider.embed("a").await.unwrap();
        provider.embed("a").await.unwrap();
        assert_eq!(mock.call_count(), 3);
    }
}
