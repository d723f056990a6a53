use serde::Deserialize;

use crate::domain::semantic_cache::{validate_similarity_threshold, SemanticCacheConfig};
use crate::domain::{DomainError, ResilienceConfig};
use crate::infrastructure::cache::CacheConfig;
use crate::infrastructure::embedding::{EmbeddingBackend, EmbeddingConfig, DEFAULT_EMBEDDING_MODEL};
use crate::infrastructure::llm::{GatewayConfig, ProvidersConfig, KNOWN_PROVIDERS};
use crate::infrastructure::observability::ObservabilityConfig;
use crate::infrastructure::services::QueryServiceConfig;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub semantic: SemanticCacheConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub resilience: ResilienceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

/// Largest vector each OpenAI embedding model can return
fn max_embedding_dimensions(model: &str) -> Option<usize> {
    match model {
        "text-embedding-3-small" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        "text-embedding-ada-002" => Some(1536),
        _ => None,
    }
}

impl AppConfig {
    /// Load `.env`, then layer config files and `APP__` environment variables
    pub fn load() -> Result<Self, config::ConfigError> {
        let _ = dotenvy::dotenv();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Fail fast on settings the gateway cannot run with
    pub fn validate(&self) -> Result<(), DomainError> {
        self.cache.validate()?;
        self.semantic.validate()?;
        self.observability.validate()?;
        self.resilience
            .validate()
            .map_err(|e| DomainError::configuration(format!("resilience: {}", e)))?;
        self.check_cache_timeout_below_llm_timeouts()?;

        for name in &self.gateway.fallback_providers {
            let normalized = name.trim().to_lowercase();
            if !KNOWN_PROVIDERS.contains(&normalized.as_str()) {
                return Err(DomainError::configuration(format!(
                    "gateway.fallback_providers: unknown provider '{}' (known: {})",
                    name,
                    KNOWN_PROVIDERS.join(", ")
                )));
            }
        }

        if self.semantic.enabled && self.embedding.provider == EmbeddingBackend::OpenAi {
            let model = self
                .embedding
                .model
                .as_deref()
                .unwrap_or(DEFAULT_EMBEDDING_MODEL);

            if let Some(max) = max_embedding_dimensions(model) {
                let fixed = model == "text-embedding-ada-002";
                if self.semantic.dimensions > max || (fixed && self.semantic.dimensions != max) {
                    return Err(DomainError::configuration(format!(
                        "semantic.dimensions ({}) does not match embedding model {} (max {})",
                        self.semantic.dimensions, model, max
                    )));
                }
            }
        }

        Ok(())
    }

    /// Cache reads and writes must give up before any provider call would
    fn check_cache_timeout_below_llm_timeouts(&self) -> Result<(), DomainError> {
        let cache_ms = self.cache.operation_timeout_ms;
        let llm_timeouts = [
            ("resilience", Some(self.resilience.timeout_ms)),
            (
                "providers.openai.resilience",
                self.providers.openai.resilience.timeout_ms,
            ),
            (
                "providers.anthropic.resilience",
                self.providers.anthropic.resilience.timeout_ms,
            ),
        ];

        for (section, timeout_ms) in llm_timeouts {
            let Some(llm_ms) = timeout_ms else {
                continue;
            };
            if cache_ms >= llm_ms {
                return Err(DomainError::configuration(format!(
                    "cache.operation_timeout_ms ({}) must be shorter than {}.timeout_ms ({})",
                    cache_ms, section, llm_ms
                )));
            }
        }

        Ok(())
    }

    pub fn query_service_config(&self) -> Result<QueryServiceConfig, DomainError> {
        let similarity_threshold = validate_similarity_threshold(self.semantic.similarity_threshold)
            .map_err(|e| DomainError::configuration(format!("semantic.{}", e)))?;

        Ok(QueryServiceConfig {
            ttl_secs: self.cache.ttl_secs,
            operation_timeout: self.cache.operation_timeout(),
            write_enabled: self.cache.write_enabled,
            semantic_enabled: self.semantic.enabled,
            similarity_threshold,
            search_limit: self.semantic.search_limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_sections_deserialize_with_partial_input() {
        let config: AppConfig = serde_json::from_str(
            r#"{
                "server": {"host": "127.0.0.1", "port": 9000},
                "logging": {"level": "debug", "format": "json"},
                "semantic": {"similarity_threshold": 0.9},
                "gateway": {"fallback_providers": ["anthropic"]}
            }"#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!((config.semantic.similarity_threshold - 0.9).abs() < f32::EPSILON);
        assert_eq!(config.gateway.fallback_providers, vec!["anthropic"]);
        assert_eq!(config.cache.ttl_secs, 3600);
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let mut config = AppConfig::default();
        config.semantic.similarity_threshold = 1.5;

        assert!(matches!(
            config.validate(),
            Err(DomainError::Configuration { .. })
        ));
        assert!(config.query_service_config().is_err());
    }

    #[test]
    fn test_unknown_fallback_rejected() {
        let mut config = AppConfig::default();
        config.gateway.fallback_providers = vec!["Anthropic".into(), "cohere".into()];

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cohere"));
    }

    #[test]
    fn test_zero_rpm_rejected() {
        let mut config = AppConfig::default();
        config.resilience.rate_limit_rpm = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cache_timeout_must_undercut_llm_timeouts() {
        let mut config = AppConfig::default();
        config.cache.operation_timeout_ms = 60_000;
        config.resilience.timeout_ms = 30_000;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cache.operation_timeout_ms (60000)"));

        config.cache.operation_timeout_ms = 30_000;
        assert!(config.validate().is_err());

        config.cache.operation_timeout_ms = 500;
        assert!(config.validate().is_ok());

        config.providers.anthropic.resilience.timeout_ms = Some(400);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("providers.anthropic.resilience"));

        config.providers.anthropic.resilience.timeout_ms = Some(10_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let mut config = AppConfig::default();
        config.semantic.dimensions = 4096;
        assert!(config.validate().is_err());

        config.embedding.provider = EmbeddingBackend::Hash;
        assert!(config.validate().is_ok());

        config.embedding.provider = EmbeddingBackend::OpenAi;
        config.embedding.model = Some("text-embedding-ada-002".into());
        config.semantic.dimensions = 384;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_query_service_config_mirrors_sections() {
        let mut config = AppConfig::default();
        config.cache.ttl_secs = 60;
        config.cache.write_enabled = false;
        config.semantic.enabled = false;

        let service = config.query_service_config().unwrap();
        assert_eq!(service.ttl_secs, 60);
        assert!(!service.write_enabled);
        assert!(!service.semantic_enabled);
        assert_eq!(service.search_limit, 5);
    }
}
