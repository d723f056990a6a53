use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::http_client::HttpClient;
use super::registry::{GatewayConfig, ProviderRegistry};
use super::resilient::ResilientProvider;
use super::{AnthropicProvider, OpenAiProvider};
use crate::domain::resilience::{ResilienceConfig, ResilienceOverrides};
use crate::domain::usage::UsageObserver;
use crate::domain::{DomainError, LlmProvider};

/// Names of the supported vendors, lowercase
pub const KNOWN_PROVIDERS: [&str; 2] = ["openai", "anthropic"];

/// Connection settings for one vendor adapter
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LlmProviderConfig {
    #[serde(rename = "openai")]
    OpenAi {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        default_model: Option<String>,
    },
    Anthropic {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        default_model: Option<String>,
    },
}

impl LlmProviderConfig {
    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenAi { .. } => "openai",
            Self::Anthropic { .. } => "anthropic",
        }
    }
}

/// Per-provider section of the application config
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub default_model: Option<String>,
    #[serde(default)]
    pub resilience: ResilienceOverrides,
}

fn default_enabled() -> bool {
    true
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            api_key: None,
            base_url: None,
            default_model: None,
            resilience: ResilienceOverrides::default(),
        }
    }
}

impl ProviderSettings {
    /// Configured key, or the value of `env_var` looked up through `env`
    pub fn resolve_api_key<F>(&self, env_var: &str, env: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| env(env_var).filter(|key| !key.trim().is_empty()))
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openai: ProviderSettings,
    #[serde(default)]
    pub anthropic: ProviderSettings,
}

impl ProvidersConfig {
    /// Enabled providers that have an API key, with their resilience overrides
    pub fn resolve<F>(&self, env: F) -> Vec<(LlmProviderConfig, ResilienceOverrides)>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut resolved = Vec::new();

        if self.openai.enabled {
            match self.openai.resolve_api_key("OPENAI_API_KEY", &env) {
                Some(api_key) => resolved.push((
                    LlmProviderConfig::OpenAi {
                        api_key,
                        base_url: self.openai.base_url.clone(),
                        default_model: self.openai.default_model.clone(),
                    },
                    self.openai.resilience.clone(),
                )),
                None => tracing::warn!(provider = "openai", "No API key configured, provider skipped"),
            }
        }

        if self.anthropic.enabled {
            match self.anthropic.resolve_api_key("ANTHROPIC_API_KEY", &env) {
                Some(api_key) => resolved.push((
                    LlmProviderConfig::Anthropic {
                        api_key,
                        base_url: self.anthropic.base_url.clone(),
                        default_model: self.anthropic.default_model.clone(),
                    },
                    self.anthropic.resilience.clone(),
                )),
                None => {
                    tracing::warn!(provider = "anthropic", "No API key configured, provider skipped")
                }
            }
        }

        resolved
    }
}

/// Factory for creating LLM providers
#[derive(Debug)]
pub struct LlmProviderFactory;

impl LlmProviderFactory {
    /// Create the vendor adapter for a provider configuration
    pub fn create(config: &LlmProviderConfig) -> Arc<dyn LlmProvider> {
        let http_client = HttpClient::new();

        match config {
            LlmProviderConfig::OpenAi {
                api_key,
                base_url,
                default_model,
            } => {
                let mut provider = match base_url {
                    Some(url) => OpenAiProvider::with_base_url(http_client, api_key, url),
                    None => OpenAiProvider::new(http_client, api_key),
                };
                if let Some(model) = default_model {
                    provider = provider.with_default_model(model);
                }
                Arc::new(provider)
            }

            LlmProviderConfig::Anthropic {
                api_key,
                base_url,
                default_model,
            } => {
                let mut provider = match base_url {
                    Some(url) => AnthropicProvider::with_base_url(http_client, api_key, url),
                    None => AnthropicProvider::new(http_client, api_key),
                };
                if let Some(model) = default_model {
                    provider = provider.with_default_model(model);
                }
                Arc::new(provider)
            }
        }
    }

    /// Build the registry: one resilience-wrapped adapter per configured provider
    pub fn build_registry(
        gateway: &GatewayConfig,
        providers: &ProvidersConfig,
        resilience: &ResilienceConfig,
        observer: Arc<dyn UsageObserver>,
    ) -> Result<ProviderRegistry, DomainError> {
        let mut registry = ProviderRegistry::new(gateway);

        for (config, overrides) in providers.resolve(|var| std::env::var(var).ok()) {
            let merged = resilience.merged(&overrides);
            merged.validate().map_err(|e| {
                DomainError::configuration(format!("providers.{}.resilience: {}", config.name(), e))
            })?;

            let wrapper = ResilientProvider::new(Self::create(&config), &merged)
                .with_observer(observer.clone());

            tracing::info!(
                provider = config.name(),
                rpm = merged.rate_limit_rpm,
                max_attempts = merged.max_attempts,
                "Registered LLM provider"
            );
            registry.register(Arc::new(wrapper));
        }

        if registry.is_empty() {
            tracing::warn!("No LLM providers registered; cache misses will fail");
        }

        Ok(registry)
    }
}
