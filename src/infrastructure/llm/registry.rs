//! Provider registry: name resolution, selection and fallback

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::resilient::{ProviderStatus, ResilientProvider};
use crate::domain::{CompletionRequest, DomainError, ProviderCallResult};

/// How a provider is chosen when the request names none
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// Always the configured default provider
    #[default]
    Preferred,
    /// Rotate across registered providers
    RoundRobin,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    #[serde(default = "default_provider")]
    pub default_provider: String,
    #[serde(default)]
    pub selection_strategy: SelectionStrategy,
    #[serde(default = "default_fallback_enabled")]
    pub fallback_enabled: bool,
    /// Ordered fallback chain, tried after the primary
    #[serde(default)]
    pub fallback_providers: Vec<String>,
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_fallback_enabled() -> bool {
    true
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            selection_strategy: SelectionStrategy::default(),
            fallback_enabled: default_fallback_enabled(),
            fallback_providers: Vec::new(),
        }
    }
}

/// Holds exactly one resilient wrapper per provider for the process lifetime
#[derive(Debug)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<ResilientProvider>>,
    default_provider: String,
    strategy: SelectionStrategy,
    fallback_enabled: bool,
    fallback_chain: Vec<String>,
    cursor: AtomicUsize,
}

impl ProviderRegistry {
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: config.default_provider.to_lowercase(),
            strategy: config.selection_strategy,
            fallback_enabled: config.fallback_enabled,
            fallback_chain: config
                .fallback_providers
                .iter()
                .map(|name| name.to_lowercase())
                .collect(),
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn register(&mut self, provider: Arc<ResilientProvider>) {
        self.providers.insert(provider.name().to_lowercase(), provider);
    }

    pub fn with_provider(mut self, provider: Arc<ResilientProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Case-insensitive lookup; unknown names fail with `ProviderNotFound`
    pub fn resolve(&self, name: &str) -> Result<Arc<ResilientProvider>, DomainError> {
        self.providers
            .get(&name.trim().to_lowercase())
            .cloned()
            .ok_or_else(|| DomainError::provider_not_found(name))
    }

    /// The named provider, or one chosen by the selection strategy
    pub fn select(&self, requested: Option<&str>) -> Result<Arc<ResilientProvider>, DomainError> {
        if let Some(name) = requested {
            return self.resolve(name);
        }

        match self.strategy {
            SelectionStrategy::Preferred => self.resolve(&self.default_provider),
            SelectionStrategy::RoundRobin => {
                let names = self.available_providers();

                if names.is_empty() {
                    return Err(DomainError::provider_not_found(&self.default_provider));
                }

                let index = self.cursor.fetch_add(1, Ordering::Relaxed) % names.len();
                self.resolve(&names[index])
            }
        }
    }

    /// Invoke `primary`, walking the fallback chain when it fails with
    /// `CircuitOpen`, `MaxRetriesExceeded`, or a transient error under a
    /// single-attempt policy. Fallback providers use their own default model.
    /// Exhausting the chain surfaces the last error.
    pub async fn invoke_with_fallback(
        &self,
        primary: &ResilientProvider,
        request: &CompletionRequest,
    ) -> Result<ProviderCallResult, DomainError> {
        let error = match primary.invoke(request).await {
            Ok(result) => return Ok(result),
            Err(e) if self.fallback_enabled && e.triggers_fallback() => e,
            Err(e) => return Err(e),
        };

        let mut last_error = error;

        for name in &self.fallback_chain {
            if name == primary.name() {
                continue;
            }

            let Some(fallback) = self.providers.get(name) else {
                tracing::debug!(provider = %name, "Fallback provider not registered, skipping");
                continue;
            };

            let fallback_request = request.clone().with_model(fallback.default_model());

            tracing::warn!(
                primary = %primary.name(),
                fallback = %name,
                error = %last_error,
                "Primary provider failed, trying fallback"
            );

            match fallback.invoke(&fallback_request).await {
                Ok(result) => return Ok(result),
                Err(e) => last_error = e,
            }
        }

        Err(last_error)
    }

    /// Registered provider names, sorted
    pub fn available_providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn statuses(&self) -> Vec<ProviderStatus> {
        let mut statuses = Vec::with_capacity(self.providers.len());

        for name in self.available_providers() {
            if let Some(provider) = self.providers.get(&name) {
                statuses.push(provider.status().await);
            }
        }

        statuses
    }

    /// Admin reset of a provider's circuit breaker
    pub fn reset(&self, name: &str) -> Result<(), DomainError> {
        let provider = self.resolve(name)?;
        provider.reset();
        tracing::info!(provider = %provider.name(), "Circuit breaker reset");
        Ok(())
    }
}
