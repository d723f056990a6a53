use std::time::Duration;

use thiserror::Error;

/// Core domain errors
///
/// `Clone` so that a coalesced leader's failure can be handed to every follower.
#[derive(Debug, Clone, Error)]
pub enum DomainError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Cache unavailable: {store} - {message}")]
    CacheUnavailable { store: String, message: String },

    #[error("Embedding failure: {message}")]
    EmbeddingFailure { message: String },

    #[error("Rate limited: {provider} - retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    #[error("Circuit open: {provider}")]
    CircuitOpen { provider: String },

    #[error("Provider timeout: {provider} after {timeout_ms}ms")]
    ProviderTimeout { provider: String, timeout_ms: u64 },

    /// Transient vendor failure (429, 5xx, connection reset); safe to retry
    #[error("Provider unavailable: {provider} - {message}")]
    ProviderUnavailable { provider: String, message: String },

    /// Non-retryable vendor failure (bad request, authentication)
    #[error("Provider error: {provider} - {message}")]
    Provider { provider: String, message: String },

    #[error("Max retries exceeded: {provider} after {attempts} attempts: {source}")]
    MaxRetriesExceeded {
        provider: String,
        attempts: u32,
        #[source]
        source: Box<DomainError>,
    },

    #[error("Provider not found: {name}")]
    ProviderNotFound { name: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn cache_unavailable(store: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CacheUnavailable {
            store: store.into(),
            message: message.into(),
        }
    }

    pub fn embedding(message: impl Into<String>) -> Self {
        Self::EmbeddingFailure {
            message: message.into(),
        }
    }

    pub fn rate_limited(provider: impl Into<String>, retry_after: Duration) -> Self {
        Self::RateLimited {
            provider: provider.into(),
            retry_after_ms: retry_after.as_millis() as u64,
        }
    }

    pub fn circuit_open(provider: impl Into<String>) -> Self {
        Self::CircuitOpen {
            provider: provider.into(),
        }
    }

    pub fn provider_timeout(provider: impl Into<String>, timeout: Duration) -> Self {
        Self::ProviderTimeout {
            provider: provider.into(),
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    pub fn provider_unavailable(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn max_retries_exceeded(
        provider: impl Into<String>,
        attempts: u32,
        last_error: DomainError,
    ) -> Self {
        Self::MaxRetriesExceeded {
            provider: provider.into(),
            attempts,
            source: Box::new(last_error),
        }
    }

    pub fn provider_not_found(name: impl Into<String>) -> Self {
        Self::ProviderNotFound { name: name.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Transient failures worth another attempt against the same provider
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProviderTimeout { .. } | Self::ProviderUnavailable { .. }
        )
    }

    /// Failures that move the invocation on to the next provider in the fallback chain.
    /// A bare transient error only reaches the chain when retries are disabled.
    pub fn triggers_fallback(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. } | Self::MaxRetriesExceeded { .. })
            || self.is_retryable()
    }

    /// Errors caused by the caller rather than by a dependency
    pub fn is_caller_fault(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::ProviderNotFound { .. })
    }

    /// Short stable label, used for metric labels and structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::Configuration { .. } => "configuration",
            Self::CacheUnavailable { .. } => "cache_unavailable",
            Self::EmbeddingFailure { .. } => "embedding_failure",
            Self::RateLimited { .. } => "rate_limited",
            Self::CircuitOpen { .. } => "circuit_open",
            Self::ProviderTimeout { .. } => "provider_timeout",
            Self::ProviderUnavailable { .. } => "provider_unavailable",
            Self::Provider { .. } => "provider_error",
            Self::MaxRetriesExceeded { .. } => "max_retries_exceeded",
            Self::ProviderNotFound { .. } => "provider_not_found",
            Self::Internal { .. } => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error() {
        let error = DomainError::validation("Query must not be empty");
        assert_eq!(error.to_string(), "Validation error: Query must not be empty");
        assert!(error.is_caller_fault());
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_provider_not_found_error() {
        let error = DomainError::provider_not_found("mistral");
        assert_eq!(error.to_string(), "Provider not found: mistral");
        assert!(error.is_caller_fault());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(DomainError::provider_timeout("openai", Duration::from_secs(30)).is_retryable());
        assert!(DomainError::provider_unavailable("openai", "HTTP 503").is_retryable());
        assert!(!DomainError::provider("openai", "HTTP 401").is_retryable());
        assert!(!DomainError::rate_limited("openai", Duration::from_secs(1)).is_retryable());
        assert!(!DomainError::circuit_open("openai").is_retryable());
    }

    #[test]
    fn test_max_retries_wraps_last_error() {
        let last = DomainError::provider_unavailable("anthropic", "HTTP 529: overloaded");
        let error = DomainError::max_retries_exceeded("anthropic", 3, last);

        assert_eq!(
            error.to_string(),
            "Max retries exceeded: anthropic after 3 attempts: Provider unavailable: anthropic - HTTP 529: overloaded"
        );
        assert!(error.triggers_fallback());

        let source = std::error::Error::source(&error).map(|s| s.to_string());
        assert_eq!(
            source.as_deref(),
            Some("Provider unavailable: anthropic - HTTP 529: overloaded")
        );
    }

    #[test]
    fn test_fallback_classification() {
        assert!(DomainError::circuit_open("openai").triggers_fallback());
        assert!(DomainError::provider_timeout("openai", Duration::from_secs(30)).triggers_fallback());
        assert!(DomainError::provider_unavailable("openai", "HTTP 503").triggers_fallback());
        assert!(!DomainError::provider("openai", "HTTP 401").triggers_fallback());
        assert!(!DomainError::rate_limited("openai", Duration::from_secs(1)).triggers_fallback());
        assert!(!DomainError::provider_not_found("mistral").triggers_fallback());
    }

    #[test]
    fn test_rate_limited_reports_retry_after() {
        let error = DomainError::rate_limited("openai", Duration::from_millis(1500));
        assert_eq!(error.to_string(), "Rate limited: openai - retry after 1500ms");
        assert_eq!(error.kind(), "rate_limited");
    }
}
