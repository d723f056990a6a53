//! Observer hook for provider call outcomes

use std::time::Duration;

#[cfg(test)]
use mockall::automock;

use super::TokenCount;

/// Outcome of one resilient provider invocation, successful or not
#[derive(Debug, Clone)]
pub struct CallOutcome {
    pub provider: String,
    pub model: String,
    pub success: bool,
    /// Error kind label when the call failed
    pub error_kind: Option<&'static str>,
    /// Token counts, when the provider produced any
    pub tokens: Option<TokenCount>,
    pub latency: Duration,
    pub attempts: u32,
}

impl CallOutcome {
    pub fn succeeded(
        provider: impl Into<String>,
        model: impl Into<String>,
        tokens: TokenCount,
        latency: Duration,
        attempts: u32,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            success: true,
            error_kind: None,
            tokens: Some(tokens),
            latency,
            attempts,
        }
    }

    pub fn failed(
        provider: impl Into<String>,
        model: impl Into<String>,
        error_kind: &'static str,
        latency: Duration,
        attempts: u32,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            success: false,
            error_kind: Some(error_kind),
            tokens: None,
            latency,
            attempts,
        }
    }
}

/// Receives every provider call outcome; kept off the request's control flow
#[cfg_attr(test, automock)]
pub trait UsageObserver: Send + Sync {
    fn record(&self, outcome: &CallOutcome);
}
