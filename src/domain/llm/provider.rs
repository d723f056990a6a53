use async_trait::async_trait;
use std::fmt::Debug;

use super::{Completion, CompletionRequest};
use crate::domain::DomainError;

/// Trait for LLM providers (OpenAI, Anthropic)
///
/// Implementations translate vendor failures into the retryable
/// (`ProviderUnavailable`, `ProviderTimeout`) or non-retryable (`Provider`)
/// variants of [`DomainError`].
#[async_trait]
pub trait LlmProvider: Send + Sync + Debug {
    /// Run a single completion call
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, DomainError>;

    /// Get the provider name
    fn provider_name(&self) -> &'static str;

    /// Model used when a request does not name one
    fn default_model(&self) -> &str;

    /// List well-known models for this provider
    fn available_models(&self) -> Vec<&'static str>;
}
