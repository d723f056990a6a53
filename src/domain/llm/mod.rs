//! LLM provider domain models and traits

pub mod context_window;
mod provider;
mod request;
mod response;

pub use provider::LlmProvider;
pub use request::{CompletionRequest, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
pub use response::{Completion, FinishReason, ProviderCallResult, Usage};

#[cfg(test)]
pub use provider::mock::MockLlmProvider;
