//! LLM provider implementations

mod anthropic;
mod factory;
mod http_client;
mod openai;
mod registry;
mod resilient;

pub use anthropic::{AnthropicProvider, DEFAULT_ANTHROPIC_MODEL};
pub use factory::{
    LlmProviderConfig, LlmProviderFactory, ProviderSettings, ProvidersConfig, KNOWN_PROVIDERS,
};
pub use http_client::{HttpClient, HttpClientTrait, HttpError};
pub use openai::{OpenAiProvider, DEFAULT_OPENAI_MODEL};
pub use registry::{GatewayConfig, ProviderRegistry, SelectionStrategy};
pub use resilient::{ProviderStatus, ResilientProvider};

#[cfg(test)]
pub use http_client::mock::MockHttpClient;
