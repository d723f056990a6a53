use async_trait::async_trait;
use serde::Deserialize;

use super::http_client::{HttpClientTrait, HttpError};
use crate::domain::{Completion, CompletionRequest, DomainError, FinishReason, LlmProvider, Usage};

const PROVIDER: &str = "anthropic";
const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-haiku-20240307";

/// Anthropic messages API adapter
#[derive(Debug)]
pub struct AnthropicProvider<C: HttpClientTrait> {
    client: C,
    api_key: String,
    base_url: String,
    default_model: String,
}

impl<C: HttpClientTrait> AnthropicProvider<C> {
    pub fn new(client: C, api_key: impl Into<String>) -> Self {
        Self::with_base_url(client, api_key, DEFAULT_ANTHROPIC_BASE_URL)
    }

    pub fn with_base_url(
        client: C,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Self {
            client,
            api_key: api_key.into(),
            base_url,
            default_model: DEFAULT_ANTHROPIC_MODEL.to_string(),
        }
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }

    fn build_request(&self, request: &CompletionRequest) -> serde_json::Value {
        serde_json::json!({
            "model": request.model,
            "messages": [{ "role": "user", "content": request.prompt }],
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        })
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("x-api-key", self.api_key.as_str()),
            ("anthropic-version", ANTHROPIC_VERSION),
            ("Content-Type", "application/json"),
        ]
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<Completion, DomainError> {
        let response: AnthropicResponse = serde_json::from_value(json).map_err(|e| {
            DomainError::provider(PROVIDER, format!("Failed to parse response: {}", e))
        })?;

        let text = response
            .content
            .into_iter()
            .filter_map(|block| {
                if block.content_type == "text" {
                    block.text
                } else {
                    None
                }
            })
            .collect::<Vec<_>>()
            .join("");

        let mut completion = Completion::new(text, response.model)
            .with_finish_reason(parse_stop_reason(response.stop_reason.as_deref()));

        if let Some(usage) = response.usage {
            completion = completion.with_usage(Usage::new(usage.input_tokens, usage.output_tokens));
        }

        Ok(completion)
    }
}

#[async_trait]
impl<C: HttpClientTrait> LlmProvider for AnthropicProvider<C> {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, DomainError> {
        let url = self.messages_url();
        let body = self.build_request(request);
        let response = self
            .client
            .post_json(&url, self.headers(), &body)
            .await
            .map_err(translate_error)?;

        self.parse_response(response)
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn available_models(&self) -> Vec<&'static str> {
        vec![
            "claude-3-5-sonnet-20241022",
            "claude-3-opus-20240229",
            "claude-3-haiku-20240307",
        ]
    }
}

/// 429, 529 (overloaded), other 5xx and transport failures are retryable
fn translate_error(error: HttpError) -> DomainError {
    match error {
        HttpError::Status { status: 529, body } => DomainError::provider_unavailable(
            PROVIDER,
            format!("Overloaded: {}", error_message(&body)),
        ),
        HttpError::Status { status, body } => {
            let message = format!("HTTP {}: {}", status, error_message(&body));
            match status {
                429 | 500..=599 => DomainError::provider_unavailable(PROVIDER, message),
                _ => DomainError::provider(PROVIDER, message),
            }
        }
        HttpError::Timeout | HttpError::Transport(_) => {
            DomainError::provider_unavailable(PROVIDER, error.to_string())
        }
        HttpError::Decode(_) => DomainError::provider(PROVIDER, error.to_string()),
    }
}

/// `{"type": "error", "error": {"message": ...}}` when present, raw body otherwise
fn error_message(body: &str) -> String {
    serde_json::from_str::<AnthropicErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.to_string())
}

fn parse_stop_reason(reason: Option<&str>) -> FinishReason {
    match reason {
        Some("end_turn") | Some("stop_sequence") => FinishReason::Stop,
        Some("max_tokens") => FinishReason::Length,
        _ => FinishReason::Other,
    }
}

// Anthropic API types

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    model: String,
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    error: AnthropicErrorDetail,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorDetail {
    message: String,
}
