use serde::{Deserialize, Serialize};

/// Default completion length when the caller does not set one
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Default sampling temperature
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Uniform completion request handed to every provider adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub prompt: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Same request addressed to a different model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request = CompletionRequest::new("What is AI?", "gpt-3.5-turbo");

        assert_eq!(request.max_tokens, 1000);
        assert_eq!(request.temperature, 0.7);
    }

    #[test]
    fn test_request_builder() {
        let request = CompletionRequest::new("What is AI?", "gpt-3.5-turbo")
            .with_max_tokens(64)
            .with_temperature(0.0)
            .with_model("claude-3-haiku-20240307");

        assert_eq!(request.max_tokens, 64);
        assert_eq!(request.temperature, 0.0);
        assert_eq!(request.model, "claude-3-haiku-20240307");
    }
}
