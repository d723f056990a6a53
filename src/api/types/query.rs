//! Query endpoint payloads

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::infrastructure::services::{QueryOptions, QueryOutcome};

fn default_use_cache() -> bool {
    true
}

/// Body of `POST /v1/query`
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default = "default_use_cache")]
    pub use_cache: bool,
    #[serde(default)]
    pub similarity_threshold: Option<f32>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl QueryRequest {
    pub fn options(&self) -> QueryOptions {
        QueryOptions {
            use_cache: self.use_cache,
            similarity_threshold: self.similarity_threshold,
            provider: self.provider.clone(),
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub request_id: Uuid,
    #[serde(flatten)]
    pub outcome: QueryOutcome,
}

impl QueryResponse {
    pub fn new(request_id: Uuid, outcome: QueryOutcome) -> Self {
        Self {
            request_id,
            outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::services::CacheType;

    #[test]
    fn test_request_defaults() {
        let request: QueryRequest = serde_json::from_str(r#"{"query": "What is AI?"}"#).unwrap();
        let options = request.options();

        assert!(options.use_cache);
        assert!(options.provider.is_none());
        assert!(options.max_tokens.is_none());
    }

    #[test]
    fn test_request_overrides() {
        let request: QueryRequest = serde_json::from_str(
            r#"{"query": "q", "use_cache": false, "provider": "anthropic",
                "similarity_threshold": 0.9, "max_tokens": 50, "temperature": 0.0}"#,
        )
        .unwrap();
        let options = request.options();

        assert!(!options.use_cache);
        assert_eq!(options.provider.as_deref(), Some("anthropic"));
        assert_eq!(options.max_tokens, Some(50));
        assert_eq!(options.temperature, Some(0.0));
    }

    #[test]
    fn test_response_is_flat() {
        let response = QueryResponse::new(
            Uuid::nil(),
            QueryOutcome {
                response: "AI is...".into(),
                cache_hit: true,
                cache_type: CacheType::Semantic,
                provider_id: "openai".into(),
                model_id: "gpt-3.5-turbo".into(),
                tokens_used: 0,
                tokens_approximate: false,
                similarity_score: Some(0.9),
                cost_usd: 0.0,
                latency_ms: 3,
            },
        );

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["request_id"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(json["cache_type"], "semantic");
        assert_eq!(json["cache_hit"], true);
        assert!(json.get("outcome").is_none());
    }
}
