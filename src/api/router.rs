use axum::{
    middleware,
    routing::get,
    Router,
};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use super::health;
use super::middleware::{logging_middleware, metrics_middleware};
use super::state::AppState;
use super::v1;
use crate::infrastructure::observability::{create_metrics_router, PrometheusMetrics};

/// Full gateway router; the Prometheus route is merged when `metrics` is set
pub fn create_router(
    state: AppState,
    metrics: Option<PrometheusMetrics>,
    metrics_path: &str,
) -> Router {
    let router = Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        .route("/live", get(health::live_check))
        .nest("/v1", v1::create_v1_router())
        .with_state(state)
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

    match metrics {
        Some(m) => router.merge(create_metrics_router(m, metrics_path)),
        None => router,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::domain::llm::MockLlmProvider;
    use crate::domain::resilience::{ResilienceConfig, RetryPolicy};
    use crate::domain::DomainError;
    use crate::infrastructure::cache::InMemoryCache;
    use crate::infrastructure::llm::{GatewayConfig, ProviderRegistry, ResilientProvider};
    use crate::infrastructure::services::{QueryService, QueryServiceConfig};
    use crate::infrastructure::usage::CostAccountant;

    fn app_with(providers: Vec<MockLlmProvider>) -> Router {
        app_with_timeout(providers, ResilienceConfig::default().timeout())
    }

    fn app_with_timeout(providers: Vec<MockLlmProvider>, timeout: Duration) -> Router {
        let accountant = Arc::new(CostAccountant::default());
        let mut registry = ProviderRegistry::new(&GatewayConfig::default());
        for provider in providers {
            let wrapper = ResilientProvider::new(Arc::new(provider), &ResilienceConfig::default())
                .with_retry_policy(RetryPolicy::new(1).with_initial_delay(Duration::from_millis(1)))
                .with_timeout(timeout)
                .with_observer(accountant.clone());
            registry.register(Arc::new(wrapper));
        }

        let service = QueryService::new(
            Arc::new(InMemoryCache::new()),
            Arc::new(registry),
            QueryServiceConfig {
                semantic_enabled: false,
                ..Default::default()
            },
        );

        create_router(AppState::new(service, accountant), None, "/metrics")
    }

    fn app() -> Router {
        app_with(vec![MockLlmProvider::new("openai").with_response("AI is...")])
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let app = app();

        let (status, body) = send(&app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");

        let (status, _) = send(&app, get("/live")).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, get("/ready")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_ready_without_providers_is_unavailable() {
        let app = app_with(Vec::new());

        let (status, body) = send(&app, get("/ready")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "unhealthy");
    }

    #[tokio::test]
    async fn test_query_miss_then_exact_hit() {
        let app = app();

        let (status, first) =
            send(&app, post_json("/v1/query", json!({"query": "What is AI?"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["cache_hit"], false);
        assert_eq!(first["cache_type"], "none");
        assert_eq!(first["response"], "AI is...");
        assert_eq!(first["provider_id"], "openai");
        assert!(first["request_id"].as_str().unwrap().len() == 36);

        let (_, second) =
            send(&app, post_json("/v1/query", json!({"query": "What is AI?"}))).await;
        assert_eq!(second["cache_hit"], true);
        assert_eq!(second["cache_type"], "exact");
        assert_eq!(second["cost_usd"], 0.0);
        assert_ne!(first["request_id"], second["request_id"]);
    }

    #[tokio::test]
    async fn test_request_id_header_matches_body() {
        let app = app();
        let mut request = post_json("/v1/query", json!({"query": "What is AI?"}));
        request.headers_mut().insert(
            "x-request-id",
            "6f1c2a3e-0000-4000-8000-000000000001".parse().unwrap(),
        );

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(
            response.headers()["x-request-id"],
            "6f1c2a3e-0000-4000-8000-000000000001"
        );

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["request_id"], "6f1c2a3e-0000-4000-8000-000000000001");
    }

    #[tokio::test]
    async fn test_empty_query_is_bad_request() {
        let app = app();

        let (status, body) = send(&app, post_json("/v1/query", json!({"query": "   "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["type"], "invalid_request_error");
        assert_eq!(body["error"]["code"], "validation");
    }

    #[tokio::test]
    async fn test_out_of_range_parameters_rejected() {
        let app = app();

        let (status, _) = send(
            &app,
            post_json("/v1/query", json!({"query": "q", "max_tokens": 5000})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            post_json("/v1/query", json!({"query": "q", "similarity_threshold": 1.5})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_provider_is_not_found() {
        let app = app();

        let (status, body) = send(
            &app,
            post_json("/v1/query", json!({"query": "q", "provider": "cohere"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "provider_not_found");
    }

    #[tokio::test]
    async fn test_provider_error_is_bad_gateway() {
        let app = app_with(vec![
            MockLlmProvider::new("openai").with_error(DomainError::provider("openai", "HTTP 400")),
        ]);

        let (status, body) = send(&app, post_json("/v1/query", json!({"query": "q"}))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["type"], "upstream_error");
    }

    #[tokio::test]
    async fn test_provider_timeout_is_gateway_timeout() {
        let app = app_with_timeout(
            vec![MockLlmProvider::new("openai")
                .with_response("too late")
                .with_delay(Duration::from_millis(300))],
            Duration::from_millis(20),
        );

        let (status, body) = send(&app, post_json("/v1/query", json!({"query": "q"}))).await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body["error"]["type"], "timeout_error");
        assert_eq!(body["error"]["code"], "provider_timeout");
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let app = app();
        let request = Request::builder()
            .method("POST")
            .uri("/v1/query")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "json_parse_error");
    }

    #[tokio::test]
    async fn test_providers_listing_and_reset() {
        let app = app_with(vec![
            MockLlmProvider::new("openai").with_response("a"),
            MockLlmProvider::new("anthropic").with_response("b"),
        ]);

        send(&app, post_json("/v1/query", json!({"query": "q"}))).await;

        let (status, body) = send(&app, get("/v1/providers")).await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = body["providers"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["anthropic", "openai"]);
        assert_eq!(body["usage"]["requests"], 1);

        let (status, body) = send(&app, post_json("/v1/providers/OpenAI/reset", json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["provider"], "openai");
        assert_eq!(body["status"]["circuit"]["state"], "closed");

        let (status, _) = send(&app, post_json("/v1/providers/cohere/reset", json!({}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cache_stats() {
        let app = app();

        send(&app, post_json("/v1/query", json!({"query": "What is AI?"}))).await;
        send(&app, post_json("/v1/query", json!({"query": "What is AI?"}))).await;

        let (status, body) = send(&app, get("/v1/cache/stats")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_requests"], 2);
        assert_eq!(body["exact_hits"], 1);
        assert_eq!(body["provider_calls"], 1);
        assert_eq!(body["exact_backend"], "memory");
        assert_eq!(body["semantic_enabled"], false);
    }
}
