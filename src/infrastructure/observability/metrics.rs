//! Prometheus recorder and the gateway's metric names

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, response::IntoResponse, routing::get, Router};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use regex::Regex;

use super::config::MetricsConfig;
use crate::domain::usage::CallOutcome;

static UUID_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}").unwrap()
});

static PROVIDER_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/v1/providers/[^/]+/").unwrap());

/// Handle to the installed recorder, rendered on the scrape route
#[derive(Clone)]
pub struct PrometheusMetrics {
    handle: Arc<PrometheusHandle>,
}

impl PrometheusMetrics {
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Install the global Prometheus recorder
pub fn init_metrics(config: &MetricsConfig) -> Option<PrometheusMetrics> {
    if !config.enabled {
        tracing::info!("Prometheus metrics disabled");
        return None;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            gauge!("llm_cache_gateway_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);

            tracing::info!("Prometheus metrics initialized at {}", config.path);

            Some(PrometheusMetrics {
                handle: Arc::new(handle),
            })
        }
        Err(e) => {
            tracing::error!("Failed to initialize Prometheus metrics: {}", e);
            None
        }
    }
}

pub fn create_metrics_router(metrics: PrometheusMetrics, path: &str) -> Router {
    Router::new()
        .route(path, get(metrics_handler))
        .with_state(metrics)
}

async fn metrics_handler(State(metrics): State<PrometheusMetrics>) -> impl IntoResponse {
    metrics.render()
}

pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!("http_requests_total", &labels).increment(1);
    histogram!("http_request_duration_seconds", &labels).record(duration.as_secs_f64());
}

/// Record one answered query by cache layer (`exact`, `semantic`, `none`)
pub fn record_query(cache_type: &'static str) {
    counter!("gateway_queries_total", "cache_type" => cache_type).increment(1);
}

/// Record a skipped or failed cache read/write
pub fn record_degraded_cache_event(store: &'static str) {
    counter!("gateway_degraded_cache_events_total", "store" => store).increment(1);
}

pub fn record_coalesced_request() {
    counter!("gateway_coalesced_requests_total").increment(1);
}

/// Count one finished provider call, its latency and token usage
pub fn record_provider_call(outcome: &CallOutcome) {
    let outcome_label = match outcome.error_kind {
        _ if outcome.success => "ok",
        Some(kind) => kind,
        None => "error",
    };
    let labels = [
        ("provider", outcome.provider.clone()),
        ("model", outcome.model.clone()),
        ("outcome", outcome_label.to_string()),
    ];

    counter!("gateway_provider_calls_total", &labels).increment(1);
    histogram!("gateway_provider_call_seconds", &labels).record(outcome.latency.as_secs_f64());

    if outcome.attempts > 1 {
        counter!("gateway_provider_retries_total", "provider" => outcome.provider.clone())
            .increment(u64::from(outcome.attempts - 1));
    }

    if let Some(tokens) = outcome.tokens {
        let estimated = if tokens.is_approximate() { "true" } else { "false" };
        let token_labels = [
            ("provider", outcome.provider.clone()),
            ("estimated", estimated.to_string()),
        ];
        counter!("gateway_prompt_tokens_total", &token_labels)
            .increment(u64::from(tokens.prompt_tokens));
        counter!("gateway_completion_tokens_total", &token_labels)
            .increment(u64::from(tokens.completion_tokens));
    }
}

/// Spend in micro-dollars; counters only take integers
pub fn record_spend(provider: &str, model: &str, cost_usd: f64) {
    counter!(
        "gateway_spend_micro_usd_total",
        "provider" => provider.to_string(),
        "model" => model.to_string()
    )
    .increment((cost_usd * 1_000_000.0).round() as u64);
}

/// 0 closed, 1 open, 2 half-open
pub fn record_circuit_state(provider: &str, state: f64) {
    gauge!("gateway_circuit_state", "provider" => provider.to_string()).set(state);
}

pub fn record_rate_limited(provider: &str) {
    counter!("gateway_rate_limited_total", "provider" => provider.to_string()).increment(1);
}

/// Route label with ids and provider names collapsed, capped at 50 chars
fn sanitize_path(path: &str) -> String {
    let path = UUID_SEGMENT.replace_all(path, "{id}");
    PROVIDER_SEGMENT
        .replace(&path, "/v1/providers/{name}/")
        .chars()
        .take(50)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::usage::TokenCount;

    #[test]
    fn test_sanitize_path_uuid() {
        let path = "/v1/query/550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(sanitize_path(path), "/v1/query/{id}");
    }

    #[test]
    fn test_sanitize_path_provider_name() {
        assert_eq!(
            sanitize_path("/v1/providers/openai/reset"),
            "/v1/providers/{name}/reset"
        );
    }

    #[test]
    fn test_sanitize_path_no_id() {
        assert_eq!(sanitize_path("/health"), "/health");
    }

    #[test]
    fn test_sanitize_path_truncates_long_paths() {
        let path = "/very/long/path/that/exceeds/the/maximum/allowed/length/for/metrics";
        assert!(sanitize_path(path).len() <= 50);
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_query("exact");
        record_degraded_cache_event("kv");
        record_circuit_state("openai", 1.0);
        record_spend("openai", "gpt-4o", 0.000125);
        record_provider_call(&CallOutcome::succeeded(
            "openai",
            "gpt-4o",
            TokenCount::approximate(3, 5),
            Duration::from_millis(40),
            2,
        ));
    }
}
