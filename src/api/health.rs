//! Liveness and readiness probes

use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;

use super::state::AppState;
use crate::api::types::Json;
use crate::domain::CircuitState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checks: Option<Vec<HealthCheck>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

/// Ordered from best to worst so the overall status is the maximum
#[derive(Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Serialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HealthCheck {
    fn ok(name: &str) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Healthy,
            message: None,
        }
    }

    fn failing(name: &str, status: HealthStatus, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status,
            message: Some(message.into()),
        }
    }
}

fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Returns 200 while the process is up
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: HealthStatus::Healthy,
        version: version(),
        checks: None,
        latency_ms: None,
    })
}

/// Readiness with cache and provider checks.
///
/// A degraded cache or an open circuit still accepts traffic, so those report
/// `degraded` with 200. Only a gateway with no providers at all is unready.
pub async fn ready_check(State(state): State<AppState>) -> impl IntoResponse {
    let started = Instant::now();
    let (cache, providers) = tokio::join!(check_cache(&state), check_providers(&state));

    let overall = cache.status.max(providers.status);
    let code = if overall == HealthStatus::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    let body = HealthResponse {
        status: overall,
        version: version(),
        checks: Some(vec![cache, providers]),
        latency_ms: Some(started.elapsed().as_millis() as u64),
    };

    (code, Json(body))
}

pub async fn live_check() -> impl IntoResponse {
    StatusCode::OK
}

async fn check_cache(state: &AppState) -> HealthCheck {
    let report = state.query_service.cache_stats().await;

    let unreachable = if report.exact_entries.is_none() {
        Some(format!("{} store unreachable", report.exact_backend))
    } else if report.semantic_enabled && report.vector_entries.is_none() {
        let backend = report.vector_backend.unwrap_or("vector");
        Some(format!("{} index unreachable", backend))
    } else {
        None
    };

    match unreachable {
        Some(message) => HealthCheck::failing("cache", HealthStatus::Degraded, message),
        None => HealthCheck::ok("cache"),
    }
}

async fn check_providers(state: &AppState) -> HealthCheck {
    let statuses = state.registry().statuses().await;

    if statuses.is_empty() {
        return HealthCheck::failing(
            "providers",
            HealthStatus::Unhealthy,
            "no providers registered",
        );
    }

    let open: Vec<&str> = statuses
        .iter()
        .filter(|s| s.circuit.state == CircuitState::Open)
        .map(|s| s.name.as_str())
        .collect();

    if open.is_empty() {
        HealthCheck::ok("providers")
    } else {
        let message = format!("circuit open: {}", open.join(", "));
        HealthCheck::failing("providers", HealthStatus::Degraded, message)
    }
}
