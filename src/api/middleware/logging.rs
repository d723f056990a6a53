//! Request logging middleware

use std::time::Instant;

use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use tracing::{debug, info, warn};

const REDACTED: &str = "[REDACTED]";

/// Headers worth a debug line; credentials among them are masked
const LOGGED_HEADERS: [&str; 7] = [
    "content-type",
    "content-length",
    "user-agent",
    "x-forwarded-for",
    "authorization",
    "x-api-key",
    "proxy-authorization",
];

/// One event per request, at warn for 5xx responses.
///
/// `TraceLayer` owns the span; this only emits events inside it.
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = extract_path(&request);
    let request_id = header_value(request.headers(), "x-request-id").unwrap_or_default();

    debug!(
        method = %method,
        path = %path,
        request_id = %request_id,
        headers = %loggable_headers(request.headers()),
        "Request received"
    );

    let response = next.run(request).await;
    let status = response.status();
    let duration_ms = start.elapsed().as_millis() as u64;

    if status.is_server_error() {
        warn!(method = %method, path = %path, status = status.as_u16(), duration_ms, request_id = %request_id, "Request failed");
    } else {
        info!(method = %method, path = %path, status = status.as_u16(), duration_ms, request_id = %request_id, "Request completed");
    }

    response
}

/// Route template when matched, raw path otherwise
pub(crate) fn extract_path(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|mp| mp.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string())
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn is_credential(name: &str) -> bool {
    matches!(name, "authorization" | "x-api-key" | "proxy-authorization")
}

fn loggable_headers(headers: &HeaderMap) -> String {
    LOGGED_HEADERS
        .iter()
        .filter_map(|name| {
            let value = header_value(headers, name)?;
            let shown = if is_credential(name) { REDACTED.to_string() } else { value };
            Some(format!("{}={}", name, shown))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Cut `s` to `max_chars` characters, noting how many were dropped
pub fn truncate_for_log(s: &str, max_chars: usize) -> String {
    let total = s.chars().count();
    if total <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars).collect();
        format!("{}...[truncated {} chars]", kept, total - max_chars)
    }
}
