//! Query endpoint handler

use axum::{extract::State, http::HeaderMap};
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::middleware::truncate_for_log;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json, QueryRequest, QueryResponse};

/// Reuse the `x-request-id` stamped by the router when it is a UUID
fn request_id(headers: &HeaderMap) -> Uuid {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v).ok())
        .unwrap_or_else(Uuid::new_v4)
}

/// POST /v1/query
pub async fn process_query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let request_id = request_id(&headers);

    info!(
        request_id = %request_id,
        query = %truncate_for_log(&request.query, 80),
        provider = request.provider.as_deref().unwrap_or("default"),
        use_cache = request.use_cache,
        "Processing query"
    );

    let outcome = state
        .query_service
        .process_query(&request.query, request.options())
        .await
        .map_err(|e| {
            warn!(request_id = %request_id, error = %e, kind = e.kind(), "Query failed");
            ApiError::from(e)
        })?;

    info!(
        request_id = %request_id,
        cache_type = outcome.cache_type.as_str(),
        provider = %outcome.provider_id,
        model = %outcome.model_id,
        tokens = outcome.tokens_used,
        latency_ms = outcome.latency_ms,
        "Query answered"
    );

    Ok(Json(QueryResponse::new(request_id, outcome)))
}
