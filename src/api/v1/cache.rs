use axum::extract::State;

use crate::api::state::AppState;
use crate::api::types::Json;
use crate::infrastructure::services::CacheStatsReport;

/// GET /v1/cache/stats
pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStatsReport> {
    Json(state.query_service.cache_stats().await)
}
