//! Versioned gateway endpoints

pub mod cache;
pub mod providers;
pub mod query;

use axum::{
    routing::{get, post},
    Router,
};

use super::state::AppState;

pub fn create_v1_router() -> Router<AppState> {
    Router::new()
        .route("/query", post(query::process_query))
        .route("/providers", get(providers::list_providers))
        .route("/providers/{name}/reset", post(providers::reset_provider))
        .route("/cache/stats", get(cache::cache_stats))
}
