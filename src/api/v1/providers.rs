//! Provider status and circuit reset

use axum::extract::{Path, State};
use serde::Serialize;

use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::infrastructure::llm::ProviderStatus;
use crate::infrastructure::usage::UsageTotals;

#[derive(Debug, Serialize)]
pub struct ProvidersResponse {
    pub providers: Vec<ProviderStatus>,
    pub usage: UsageTotals,
    pub total_cost_usd: f64,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub provider: String,
    pub status: ProviderStatus,
}

/// GET /v1/providers
pub async fn list_providers(State(state): State<AppState>) -> Json<ProvidersResponse> {
    let usage = state.accountant.totals();

    Json(ProvidersResponse {
        providers: state.registry().statuses().await,
        total_cost_usd: usage.cost_usd(),
        usage,
    })
}

/// POST /v1/providers/{name}/reset
pub async fn reset_provider(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ResetResponse>, ApiError> {
    let registry = state.registry();
    registry.reset(&name)?;
    let provider = registry.resolve(&name)?;

    Ok(Json(ResetResponse {
        provider: provider.name().to_string(),
        status: provider.status().await,
    }))
}
