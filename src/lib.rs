//! LLM Cache Gateway
//!
//! Answers LLM queries from a two-tier response cache before calling a provider:
//! - Exact-match store keyed by the normalized query (in-memory or Redis)
//! - Semantic store of query embeddings (in-memory or Qdrant)
//! - Resilient provider calls with rate limiting, retries, circuit breaking and fallback
//! - Per-call token and cost accounting

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use api::state::AppState;
use domain::{PricingTable, UsageObserver};
use infrastructure::{
    cache::CacheFactory,
    embedding::create_embedding_provider,
    llm::LlmProviderFactory,
    semantic_cache::create_vector_index,
    services::QueryService,
    usage::CostAccountant,
};
use tracing::{info, warn};

/// Build the application state from default configuration
pub async fn create_app_state() -> anyhow::Result<AppState> {
    create_app_state_with_config(&AppConfig::default()).await
}

/// Wire caches, providers and accounting from `config`
pub async fn create_app_state_with_config(config: &AppConfig) -> anyhow::Result<AppState> {
    config.validate()?;

    let pricing = PricingTable::default();
    let accountant = Arc::new(CostAccountant::new(pricing.clone()));
    let observer: Arc<dyn UsageObserver> = accountant.clone();

    let registry = LlmProviderFactory::build_registry(
        &config.gateway,
        &config.providers,
        &config.resilience,
        observer,
    )?;
    info!(
        providers = ?registry.available_providers(),
        default = %config.gateway.default_provider,
        "Provider registry ready"
    );

    let cache = CacheFactory::new().create(&config.cache).await?;
    info!(backend = %config.cache.backend, ttl_secs = config.cache.ttl_secs, "Exact cache ready");

    let mut service = QueryService::new(
        cache,
        Arc::new(registry),
        config.query_service_config()?,
    )
    .with_normalizer(config.cache.normalizer())
    .with_pricing(pricing);

    if config.semantic.enabled {
        match create_embedding_provider(&config.embedding, config.semantic.dimensions, |var| {
            std::env::var(var).ok()
        }) {
            Ok(embedder) => {
                let index = create_vector_index(&config.semantic)?;
                info!(
                    index = index.backend_name(),
                    embedder = embedder.provider_name(),
                    dimensions = config.semantic.dimensions,
                    threshold = config.semantic.similarity_threshold,
                    "Semantic cache ready"
                );
                service = service.with_semantic(index, embedder);
            }
            Err(e) => {
                warn!(error = %e, "Embedding provider unavailable, running with exact cache only");
            }
        }
    }

    Ok(AppState::new(service, accountant))
}
