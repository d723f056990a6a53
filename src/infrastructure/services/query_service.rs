//! Cascading cache lookup and population in front of the provider registry
//!
//! A query is answered from the exact-match store, then from the vector index
//! when a neighbour scores at or above the similarity threshold, and only then
//! by a provider call. Misses are coalesced per request identity so concurrent
//! identical queries trigger a single upstream call.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::inflight::{InFlight, Role};
use crate::domain::cache::{Cache, CacheEntry, CacheExt, CacheKey, QueryNormalizer};
use crate::domain::llm::context_window::check_fits;
use crate::domain::llm::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
use crate::domain::semantic_cache::{
    select_best, validate_similarity_threshold, EmbeddingPayload, EmbeddingRecord,
    SimilarityMatch, VectorIndex,
};
use crate::domain::usage::{PricingTable, TokenCount};
use crate::domain::{CompletionRequest, DomainError, EmbeddingProvider, ProviderCallResult};
use crate::infrastructure::llm::ProviderRegistry;
use crate::infrastructure::observability::metrics::{
    record_coalesced_request, record_degraded_cache_event, record_query,
};

pub const MAX_QUERY_CHARS: usize = 10_000;
pub const MAX_TOKENS_LIMIT: u32 = 4_000;
pub const MAX_TEMPERATURE: f32 = 2.0;

const EMBEDDING_STORE: &str = "embedding";

/// Which tier answered a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheType {
    Exact,
    Semantic,
    None,
}

impl CacheType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheType::Exact => "exact",
            CacheType::Semantic => "semantic",
            CacheType::None => "none",
        }
    }
}

/// Per-request knobs
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// `false` skips both lookups; the result is still written back
    pub use_cache: bool,
    pub similarity_threshold: Option<f32>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            similarity_threshold: None,
            provider: None,
            model: None,
            max_tokens: None,
            temperature: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub response: String,
    pub cache_hit: bool,
    pub cache_type: CacheType,
    pub provider_id: String,
    pub model_id: String,
    pub tokens_used: u32,
    pub tokens_approximate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_score: Option<f32>,
    pub cost_usd: f64,
    pub latency_ms: u64,
}

/// Orchestrator settings, assembled from the `cache` and `semantic` sections
#[derive(Debug, Clone)]
pub struct QueryServiceConfig {
    /// 0 stores entries without expiry
    pub ttl_secs: u64,
    pub operation_timeout: Duration,
    pub write_enabled: bool,
    pub semantic_enabled: bool,
    pub similarity_threshold: f32,
    pub search_limit: usize,
}

impl Default for QueryServiceConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            operation_timeout: Duration::from_millis(500),
            write_enabled: true,
            semantic_enabled: true,
            similarity_threshold: 0.85,
            search_limit: 5,
        }
    }
}

/// Dedup and hit counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueryStats {
    pub total_requests: u64,
    pub coalesced_requests: u64,
    pub provider_calls: u64,
    pub exact_hits: u64,
    pub semantic_hits: u64,
    pub degraded_cache_events: u64,
}

#[derive(Debug, Default)]
struct StatsCounters {
    total_requests: AtomicU64,
    coalesced_requests: AtomicU64,
    provider_calls: AtomicU64,
    exact_hits: AtomicU64,
    semantic_hits: AtomicU64,
    degraded_cache_events: AtomicU64,
}

impl StatsCounters {
    fn snapshot(&self) -> QueryStats {
        QueryStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            coalesced_requests: self.coalesced_requests.load(Ordering::Relaxed),
            provider_calls: self.provider_calls.load(Ordering::Relaxed),
            exact_hits: self.exact_hits.load(Ordering::Relaxed),
            semantic_hits: self.semantic_hits.load(Ordering::Relaxed),
            degraded_cache_events: self.degraded_cache_events.load(Ordering::Relaxed),
        }
    }
}

/// Sizes of both tiers plus the request counters, for the stats endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsReport {
    #[serde(flatten)]
    pub stats: QueryStats,
    pub exact_backend: &'static str,
    pub exact_entries: Option<usize>,
    pub semantic_enabled: bool,
    pub vector_backend: Option<&'static str>,
    pub vector_entries: Option<usize>,
}

#[derive(Debug)]
struct Inner {
    cache: Arc<dyn Cache>,
    index: Option<Arc<dyn VectorIndex>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    registry: Arc<ProviderRegistry>,
    normalizer: QueryNormalizer,
    pricing: PricingTable,
    config: QueryServiceConfig,
    inflight: InFlight<ProviderCallResult>,
    stats: StatsCounters,
}

/// Cache orchestrator; cheap to clone
#[derive(Debug, Clone)]
pub struct QueryService {
    inner: Arc<Inner>,
}

impl QueryService {
    pub fn new(
        cache: Arc<dyn Cache>,
        registry: Arc<ProviderRegistry>,
        config: QueryServiceConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                cache,
                index: None,
                embedder: None,
                registry,
                normalizer: QueryNormalizer::new(),
                pricing: PricingTable::default(),
                config,
                inflight: InFlight::new(),
                stats: StatsCounters::default(),
            }),
        }
    }

    /// Enable the semantic tier
    pub fn with_semantic(
        mut self,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.index = Some(index);
            inner.embedder = Some(embedder);
        }
        self
    }

    pub fn with_normalizer(mut self, normalizer: QueryNormalizer) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.normalizer = normalizer;
        }
        self
    }

    pub fn with_pricing(mut self, pricing: PricingTable) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.pricing = pricing;
        }
        self
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.inner.registry
    }

    pub fn stats(&self) -> QueryStats {
        self.inner.stats.snapshot()
    }

    fn semantic_tier(&self) -> Option<(&Arc<dyn VectorIndex>, &Arc<dyn EmbeddingProvider>)> {
        if !self.inner.config.semantic_enabled {
            return None;
        }
        self.inner.index.as_ref().zip(self.inner.embedder.as_ref())
    }

    pub async fn cache_stats(&self) -> CacheStatsReport {
        let exact_entries = self.inner.cache.size().await.ok();
        let (vector_backend, vector_entries) = match self.semantic_tier() {
            Some((index, _)) => (Some(index.backend_name()), index.size().await.ok()),
            None => (None, None),
        };

        CacheStatsReport {
            stats: self.stats(),
            exact_backend: self.inner.cache.backend_name(),
            exact_entries,
            semantic_enabled: self.semantic_tier().is_some(),
            vector_backend,
            vector_entries,
        }
    }

    /// Answer `query` from the cache tiers or a provider call
    pub async fn process_query(
        &self,
        query: &str,
        options: QueryOptions,
    ) -> Result<QueryOutcome, DomainError> {
        let started = Instant::now();
        self.inner.stats.total_requests.fetch_add(1, Ordering::Relaxed);

        let query = validate_query(query)?;
        let max_tokens = validate_max_tokens(options.max_tokens)?;
        let temperature = validate_temperature(options.temperature)?;
        let threshold = match options.similarity_threshold {
            Some(value) => validate_similarity_threshold(value)?,
            None => self.inner.config.similarity_threshold,
        };

        // Named providers and models fail fast, before any cache work. Strategy
        // selection waits for the coalesced leader so followers never advance
        // the round-robin cursor.
        let requested_provider = options.provider;
        if let Some(ref name) = requested_provider {
            self.inner.registry.resolve(name)?;
        }
        let requested_model = options
            .model
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());
        if let Some(ref model) = requested_model {
            let estimator = requested_provider.as_deref().unwrap_or_default();
            check_fits(estimator, model, query, max_tokens)?;
        }

        let key = self.inner.normalizer.key_for(query);
        let mut query_vector = None;

        if options.use_cache {
            if let Some(entry) = self.lookup_exact(&key).await {
                debug!(cache_key = %key, "Exact cache hit");
                return Ok(self.exact_hit(entry, started));
            }

            if let Some((index, embedder)) = self.semantic_tier() {
                if let Some(vector) = self.embed(embedder, query).await {
                    if let Some(best) = self.lookup_semantic(index, &vector, threshold).await {
                        debug!(
                            cache_key = %key,
                            matched = %best.record.key,
                            score = best.score,
                            "Semantic cache hit"
                        );
                        return Ok(self.semantic_hit(key, query, best, started));
                    }
                    query_vector = Some(vector);
                }
            }
        }

        let coalesce_key = format!(
            "{}|{}|{}|{}|{}|{}",
            key,
            requested_provider
                .as_deref()
                .map(|p| p.trim().to_lowercase())
                .unwrap_or_else(|| "*".to_string()),
            requested_model.as_deref().unwrap_or("*"),
            max_tokens,
            temperature,
            !options.use_cache
        );

        let service = self.clone();
        let call = LeaderCall {
            provider: requested_provider,
            model: requested_model,
            query: query.to_string(),
            max_tokens,
            temperature,
            key,
            vector: query_vector,
        };
        let (result, role) = self
            .inner
            .inflight
            .run(coalesce_key, move || async move { service.call_and_populate(call).await })
            .await;

        if role == Role::Follower {
            self.inner
                .stats
                .coalesced_requests
                .fetch_add(1, Ordering::Relaxed);
            record_coalesced_request();
            debug!("Attached to in-flight request");
        }

        let call = result?;
        record_query(CacheType::None.as_str());

        Ok(QueryOutcome {
            cost_usd: self
                .inner
                .pricing
                .cost(&call.provider_id, &call.model_id, &call.tokens),
            response: call.text,
            cache_hit: false,
            cache_type: CacheType::None,
            provider_id: call.provider_id,
            model_id: call.model_id,
            tokens_used: call.tokens.total(),
            tokens_approximate: call.tokens.is_approximate(),
            similarity_score: None,
            latency_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Leader path: pick the provider, make one call (with fallback), then
    /// write both tiers
    async fn call_and_populate(self, call: LeaderCall) -> Result<ProviderCallResult, DomainError> {
        let LeaderCall {
            provider,
            model,
            query,
            max_tokens,
            temperature,
            key,
            vector,
        } = call;

        let provider = self.inner.registry.select(provider.as_deref())?;
        let model = model.unwrap_or_else(|| provider.default_model().to_string());
        check_fits(provider.name(), &model, &query, max_tokens)?;

        let request = CompletionRequest::new(query.as_str(), model)
            .with_max_tokens(max_tokens)
            .with_temperature(temperature);

        self.inner.stats.provider_calls.fetch_add(1, Ordering::Relaxed);

        let call = self
            .inner
            .registry
            .invoke_with_fallback(&provider, &request)
            .await?;

        info!(
            provider = %call.provider_id,
            model = %call.model_id,
            latency_ms = call.latency_ms,
            attempts = call.attempts,
            "Provider call completed"
        );

        if self.inner.config.write_enabled {
            self.populate(&key, &query, &call, vector).await;
        }

        Ok(call)
    }

    async fn populate(
        &self,
        key: &CacheKey,
        query: &str,
        call: &ProviderCallResult,
        vector: Option<Vec<f32>>,
    ) {
        let entry = CacheEntry::new(
            key.clone(),
            query,
            &call.text,
            &call.provider_id,
            &call.model_id,
            call.tokens,
        )
        .with_ttl_secs(self.inner.config.ttl_secs);

        let cache = &self.inner.cache;
        self.bounded(
            cache.backend_name(),
            "set",
            cache.set(&key.namespaced(), &entry, entry.ttl()),
        )
        .await;

        let Some((index, embedder)) = self.semantic_tier() else {
            return;
        };

        let vector = match vector {
            Some(vector) => Some(vector),
            None => self.embed(embedder, query).await,
        };

        if let Some(vector) = vector {
            let record = EmbeddingRecord::new(
                key.clone(),
                vector,
                EmbeddingPayload {
                    query: query.to_string(),
                    response: call.text.clone(),
                    provider_id: call.provider_id.clone(),
                    model_id: call.model_id.clone(),
                    created_at: entry.created_at,
                },
            );

            self.bounded(index.backend_name(), "upsert", index.upsert(record))
                .await;
        }
    }

    async fn lookup_exact(&self, key: &CacheKey) -> Option<CacheEntry> {
        let cache = &self.inner.cache;
        self.bounded(
            cache.backend_name(),
            "get",
            cache.get::<CacheEntry>(&key.namespaced()),
        )
        .await
        .flatten()
    }

    async fn embed(&self, embedder: &Arc<dyn EmbeddingProvider>, text: &str) -> Option<Vec<f32>> {
        self.bounded(EMBEDDING_STORE, "embed", embedder.embed(text))
            .await
    }

    async fn lookup_semantic(
        &self,
        index: &Arc<dyn VectorIndex>,
        vector: &[f32],
        threshold: f32,
    ) -> Option<SimilarityMatch> {
        let matches = self
            .bounded(
                index.backend_name(),
                "search",
                index.search(vector, threshold, self.inner.config.search_limit),
            )
            .await?;

        select_best(matches, threshold)
    }

    fn exact_hit(&self, entry: CacheEntry, started: Instant) -> QueryOutcome {
        self.inner.stats.exact_hits.fetch_add(1, Ordering::Relaxed);
        record_query(CacheType::Exact.as_str());

        let outcome = QueryOutcome {
            response: entry.response.clone(),
            cache_hit: true,
            cache_type: CacheType::Exact,
            provider_id: entry.provider_id.clone(),
            model_id: entry.model_id.clone(),
            tokens_used: entry.usage.total(),
            tokens_approximate: entry.usage.is_approximate(),
            similarity_score: None,
            cost_usd: 0.0,
            latency_ms: started.elapsed().as_millis() as u64,
        };

        if self.inner.config.write_enabled {
            let service = self.clone();
            tokio::spawn(async move {
                let mut entry = entry;
                entry.record_hit();
                let ttl = entry.remaining_ttl(Utc::now());
                let key = entry.key.namespaced();
                let cache = &service.inner.cache;
                service
                    .bounded(cache.backend_name(), "hit_count", cache.set(&key, &entry, ttl))
                    .await;
            });
        }

        outcome
    }

    fn semantic_hit(
        &self,
        key: CacheKey,
        query: &str,
        best: SimilarityMatch,
        started: Instant,
    ) -> QueryOutcome {
        self.inner.stats.semantic_hits.fetch_add(1, Ordering::Relaxed);
        record_query(CacheType::Semantic.as_str());

        let payload = best.record.payload;

        if self.inner.config.write_enabled {
            let entry = CacheEntry::new(
                key,
                query,
                &payload.response,
                &payload.provider_id,
                &payload.model_id,
                TokenCount::exact(0, 0),
            )
            .with_ttl_secs(self.inner.config.ttl_secs);

            let service = self.clone();
            tokio::spawn(async move {
                let cache = &service.inner.cache;
                service
                    .bounded(
                        cache.backend_name(),
                        "backfill",
                        cache.set(&entry.key.namespaced(), &entry, entry.ttl()),
                    )
                    .await;
            });
        }

        QueryOutcome {
            response: payload.response,
            cache_hit: true,
            cache_type: CacheType::Semantic,
            provider_id: payload.provider_id,
            model_id: payload.model_id,
            tokens_used: 0,
            tokens_approximate: false,
            similarity_score: Some(best.score),
            cost_usd: 0.0,
            latency_ms: started.elapsed().as_millis() as u64,
        }
    }

    /// Run a cache-side operation under the operation timeout; failures are
    /// logged, counted as degraded and swallowed.
    async fn bounded<T, F>(&self, store: &'static str, operation: &'static str, fut: F) -> Option<T>
    where
        F: Future<Output = Result<T, DomainError>>,
    {
        match tokio::time::timeout(self.inner.config.operation_timeout, fut).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                warn!(store, operation, error = %e, "Cache operation failed, continuing without it");
                self.degraded(store);
                None
            }
            Err(_) => {
                warn!(
                    store,
                    operation,
                    timeout_ms = self.inner.config.operation_timeout.as_millis() as u64,
                    "Cache operation timed out, continuing without it"
                );
                self.degraded(store);
                None
            }
        }
    }

    fn degraded(&self, store: &'static str) {
        self.inner
            .stats
            .degraded_cache_events
            .fetch_add(1, Ordering::Relaxed);
        record_degraded_cache_event(store);
    }
}

/// Everything the coalesced leader needs, owned so it can run on its own task
struct LeaderCall {
    provider: Option<String>,
    model: Option<String>,
    query: String,
    max_tokens: u32,
    temperature: f32,
    key: CacheKey,
    vector: Option<Vec<f32>>,
}

fn validate_query(query: &str) -> Result<&str, DomainError> {
    let trimmed = query.trim();

    if trimmed.is_empty() {
        return Err(DomainError::validation("query must not be empty"));
    }

    let chars = trimmed.chars().count();
    if chars > MAX_QUERY_CHARS {
        return Err(DomainError::validation(format!(
            "query is {} characters, maximum is {}",
            chars, MAX_QUERY_CHARS
        )));
    }

    Ok(trimmed)
}

fn validate_max_tokens(max_tokens: Option<u32>) -> Result<u32, DomainError> {
    let value = max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);

    if !(1..=MAX_TOKENS_LIMIT).contains(&value) {
        return Err(DomainError::validation(format!(
            "max_tokens must be between 1 and {}",
            MAX_TOKENS_LIMIT
        )));
    }

    Ok(value)
}

fn validate_temperature(temperature: Option<f32>) -> Result<f32, DomainError> {
    let value = temperature.unwrap_or(DEFAULT_TEMPERATURE);

    if !(0.0..=MAX_TEMPERATURE).contains(&value) {
        return Err(DomainError::validation(format!(
            "temperature must be between 0.0 and {}",
            MAX_TEMPERATURE
        )));
    }

    Ok(value)
}
