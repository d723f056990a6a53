//! Domain layer - Core business logic and entities

pub mod cache;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod resilience;
pub mod semantic_cache;
pub mod usage;

pub use cache::{Cache, CacheEntry, CacheExt, CacheKey, QueryNormalizer};
pub use embedding::{cosine_similarity, EmbeddingProvider};
pub use error::DomainError;
pub use llm::{Completion, CompletionRequest, FinishReason, LlmProvider, ProviderCallResult, Usage};
pub use resilience::{
    CircuitBreaker, CircuitState, RateLimitMode, ResilienceConfig, ResilienceOverrides,
    RetryPolicy, SlidingWindowRateLimiter,
};
pub use semantic_cache::{
    EmbeddingPayload, EmbeddingRecord, SemanticCacheConfig, SimilarityMatch, VectorIndex,
};
pub use usage::{CallOutcome, PricingTable, TokenCount, UsageObserver};
