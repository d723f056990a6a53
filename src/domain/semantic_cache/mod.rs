//! Semantic cache domain models and traits
//!
//! Matches semantically similar queries through embedding similarity
//! rather than requiring exact key matches.

mod config;
mod record;
mod repository;

pub use config::{validate_similarity_threshold, SemanticCacheConfig, VectorBackend};
pub use record::{
    rank_matches, select_best, EmbeddingPayload, EmbeddingRecord, SimilarityMatch,
};
pub use repository::VectorIndex;

#[cfg(test)]
pub use repository::mock::MockVectorIndex;
