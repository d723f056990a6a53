//! Vector index trait

use std::fmt::Debug;

use async_trait::async_trait;

use super::{EmbeddingRecord, SimilarityMatch};
use crate::domain::cache::CacheKey;
use crate::domain::DomainError;

/// Similarity index over embedding vectors (cosine metric)
#[async_trait]
pub trait VectorIndex: Send + Sync + Debug {
    /// Insert or replace the record stored under `record.key`
    async fn upsert(&self, record: EmbeddingRecord) -> Result<(), DomainError>;

    /// Neighbours scoring at or above `threshold`, best first, at most `limit`
    async fn search(
        &self,
        vector: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<SimilarityMatch>, DomainError>;

    async fn delete(&self, key: &CacheKey) -> Result<bool, DomainError>;

    async fn size(&self) -> Result<usize, DomainError>;

    /// Dimensionality fixed at deployment
    fn dimensions(&self) -> usize;

    fn backend_name(&self) -> &'static str;
}
