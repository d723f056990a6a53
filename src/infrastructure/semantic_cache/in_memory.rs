//! In-memory cosine vector index

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::cache::CacheKey;
use crate::domain::embedding::cosine_similarity;
use crate::domain::semantic_cache::{
    rank_matches, EmbeddingRecord, SimilarityMatch, VectorIndex,
};
use crate::domain::DomainError;

const STORE: &str = "vector-memory";

/// Linear-scan index for development and small deployments
#[derive(Debug)]
pub struct InMemoryVectorIndex {
    records: RwLock<HashMap<CacheKey, EmbeddingRecord>>,
    dimensions: usize,
    max_entries: usize,
    evictions: AtomicU64,
}

impl InMemoryVectorIndex {
    pub fn new(dimensions: usize) -> Self {
        Self::with_capacity(dimensions, 10_000)
    }

    pub fn with_capacity(dimensions: usize, max_entries: usize) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            dimensions,
            max_entries: max_entries.max(1),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Drop the oldest record when full
    fn evict_if_needed(&self, records: &mut HashMap<CacheKey, EmbeddingRecord>) {
        if records.len() < self.max_entries {
            return;
        }

        if let Some(oldest) = records
            .values()
            .min_by_key(|record| record.payload.created_at)
            .map(|record| record.key.clone())
        {
            records.remove(&oldest);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn check_dimensions(&self, len: usize) -> Result<(), DomainError> {
        if len != self.dimensions {
            return Err(DomainError::cache_unavailable(
                STORE,
                format!(
                    "Vector has {} dimensions, index expects {}",
                    len, self.dimensions
                ),
            ));
        }
        Ok(())
    }

    fn lock_error<E: std::fmt::Display>(e: E) -> DomainError {
        DomainError::cache_unavailable(STORE, format!("Index lock poisoned: {}", e))
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn upsert(&self, record: EmbeddingRecord) -> Result<(), DomainError> {
        self.check_dimensions(record.vector.len())?;

        let mut records = self.records.write().map_err(Self::lock_error)?;

        if !records.contains_key(&record.key) {
            self.evict_if_needed(&mut records);
        }
        records.insert(record.key.clone(), record);

        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<SimilarityMatch>, DomainError> {
        self.check_dimensions(vector.len())?;

        let records = self.records.read().map_err(Self::lock_error)?;

        let matches: Vec<SimilarityMatch> = records
            .values()
            .filter_map(|record| {
                let score = cosine_similarity(vector, &record.vector);
                (score >= threshold).then(|| SimilarityMatch::new(record.clone(), score))
            })
            .collect();

        Ok(rank_matches(matches, limit))
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool, DomainError> {
        let mut records = self.records.write().map_err(Self::lock_error)?;
        Ok(records.remove(key).is_some())
    }

    async fn size(&self) -> Result<usize, DomainError> {
        let records = self.records.read().map_err(Self::lock_error)?;
        Ok(records.len())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn backend_name(&self) -> &'static str {
        STORE
    }
}
