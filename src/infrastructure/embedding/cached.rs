//! Memoizing wrapper around another embedder

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache as MokaCache;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::domain::{DomainError, EmbeddingProvider};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EmbeddingCacheStats {
    pub entries: u64,
    pub hits: u64,
    pub misses: u64,
}

/// Keeps recently computed vectors so repeated texts skip the embedder.
///
/// Concurrent requests for the same text share one underlying call. Failures
/// are never stored.
pub struct CachedEmbeddingProvider {
    inner: Arc<dyn EmbeddingProvider>,
    vectors: MokaCache<String, Arc<Vec<f32>>>,
    lookups: AtomicU64,
    misses: AtomicU64,
}

impl fmt::Debug for CachedEmbeddingProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedEmbeddingProvider")
            .field("inner", &self.inner.provider_name())
            .field("entries", &self.vectors.entry_count())
            .finish()
    }
}

impl CachedEmbeddingProvider {
    pub fn new(inner: Arc<dyn EmbeddingProvider>, capacity: u64, ttl: Option<Duration>) -> Self {
        let mut builder = MokaCache::builder().max_capacity(capacity);
        if let Some(ttl) = ttl {
            builder = builder.time_to_live(ttl);
        }

        Self {
            inner,
            vectors: builder.build(),
            lookups: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Model and text hashed together; the same text under another model is a
    /// different vector
    fn key_for(&self, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.inner.provider_name().as_bytes());
        hasher.update([0u8]);
        hasher.update(text.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub async fn stats(&self) -> EmbeddingCacheStats {
        self.vectors.run_pending_tasks().await;
        let lookups = self.lookups.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);

        EmbeddingCacheStats {
            entries: self.vectors.entry_count(),
            hits: lookups.saturating_sub(misses),
            misses,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for CachedEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        self.lookups.fetch_add(1, Ordering::Relaxed);

        let vector = self
            .vectors
            .try_get_with(self.key_for(text), async {
                self.misses.fetch_add(1, Ordering::Relaxed);
                self.inner.embed(text).await.map(Arc::new)
            })
            .await
            .map_err(|e| DomainError::clone(&e))?;

        Ok(vector.as_ref().clone())
    }

    fn provider_name(&self) -> &'static str {
        self.inner.provider_name()
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }
}
