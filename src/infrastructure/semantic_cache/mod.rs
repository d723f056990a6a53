//! Vector index implementations

mod in_memory;
mod qdrant;

use std::sync::Arc;

pub use in_memory::InMemoryVectorIndex;
pub use qdrant::QdrantVectorIndex;

use crate::domain::semantic_cache::{SemanticCacheConfig, VectorBackend, VectorIndex};
use crate::domain::DomainError;

/// Build the vector index selected by `semantic.backend`
pub fn create_vector_index(
    config: &SemanticCacheConfig,
) -> Result<Arc<dyn VectorIndex>, DomainError> {
    match config.backend {
        VectorBackend::InMemory => Ok(Arc::new(InMemoryVectorIndex::new(config.dimensions))),
        VectorBackend::Qdrant => Ok(Arc::new(QdrantVectorIndex::new(
            &config.qdrant_url,
            config.collection.clone(),
            config.dimensions,
        )?)),
    }
}
