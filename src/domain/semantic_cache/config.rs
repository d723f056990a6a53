//! Semantic cache configuration

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Vector index backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorBackend {
    #[default]
    InMemory,
    Qdrant,
}

/// Configuration for semantic caching
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticCacheConfig {
    /// Whether semantic lookup and population are enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub backend: VectorBackend,

    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,

    #[serde(default = "default_collection")]
    pub collection: String,

    /// Vector dimensionality; must match the embedder
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Minimum cosine similarity for a hit (0.0 to 1.0, inclusive)
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Neighbours requested from the index per lookup
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
}

fn default_enabled() -> bool {
    true
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".to_string()
}

fn default_collection() -> String {
    "llm_cache".to_string()
}

fn default_dimensions() -> usize {
    384
}

fn default_similarity_threshold() -> f32 {
    0.85
}

fn default_search_limit() -> usize {
    5
}

impl Default for SemanticCacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            backend: VectorBackend::default(),
            qdrant_url: default_qdrant_url(),
            collection: default_collection(),
            dimensions: default_dimensions(),
            similarity_threshold: default_similarity_threshold(),
            search_limit: default_search_limit(),
        }
    }
}

impl SemanticCacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn with_search_limit(mut self, limit: usize) -> Self {
        self.search_limit = limit;
        self
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        validate_similarity_threshold(self.similarity_threshold)
            .map_err(|e| DomainError::configuration(format!("semantic.{}", e)))?;

        if self.dimensions == 0 {
            return Err(DomainError::configuration(
                "semantic.dimensions must be greater than 0",
            ));
        }

        if self.search_limit == 0 {
            return Err(DomainError::configuration(
                "semantic.search_limit must be greater than 0",
            ));
        }

        Ok(())
    }
}

/// Rejects thresholds outside [0, 1] (and NaN)
pub fn validate_similarity_threshold(threshold: f32) -> Result<f32, DomainError> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(threshold)
    } else {
        Err(DomainError::validation(format!(
            "similarity_threshold must be between 0.0 and 1.0, got {}",
            threshold
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SemanticCacheConfig::default();

        assert!(config.enabled);
        assert_eq!(config.backend, VectorBackend::InMemory);
        assert!((config.similarity_threshold - 0.85).abs() < f32::EPSILON);
        assert_eq!(config.dimensions, 384);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_threshold_bounds_are_inclusive() {
        assert!(validate_similarity_threshold(0.0).is_ok());
        assert!(validate_similarity_threshold(1.0).is_ok());
        assert!(validate_similarity_threshold(1.01).is_err());
        assert!(validate_similarity_threshold(-0.1).is_err());
        assert!(validate_similarity_threshold(f32::NAN).is_err());
    }

    #[test]
    fn test_out_of_range_threshold_fails_validation() {
        let config = SemanticCacheConfig::new().with_similarity_threshold(1.5);

        let err = config.validate().unwrap_err();
        assert!(matches!(err, DomainError::Configuration { .. }));
    }

    #[test]
    fn test_backend_deserialize() {
        let config: SemanticCacheConfig =
            serde_json::from_str(r#"{"backend": "qdrant", "dimensions": 1536}"#).unwrap();

        assert_eq!(config.backend, VectorBackend::Qdrant);
        assert_eq!(config.dimensions, 1536);
        assert_eq!(config.collection, "llm_cache");
    }
}
