//! Embedding provider trait definition

use async_trait::async_trait;
use std::fmt::Debug;

use crate::domain::DomainError;

/// Text to fixed-length vector
///
/// Failures are reported as `DomainError::EmbeddingFailure`.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync + Debug {
    /// Generate the embedding for one text
    async fn embed(&self, text: &str) -> Result<Vec<f32>, DomainError>;

    /// Get the provider name
    fn provider_name(&self) -> &'static str;

    /// Length of every vector this provider returns
    fn dimensions(&self) -> usize;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Embedder answering from a text→vector table
    ///
    /// Unknown texts get a deterministic vector orthogonal-ish to the table
    /// entries (all mass on the last axis).
    #[derive(Debug)]
    pub struct MockEmbeddingProvider {
        dimensions: usize,
        vectors: HashMap<String, Vec<f32>>,
        error: Option<String>,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl MockEmbeddingProvider {
        pub fn new(dimensions: usize) -> Self {
            Self {
                dimensions,
                vectors: HashMap::new(),
                error: None,
                delay: None,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn with_vector(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
            self.vectors.insert(text.into(), vector);
            self
        }

        pub fn with_error(mut self, error: impl Into<String>) -> Self {
            self.error = Some(error.into());
            self
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EmbeddingProvider for MockEmbeddingProvider {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            if let Some(ref error) = self.error {
                return Err(DomainError::embedding(error.clone()));
            }

            Ok(self.vectors.get(text).cloned().unwrap_or_else(|| {
                let mut vector = vec![0.0; self.dimensions];
                if let Some(last) = vector.last_mut() {
                    *last = 1.0;
                }
                vector
            }))
        }

        fn provider_name(&self) -> &'static str {
            "mock"
        }

        fn dimensions(&self) -> usize {
            self.dimensions
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_mock_provider_table_lookup() {
            let provider = MockEmbeddingProvider::new(2).with_vector("What is AI?", vec![1.0, 0.0]);

            assert_eq!(provider.embed("What is AI?").await.unwrap(), vec![1.0, 0.0]);
            assert_eq!(provider.embed("unknown").await.unwrap(), vec![0.0, 1.0]);
            assert_eq!(provider.call_count(), 2);
        }

        #[tokio::test]
        async fn test_mock_provider_error() {
            let provider = MockEmbeddingProvider::new(2).with_error("model offline");

            let result = provider.embed("Hello").await;

            assert!(matches!(result, Err(DomainError::EmbeddingFailure { .. })));
        }
    }
}
