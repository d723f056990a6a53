//! Deterministic hashing embedder for offline and development use

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use unicode_segmentation::UnicodeSegmentation;

use crate::domain::embedding::normalize;
use crate::domain::{DomainError, EmbeddingProvider};

/// Feature-hashing bag-of-words embedder.
///
/// Each lowercase word is hashed into a bucket with a sign bit, and the
/// resulting vector is scaled to unit length. Texts sharing most words land
/// close together, which is enough to exercise the semantic tier without a
/// model.
#[derive(Debug, Clone)]
pub struct HashEmbeddingProvider {
    dimensions: usize,
}

impl HashEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        if self.dimensions == 0 {
            return vector;
        }

        for word in text.unicode_words() {
            let digest = Sha256::digest(word.to_lowercase().as_bytes());
            let bucket = u64::from_be_bytes([
                digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6],
                digest[7],
            ]) as usize
                % self.dimensions;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        normalize(&mut vector);
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        Ok(self.vectorize(text))
    }

    fn provider_name(&self) -> &'static str {
        "hash"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cosine_similarity;

    #[tokio::test]
    async fn test_deterministic_and_sized() {
        let provider = HashEmbeddingProvider::new(64);

        let a = provider.embed("What is AI?").await.unwrap();
        let b = provider.embed("What is AI?").await.unwrap();

        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_case_and_punctuation_insensitive() {
        let provider = HashEmbeddingProvider::new(64);

        let a = provider.embed("What is AI?").await.unwrap();
        let b = provider.embed("what is ai").await.unwrap();

        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_unit_length() {
        let provider = HashEmbeddingProvider::new(128);
        let v = provider.embed("the quick brown fox").await.unwrap();

        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_empty_text_is_zero_vector() {
        let provider = HashEmbeddingProvider::new(16);
        let v = provider.embed("   ").await.unwrap();

        assert!(v.iter().all(|x| *x == 0.0));
    }
}
