use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::cache::CacheKey;

/// Payload stored next to each vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingPayload {
    pub query: String,
    pub response: String,
    pub provider_id: String,
    pub model_id: String,
    pub created_at: DateTime<Utc>,
}

/// Vector index record; shares its key with the exact-match entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub key: CacheKey,
    pub vector: Vec<f32>,
    pub payload: EmbeddingPayload,
}

impl EmbeddingRecord {
    pub fn new(key: CacheKey, vector: Vec<f32>, payload: EmbeddingPayload) -> Self {
        Self {
            key,
            vector,
            payload,
        }
    }
}

/// A neighbour returned by the vector index
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatch {
    pub record: EmbeddingRecord,
    pub score: f32,
}

impl SimilarityMatch {
    pub fn new(record: EmbeddingRecord, score: f32) -> Self {
        Self { record, score }
    }
}

fn preference(a: &SimilarityMatch, b: &SimilarityMatch) -> Ordering {
    a.score
        .partial_cmp(&b.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.record.payload.created_at.cmp(&b.record.payload.created_at))
}

/// Picks the winning neighbour at or above `threshold`.
///
/// Highest score wins; equal scores go to the most recently created record.
pub fn select_best(matches: Vec<SimilarityMatch>, threshold: f32) -> Option<SimilarityMatch> {
    matches
        .into_iter()
        .filter(|m| m.score >= threshold)
        .max_by(preference)
}

/// Best `limit` matches in preference order, so truncation never drops a
/// newer record in favour of an older one with the same score
pub fn rank_matches(mut matches: Vec<SimilarityMatch>, limit: usize) -> Vec<SimilarityMatch> {
    matches.sort_by(|a, b| preference(b, a));
    matches.truncate(limit);
    matches
}
