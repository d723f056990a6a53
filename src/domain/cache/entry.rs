use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::CacheKey;
use crate::domain::usage::TokenCount;

/// Exact-match cache entry stored in the key-value store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub query: String,
    pub response: String,
    pub provider_id: String,
    pub model_id: String,
    pub usage: TokenCount,
    pub created_at: DateTime<Utc>,
    /// `None` means the entry never expires
    pub ttl_secs: Option<u64>,
    #[serde(default)]
    pub hit_count: u64,
}

impl CacheEntry {
    pub fn new(
        key: CacheKey,
        query: impl Into<String>,
        response: impl Into<String>,
        provider_id: impl Into<String>,
        model_id: impl Into<String>,
        usage: TokenCount,
    ) -> Self {
        Self {
            key,
            query: query.into(),
            response: response.into(),
            provider_id: provider_id.into(),
            model_id: model_id.into(),
            usage,
            created_at: Utc::now(),
            ttl_secs: None,
            hit_count: 0,
        }
    }

    /// A TTL of zero seconds is treated as "no expiry"
    pub fn with_ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = (ttl_secs > 0).then_some(ttl_secs);
        self
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_secs.map(Duration::from_secs)
    }

    /// Time left before expiry, or `None` for entries without a TTL.
    /// Saturates at one second so rewrites never produce an immediate expiry.
    pub fn remaining_ttl(&self, now: DateTime<Utc>) -> Option<Duration> {
        let ttl = self.ttl_secs?;
        let elapsed = (now - self.created_at).num_seconds().max(0) as u64;

        Some(Duration::from_secs(ttl.saturating_sub(elapsed).max(1)))
    }

    pub fn record_hit(&mut self) {
        self.hit_count += 1;
    }
}
