//! Cache key derivation from normalized query text

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Namespace prefix for exact-match entries in the key-value store
pub const QUERY_KEY_NAMESPACE: &str = "query";

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Normalizes query text before hashing
///
/// Trims the query and collapses every run of Unicode whitespace into a single
/// space. Case is preserved unless the normalizer is configured otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryNormalizer {
    case_insensitive: bool,
}

impl QueryNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lowercase queries so that keys ignore letter case
    pub fn with_case_insensitive(mut self, case_insensitive: bool) -> Self {
        self.case_insensitive = case_insensitive;
        self
    }

    pub fn normalize(&self, query: &str) -> String {
        let collapsed = WHITESPACE_RUN.replace_all(query.trim(), " ");

        if self.case_insensitive {
            collapsed.to_lowercase()
        } else {
            collapsed.into_owned()
        }
    }

    /// Normalizes and hashes a query in one step
    pub fn key_for(&self, query: &str) -> CacheKey {
        CacheKey::from_normalized(&self.normalize(query))
    }
}

/// Fixed-width content hash (SHA-256, lowercase hex) of a normalized query
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn from_normalized(normalized: &str) -> Self {
        let digest = Sha256::digest(normalized.as_bytes());
        Self(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key under which the exact-match entry is stored
    pub fn namespaced(&self) -> String {
        format!("{}:{}", QUERY_KEY_NAMESPACE, self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_whitespace() {
        let normalizer = QueryNormalizer::new();
        assert_eq!(normalizer.normalize("  What   is\tAI?\n"), "What is AI?");
    }

    #[test]
    fn test_normalize_preserves_case_by_default() {
        let normalizer = QueryNormalizer::new();
        assert_eq!(normalizer.normalize("What is AI?"), "What is AI?");
    }

    #[test]
    fn test_normalize_case_insensitive() {
        let normalizer = QueryNormalizer::new().with_case_insensitive(true);
        assert_eq!(normalizer.normalize("What IS  AI?"), "what is ai?");
    }

    #[test]
    fn test_normalize_unicode_whitespace() {
        let normalizer = QueryNormalizer::new();
        assert_eq!(normalizer.normalize("What\u{00A0}is\u{2003}AI?"), "What is AI?");
    }

    #[test]
    fn test_identical_normalized_text_yields_identical_key() {
        let normalizer = QueryNormalizer::new();
        let variants = ["What is AI?", " What is AI? ", "What  is\nAI?", "\tWhat is AI?\r\n"];

        let first = normalizer.key_for(variants[0]);

        for variant in &variants[1..] {
            assert_eq!(normalizer.key_for(variant), first, "variant {:?}", variant);
        }
    }

    #[test]
    fn test_different_text_yields_different_key() {
        let normalizer = QueryNormalizer::new();
        assert_ne!(
            normalizer.key_for("What is AI?"),
            normalizer.key_for("What is ML?")
        );
        assert_ne!(
            normalizer.key_for("What is AI?"),
            normalizer.key_for("what is ai?")
        );
    }

    #[test]
    fn test_key_is_fixed_width_hex() {
        let key = CacheKey::from_normalized("What is AI?");

        assert_eq!(key.as_str().len(), 64);
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert!(key.namespaced().starts_with("query:"));
    }

    #[test]
    fn test_key_known_digest() {
        let key = CacheKey::from_normalized("");
        assert_eq!(
            key.as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
