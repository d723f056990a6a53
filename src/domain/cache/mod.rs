//! Exact-match cache domain

mod entry;
mod key;
mod repository;

pub use entry::CacheEntry;
pub use key::{CacheKey, QueryNormalizer, QUERY_KEY_NAMESPACE};
pub use repository::{Cache, CacheExt};

#[cfg(test)]
pub use repository::mock::MockCache;
