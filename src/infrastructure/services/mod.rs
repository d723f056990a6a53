//! Application services

mod inflight;
mod query_service;

pub use inflight::{InFlight, Role};
pub use query_service::{
    CacheStatsReport, CacheType, QueryOptions, QueryOutcome, QueryService, QueryServiceConfig,
    QueryStats, MAX_QUERY_CHARS, MAX_TEMPERATURE, MAX_TOKENS_LIMIT,
};
