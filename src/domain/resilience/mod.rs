//! Rate limiting, retry and circuit breaking primitives

mod circuit_breaker;
mod config;
mod rate_limiter;
mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitPermit, CircuitSnapshot, CircuitState};
pub use config::{RateLimitMode, ResilienceConfig, ResilienceOverrides};
pub use rate_limiter::{SlidingWindowRateLimiter, RATE_LIMIT_WINDOW};
pub use retry::RetryPolicy;
