//! Sliding window rate limiter
//!
//! Keeps the timestamps of admitted requests for the last window and refuses
//! (or delays) requests once the ceiling is reached.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use super::RateLimitMode;
use crate::domain::DomainError;

/// Window used for requests-per-minute ceilings
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub struct SlidingWindowRateLimiter {
    provider: String,
    limit: u32,
    window: Duration,
    mode: RateLimitMode,
    max_wait: Duration,
    admitted: Mutex<VecDeque<Instant>>,
}

impl SlidingWindowRateLimiter {
    /// Requests-per-minute limiter
    pub fn per_minute(provider: impl Into<String>, rpm: u32) -> Self {
        Self::new(provider, rpm, RATE_LIMIT_WINDOW)
    }

    pub fn new(provider: impl Into<String>, limit: u32, window: Duration) -> Self {
        Self {
            provider: provider.into(),
            limit,
            window,
            mode: RateLimitMode::Block,
            max_wait: Duration::from_millis(5000),
            admitted: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_mode(mut self, mode: RateLimitMode) -> Self {
        self.mode = mode;
        self
    }

    /// Longest a blocking acquire may wait before giving up
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Admit one request, waiting (bounded) or failing per the configured mode
    pub async fn acquire(&self) -> Result<(), DomainError> {
        let deadline = Instant::now() + self.max_wait;

        loop {
            let wait = match self.try_admit().await {
                Ok(()) => return Ok(()),
                Err(wait) => wait,
            };

            if self.mode == RateLimitMode::Fail || Instant::now() + wait > deadline {
                tracing::debug!(
                    provider = %self.provider,
                    limit = self.limit,
                    retry_after_ms = wait.as_millis() as u64,
                    "Rate limit reached"
                );
                return Err(DomainError::rate_limited(&self.provider, wait));
            }

            tokio::time::sleep(wait).await;
        }
    }

    /// Admits now, or returns how long until the oldest request leaves the window
    async fn try_admit(&self) -> Result<(), Duration> {
        let mut admitted = self.admitted.lock().await;
        let now = Instant::now();

        Self::prune(&mut admitted, now, self.window);

        if (admitted.len() as u32) < self.limit {
            admitted.push_back(now);
            return Ok(());
        }

        let wait = admitted
            .front()
            .map(|oldest| (*oldest + self.window).saturating_duration_since(now))
            .unwrap_or(self.window);

        // Never spin on a zero-length wait
        Err(wait.max(Duration::from_millis(1)))
    }

    /// Requests admitted within the current window
    pub async fn in_window(&self) -> usize {
        let mut admitted = self.admitted.lock().await;
        Self::prune(&mut admitted, Instant::now(), self.window);
        admitted.len()
    }

    fn prune(admitted: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(oldest) = admitted.front() {
            if now.duration_since(*oldest) >= window {
                admitted.pop_front();
            } else {
                break;
            }
        }
    }
}
