use std::time::Duration;

use rand::Rng;

use crate::domain::DomainError;

/// Exponential backoff with bounded multiplicative jitter
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter_ratio: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(60_000),
            multiplier: 2.0,
            jitter_ratio: 0.1,
        }
    }
}

impl RetryPolicy {
    /// `max_attempts` counts every attempt, including the first
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_jitter_ratio(mut self, ratio: f64) -> Self {
        self.jitter_ratio = ratio;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before retry `retry` (0 = the first retry), with random jitter
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let jitter = if self.jitter_ratio > 0.0 {
            rand::thread_rng().gen_range(0.0..=self.jitter_ratio)
        } else {
            0.0
        };

        self.delay_with_jitter(retry, jitter)
    }

    /// `min(max_delay, initial * multiplier^retry * (1 + jitter))`
    pub fn delay_with_jitter(&self, retry: u32, jitter: f64) -> Duration {
        let jitter = jitter.clamp(0.0, self.jitter_ratio.max(0.0));
        let base = self.initial_delay.as_millis() as f64 * self.multiplier.powi(retry as i32);
        let delay_ms = (base * (1.0 + jitter)).min(self.max_delay.as_millis() as f64);

        Duration::from_millis(delay_ms as u64)
    }

    /// Delays stay non-decreasing only while `multiplier >= 1 + jitter_ratio`
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.max_attempts == 0 {
            return Err(DomainError::configuration("max_attempts must be at least 1"));
        }

        if !(0.0..=1.0).contains(&self.jitter_ratio) {
            return Err(DomainError::configuration(format!(
                "jitter_ratio must be between 0.0 and 1.0, got {}",
                self.jitter_ratio
            )));
        }

        if self.multiplier < 1.0 + self.jitter_ratio {
            return Err(DomainError::configuration(format!(
                "backoff_multiplier must be at least 1 + jitter_ratio ({}), got {}",
                1.0 + self.jitter_ratio,
                self.multiplier
            )));
        }

        if self.max_delay < self.initial_delay {
            return Err(DomainError::configuration(
                "max_delay_ms must not be smaller than initial_delay_ms",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_without_jitter() {
        let policy = RetryPolicy::new(5).with_jitter_ratio(0.0);

        assert_eq!(policy.delay_for_retry(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_retry(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for_retry(2), Duration::from_millis(4000));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let policy = RetryPolicy::new(10)
            .with_max_delay(Duration::from_millis(5000))
            .with_jitter_ratio(0.0);

        assert_eq!(policy.delay_for_retry(8), Duration::from_millis(5000));
    }

    #[test]
    fn test_jitter_bounded() {
        let policy = RetryPolicy::default();

        for _ in 0..100 {
            let delay = policy.delay_for_retry(0);
            assert!(delay >= Duration::from_millis(1000));
            assert!(delay <= Duration::from_millis(1100));
        }
    }

    #[test]
    fn test_delays_non_decreasing_at_jitter_extremes() {
        let policy = RetryPolicy::new(8);

        for retry in 0..12 {
            let worst_now = policy.delay_with_jitter(retry, 0.1);
            let best_next = policy.delay_with_jitter(retry + 1, 0.0);
            assert!(best_next >= worst_now, "retry {} regressed", retry);
        }
    }

    #[test]
    fn test_sampled_delays_non_decreasing() {
        let policy = RetryPolicy::new(6).with_jitter_ratio(1.0);
        let delays: Vec<Duration> = (0..6).map(|n| policy.delay_for_retry(n)).collect();

        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_validate() {
        assert!(RetryPolicy::default().validate().is_ok());
        assert!(RetryPolicy::new(0).validate().is_err());
        assert!(RetryPolicy::default().with_jitter_ratio(1.2).validate().is_err());
        assert!(RetryPolicy::default()
            .with_multiplier(1.05)
            .validate()
            .is_err());
    }
}
