//! Resilience configuration shared by every provider, with per-provider overrides

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::RetryPolicy;
use crate::domain::DomainError;

/// Behaviour when the requests-per-minute ceiling is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitMode {
    /// Wait (bounded) until the window frees capacity
    #[default]
    Block,
    /// Fail immediately with `RateLimited`
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// Total attempts per invoke, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    #[serde(default = "default_jitter_ratio")]
    pub jitter_ratio: f64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    #[serde(default = "default_rate_limit_rpm")]
    pub rate_limit_rpm: u32,
    #[serde(default = "default_rate_limit_max_wait_ms")]
    pub rate_limit_max_wait_ms: u64,
    #[serde(default)]
    pub rate_limit_mode: RateLimitMode,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_jitter_ratio() -> f64 {
    0.1
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_cooldown_secs() -> u64 {
    60
}

fn default_rate_limit_rpm() -> u32 {
    500
}

fn default_rate_limit_max_wait_ms() -> u64 {
    5000
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter_ratio: default_jitter_ratio(),
            timeout_ms: default_timeout_ms(),
            failure_threshold: default_failure_threshold(),
            cooldown_secs: default_cooldown_secs(),
            rate_limit_rpm: default_rate_limit_rpm(),
            rate_limit_max_wait_ms: default_rate_limit_max_wait_ms(),
            rate_limit_mode: RateLimitMode::default(),
        }
    }
}

impl ResilienceConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts)
            .with_initial_delay(Duration::from_millis(self.initial_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_multiplier(self.backoff_multiplier)
            .with_jitter_ratio(self.jitter_ratio)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn rate_limit_max_wait(&self) -> Duration {
        Duration::from_millis(self.rate_limit_max_wait_ms)
    }

    /// Copy of this config with every set override applied
    pub fn merged(&self, overrides: &ResilienceOverrides) -> Self {
        Self {
            max_attempts: overrides.max_attempts.unwrap_or(self.max_attempts),
            initial_delay_ms: overrides.initial_delay_ms.unwrap_or(self.initial_delay_ms),
            max_delay_ms: overrides.max_delay_ms.unwrap_or(self.max_delay_ms),
            backoff_multiplier: overrides
                .backoff_multiplier
                .unwrap_or(self.backoff_multiplier),
            jitter_ratio: overrides.jitter_ratio.unwrap_or(self.jitter_ratio),
            timeout_ms: overrides.timeout_ms.unwrap_or(self.timeout_ms),
            failure_threshold: overrides.failure_threshold.unwrap_or(self.failure_threshold),
            cooldown_secs: overrides.cooldown_secs.unwrap_or(self.cooldown_secs),
            rate_limit_rpm: overrides.rate_limit_rpm.unwrap_or(self.rate_limit_rpm),
            rate_limit_max_wait_ms: overrides
                .rate_limit_max_wait_ms
                .unwrap_or(self.rate_limit_max_wait_ms),
            rate_limit_mode: overrides.rate_limit_mode.unwrap_or(self.rate_limit_mode),
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.max_attempts == 0 {
            return Err(DomainError::configuration("max_attempts must be at least 1"));
        }

        if self.rate_limit_rpm == 0 {
            return Err(DomainError::configuration(
                "rate_limit_rpm must be greater than 0",
            ));
        }

        if self.failure_threshold == 0 {
            return Err(DomainError::configuration(
                "failure_threshold must be greater than 0",
            ));
        }

        if self.timeout_ms == 0 {
            return Err(DomainError::configuration("timeout_ms must be greater than 0"));
        }

        self.retry_policy().validate()
    }
}

/// Per-provider overrides; unset fields inherit the shared defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceOverrides {
    pub max_attempts: Option<u32>,
    pub initial_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub backoff_multiplier: Option<f64>,
    pub jitter_ratio: Option<f64>,
    pub timeout_ms: Option<u64>,
    pub failure_threshold: Option<u32>,
    pub cooldown_secs: Option<u64>,
    pub rate_limit_rpm: Option<u32>,
    pub rate_limit_max_wait_ms: Option<u64>,
    pub rate_limit_mode: Option<RateLimitMode>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ResilienceConfig::default();

        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.cooldown(), Duration::from_secs(60));
        assert_eq!(config.rate_limit_rpm, 500);
        assert_eq!(config.rate_limit_mode, RateLimitMode::Block);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_merge_overrides() {
        let overrides: ResilienceOverrides =
            serde_json::from_str(r#"{"rate_limit_rpm": 50, "rate_limit_mode": "fail"}"#).unwrap();

        let merged = ResilienceConfig::default().merged(&overrides);

        assert_eq!(merged.rate_limit_rpm, 50);
        assert_eq!(merged.rate_limit_mode, RateLimitMode::Fail);
        assert_eq!(merged.max_attempts, 3);
    }

    #[test]
    fn test_validation_rejects_zero_values() {
        let zero_rpm = ResilienceConfig {
            rate_limit_rpm: 0,
            ..Default::default()
        };
        let zero_attempts = ResilienceConfig {
            max_attempts: 0,
            ..Default::default()
        };
        let zero_threshold = ResilienceConfig {
            failure_threshold: 0,
            ..Default::default()
        };

        assert!(zero_rpm.validate().is_err());
        assert!(zero_attempts.validate().is_err());
        assert!(zero_threshold.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_jitter() {
        let config = ResilienceConfig {
            jitter_ratio: 1.5,
            ..Default::default()
        };

        assert!(matches!(
            config.validate(),
            Err(DomainError::Configuration { .. })
        ));
    }
}
