//! Per-provider circuit breaker

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::domain::DomainError;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }

    /// Gauge value: 0 closed, 1 open, 2 half-open
    pub fn as_gauge(&self) -> f64 {
        match self {
            Self::Closed => 0.0,
            Self::Open => 1.0,
            Self::HalfOpen => 2.0,
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failures: u32,
    last_change: Instant,
    trial_in_flight: bool,
}

impl BreakerInner {
    fn transition(&mut self, provider: &str, to: CircuitState) {
        if self.state != to {
            tracing::info!(
                provider = %provider,
                from = self.state.as_str(),
                to = to.as_str(),
                "Circuit breaker state change"
            );
        }

        self.state = to;
        self.last_change = Instant::now();
    }
}

/// Point-in-time view of a breaker
#[derive(Debug, Clone, Serialize)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    pub seconds_since_change: u64,
}

/// Closed → Open after `failure_threshold` consecutive failures, Open →
/// HalfOpen once `cooldown` has elapsed, HalfOpen admits exactly one trial.
#[derive(Debug)]
pub struct CircuitBreaker {
    provider: String,
    failure_threshold: u32,
    cooldown: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(provider: impl Into<String>, failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            provider: provider.into(),
            failure_threshold,
            cooldown,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failures: 0,
                last_change: Instant::now(),
                trial_in_flight: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Gate a call. The returned permit must be settled with the call outcome;
    /// dropping it unsettled counts as neither success nor failure.
    pub fn try_acquire(&self) -> Result<CircuitPermit<'_>, DomainError> {
        let mut inner = self.lock();

        let trial = match inner.state {
            CircuitState::Closed => false,
            CircuitState::Open if inner.last_change.elapsed() >= self.cooldown => {
                inner.transition(&self.provider, CircuitState::HalfOpen);
                inner.trial_in_flight = true;
                true
            }
            CircuitState::Open => return Err(DomainError::circuit_open(&self.provider)),
            CircuitState::HalfOpen if inner.trial_in_flight => {
                return Err(DomainError::circuit_open(&self.provider));
            }
            CircuitState::HalfOpen => {
                inner.trial_in_flight = true;
                true
            }
        };

        Ok(CircuitPermit {
            breaker: self,
            trial,
            settled: false,
        })
    }

    /// Current state; an Open breaker past its cooldown reports HalfOpen
    pub fn state(&self) -> CircuitState {
        let inner = self.lock();

        match inner.state {
            CircuitState::Open if inner.last_change.elapsed() >= self.cooldown => {
                CircuitState::HalfOpen
            }
            state => state,
        }
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failures
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let failure_count;
        let seconds_since_change;
        {
            let inner = self.lock();
            failure_count = inner.failures;
            seconds_since_change = inner.last_change.elapsed().as_secs();
        }

        CircuitSnapshot {
            state: self.state(),
            failure_count,
            seconds_since_change,
        }
    }

    /// Admin reset: back to Closed with a zero failure count
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.failures = 0;
        inner.trial_in_flight = false;
        inner.transition(&self.provider, CircuitState::Closed);
    }

    fn on_success(&self, trial: bool) {
        let mut inner = self.lock();

        if trial {
            inner.trial_in_flight = false;
            inner.failures = 0;
            inner.transition(&self.provider, CircuitState::Closed);
        } else if inner.state == CircuitState::Closed {
            inner.failures = 0;
        }
    }

    fn on_failure(&self, trial: bool) {
        let mut inner = self.lock();

        if trial {
            inner.trial_in_flight = false;
            inner.transition(&self.provider, CircuitState::Open);
            return;
        }

        if inner.state != CircuitState::Closed {
            return;
        }

        inner.failures += 1;

        if inner.failures >= self.failure_threshold {
            tracing::warn!(
                provider = %self.provider,
                failures = inner.failures,
                cooldown_secs = self.cooldown.as_secs(),
                "Circuit breaker opened"
            );
            inner.transition(&self.provider, CircuitState::Open);
        }
    }

    fn on_release(&self, trial: bool) {
        if trial {
            self.lock().trial_in_flight = false;
        }
    }
}

/// Admission ticket for one gated call
#[derive(Debug)]
pub struct CircuitPermit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl CircuitPermit<'_> {
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn success(mut self) {
        self.settled = true;
        self.breaker.on_success(self.trial);
    }

    pub fn failure(mut self) {
        self.settled = true;
        self.breaker.on_failure(self.trial);
    }

    /// Outcome says nothing about provider health (caller fault, rate limit)
    pub fn neutral(mut self) {
        self.settled = true;
        self.breaker.on_release(self.trial);
    }
}

impl Drop for CircuitPermit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.on_release(self.trial);
        }
    }
}
