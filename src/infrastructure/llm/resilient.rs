//! Resilience wrapper around a single provider adapter
//!
//! Order per invoke: rate limiter, circuit breaker gate, then a
//! timeout-bounded call inside the retry loop. The breaker sees one outcome
//! per invoke, after retries are exhausted.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::domain::resilience::{
    CircuitBreaker, CircuitSnapshot, ResilienceConfig, RetryPolicy, SlidingWindowRateLimiter,
};
use crate::domain::usage::{CallOutcome, TokenCount, UsageObserver};
use crate::domain::{Completion, CompletionRequest, DomainError, LlmProvider, ProviderCallResult};
use crate::infrastructure::observability::metrics::{record_circuit_state, record_rate_limited};

/// Provider health as exposed by the providers endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub name: String,
    pub default_model: String,
    pub circuit: CircuitSnapshot,
    pub requests_in_window: usize,
    pub rate_limit_rpm: u32,
}

/// One long-lived wrapper per provider
pub struct ResilientProvider {
    name: String,
    inner: Arc<dyn LlmProvider>,
    retry: RetryPolicy,
    timeout: Duration,
    breaker: CircuitBreaker,
    limiter: SlidingWindowRateLimiter,
    observer: Option<Arc<dyn UsageObserver>>,
}

impl std::fmt::Debug for ResilientProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientProvider")
            .field("name", &self.name)
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .field("breaker", &self.breaker)
            .finish()
    }
}

impl ResilientProvider {
    pub fn new(inner: Arc<dyn LlmProvider>, config: &ResilienceConfig) -> Self {
        let name = inner.provider_name().to_lowercase();

        Self {
            retry: config.retry_policy(),
            timeout: config.timeout(),
            breaker: CircuitBreaker::new(&name, config.failure_threshold, config.cooldown()),
            limiter: SlidingWindowRateLimiter::per_minute(&name, config.rate_limit_rpm)
                .with_mode(config.rate_limit_mode)
                .with_max_wait(config.rate_limit_max_wait()),
            observer: None,
            inner,
            name,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn UsageObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_circuit_breaker(mut self, breaker: CircuitBreaker) -> Self {
        self.breaker = breaker;
        self
    }

    pub fn with_rate_limiter(mut self, limiter: SlidingWindowRateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_model(&self) -> &str {
        self.inner.default_model()
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Run one request through rate limiting, circuit breaking, timeout and retry
    pub async fn invoke(
        &self,
        request: &CompletionRequest,
    ) -> Result<ProviderCallResult, DomainError> {
        let start = Instant::now();

        if let Err(e) = self.limiter.acquire().await {
            record_rate_limited(&self.name);
            self.report_failure(request, &e, start, 0);
            return Err(e);
        }

        let permit = match self.breaker.try_acquire() {
            Ok(permit) => permit,
            Err(e) => {
                tracing::debug!(provider = %self.name, "Circuit open, call rejected");
                self.report_failure(request, &e, start, 0);
                return Err(e);
            }
        };

        let (result, attempts) = self.call_with_retry(request).await;

        match &result {
            Ok(_) => permit.success(),
            Err(e) if e.is_retryable() || matches!(e, DomainError::MaxRetriesExceeded { .. }) => {
                permit.failure()
            }
            Err(_) => permit.neutral(),
        }
        record_circuit_state(&self.name, self.breaker.state().as_gauge());

        match result {
            Ok(completion) => {
                let tokens = TokenCount::resolve(
                    completion.usage.as_ref(),
                    &self.name,
                    &request.prompt,
                    &completion.text,
                );
                let model_id = if completion.model.is_empty() {
                    request.model.clone()
                } else {
                    completion.model
                };
                let latency = start.elapsed();

                if let Some(observer) = &self.observer {
                    observer.record(&CallOutcome::succeeded(
                        &self.name, &model_id, tokens, latency, attempts,
                    ));
                }

                Ok(ProviderCallResult {
                    text: completion.text,
                    tokens,
                    latency_ms: latency.as_millis() as u64,
                    provider_id: self.name.clone(),
                    model_id,
                    attempts,
                })
            }
            Err(e) => {
                self.report_failure(request, &e, start, attempts);
                Err(e)
            }
        }
    }

    async fn call_with_retry(
        &self,
        request: &CompletionRequest,
    ) -> (Result<Completion, DomainError>, u32) {
        let max_attempts = self.retry.max_attempts().max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let outcome = match tokio::time::timeout(self.timeout, self.inner.complete(request)).await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(DomainError::provider_timeout(&self.name, self.timeout)),
            };

            match outcome {
                Ok(completion) => return (Ok(completion), attempt),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.retry.delay_for_retry(attempt - 1);
                    tracing::warn!(
                        provider = %self.name,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retryable provider failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                // Only wrap once a retry was actually spent; a single-attempt
                // policy surfaces the underlying failure unchanged.
                Err(e) if e.is_retryable() && attempt > 1 => {
                    return (
                        Err(DomainError::max_retries_exceeded(&self.name, attempt, e)),
                        attempt,
                    );
                }
                Err(e) => return (Err(e), attempt),
            }
        }
    }

    fn report_failure(
        &self,
        request: &CompletionRequest,
        error: &DomainError,
        start: Instant,
        attempts: u32,
    ) {
        tracing::warn!(
            provider = %self.name,
            model = %request.model,
            attempts,
            error_kind = error.kind(),
            error = %error,
            "Provider invocation failed"
        );

        if let Some(observer) = &self.observer {
            observer.record(&CallOutcome::failed(
                &self.name,
                &request.model,
                error.kind(),
                start.elapsed(),
                attempts,
            ));
        }
    }

    pub async fn status(&self) -> ProviderStatus {
        ProviderStatus {
            name: self.name.clone(),
            default_model: self.default_model().to_string(),
            circuit: self.breaker.snapshot(),
            requests_in_window: self.limiter.in_window().await,
            rate_limit_rpm: self.limiter.limit(),
        }
    }

    /// Admin reset of the breaker
    pub fn reset(&self) {
        self.breaker.reset();
        record_circuit_state(&self.name, self.breaker.state().as_gauge());
    }
}
