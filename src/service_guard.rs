//! # Service Guard Module
//!
//! Wraps calls to external services with a per-attempt timeout, retries with
//! exponential backoff and random jitter, and a circuit breaker.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::circuit_breaker::CircuitBreaker;
use crate::config::RecoveryConfig;
use crate::service_errors::ServiceError;

/// Protection layer shared by all calls to one external service
#[derive(Debug)]
pub struct ServiceGuard {
    name: &'static str,
    config: RecoveryConfig,
    breaker: CircuitBreaker,
}

impl ServiceGuard {
    pub fn new(name: &'static str, config: RecoveryConfig) -> Self {
        Self {
            name,
            breaker: CircuitBreaker::new(config.clone()),
            config,
        }
    }

    #[cfg(test)]
    fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Run `operation` under the guard
    ///
    /// The closure is invoked once per attempt. Non-retryable errors are
    /// returned immediately; `NotFound` does not count against the breaker.
    pub async fn run<F, Fut, T>(&self, mut operation: F) -> Result<T, ServiceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let timeout = Duration::from_millis(self.config.operation_timeout_ms);
        let mut attempt = 0u32;

        loop {
            if self.breaker.is_open() {
                warn!(service = self.name, "Circuit breaker open, skipping call");
                return Err(ServiceError::CircuitOpen(self.name.to_string()));
            }

            let error = match tokio::time::timeout(timeout, operation()).await {
                Ok(Ok(value)) => {
                    self.breaker.record_success();
                    return Ok(value);
                }
                Ok(Err(e)) => e,
                Err(_) => ServiceError::Timeout(format!(
                    "{} did not answer within {}ms",
                    self.name, self.config.operation_timeout_ms
                )),
            };

            if !error.counts_as_failure() {
                self.breaker.record_success();
                return Err(error);
            }
            self.breaker.record_failure();

            if !error.is_retryable() || attempt >= self.config.max_retries {
                warn!(service = self.name, attempt, error = %error, "External call failed");
                return Err(error);
            }

            let delay = self.retry_delay(attempt);
            debug!(service = self.name, attempt, delay_ms = delay.as_millis() as u64, error = %error, "Retrying external call");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Exponential backoff capped at `max_retry_delay_ms`, plus up to 50% jitter
    fn retry_delay(&self, attempt: u32) -> Duration {
        let base = self.config.base_retry_delay_ms;
        let exponential = base.saturating_mul(1u64 << attempt.min(16));
        let capped = exponential.min(self.config.max_retry_delay_ms);
        let jitter = if base > 1 {
            rand::thread_rng().gen_range(0..=base / 2)
        } else {
            0
        };
        Duration::from_millis(capped + jitter)
    }
}
