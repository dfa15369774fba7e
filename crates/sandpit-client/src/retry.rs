//! Retry engine for transient failures.
//!
//! Wraps a caller-supplied future-producing closure and re-invokes it on
//! retryable errors, backing off between attempts. A server-supplied
//! `Retry-After` hint always overrides the local backoff math: the server
//! knows better than an exponential curve when it will accept traffic again.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use sandpit_core::{Result, RetryConfig, RetryStrategy, SandpitError};
use tracing::debug;

/// Executes operations under a [`RetryConfig`]
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Build a policy from configuration
    #[must_use]
    pub const fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Backoff delay after a failed attempt `attempt` (1-based), before any
    /// server hint or jitter is applied
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let initial = self.config.initial_delay.as_secs_f64();
        let raw = match self.config.strategy {
            RetryStrategy::Exponential => {
                initial * self.config.backoff_factor.powi(attempt.saturating_sub(1) as i32)
            }
            RetryStrategy::Linear => initial * f64::from(attempt),
        };
        Duration::from_secs_f64(raw.min(self.config.max_delay.as_secs_f64()))
    }

    /// Delay before the attempt following `attempt`, honoring a server
    /// `Retry-After` hint over local math. Jitter is applied only to
    /// locally computed delays; a server hint is used exactly.
    fn delay_after(&self, attempt: u32, error: &SandpitError) -> Duration {
        if let Some(hint) = error.retry_after() {
            return Duration::from_secs_f64(hint.max(0.0));
        }
        let mut delay = self.backoff_for(attempt);
        if self.config.jitter {
            let factor = rand::thread_rng().gen_range(0.5..=1.5);
            delay = delay.mul_f64(factor);
        }
        delay
    }

    /// Run `op` up to `max_attempts` times.
    ///
    /// Terminal errors (auth, not-found, validation, malformed response)
    /// propagate on first occurrence. Transient errors that persist through
    /// every attempt surface as [`SandpitError::RetryExhausted`] wrapping
    /// the last one, so callers can tell "the operation is rejected" from
    /// "we gave up on a transient condition".
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if !self.config.enabled {
            return op().await;
        }

        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => {
                    if attempt >= max_attempts {
                        return Err(SandpitError::RetryExhausted {
                            attempts: attempt,
                            source: Box::new(err),
                        });
                    }
                    let delay = self.delay_after(attempt, &err);
                    debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying after transient failure"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
