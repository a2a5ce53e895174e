//! Retry/backoff controller.
//!
//! Wraps remote calls with exponential backoff and jitter. Classification is
//! the error's own business (`Transience`): network failures, 5xx, 429, and
//! expired backend auth retry; validation, access, and offset errors do not.
//! Jitter is only ever added, never subtracted, so delays stay at or above
//! the deterministic schedule and synchronized retry storms decorrelate.

use rand::Rng;
use std::future::Future;
use std::time::Duration;

use vidgate_core::{AppError, RetryConfig};
use vidgate_storage::StoreError;

use crate::time::Sleeper;

/// Jitter fraction of the computed delay, added uniformly in [0, MAX].
const JITTER_FRACTION: f64 = 0.1;

/// Errors classify themselves as transient (retry) or permanent (don't).
pub trait Transience {
    fn is_transient(&self) -> bool;
}

impl Transience for StoreError {
    fn is_transient(&self) -> bool {
        StoreError::is_transient(self)
    }
}

impl Transience for AppError {
    fn is_transient(&self) -> bool {
        AppError::is_transient(self)
    }
}

/// The error that ended a retried operation, annotated with how it ended.
#[derive(Debug)]
pub struct RetryError<E> {
    pub error: E,
    pub attempts: u32,
    /// True when the budget ran out on a transient error; false when a
    /// permanent error stopped the loop early.
    pub retries_exhausted: bool,
}

/// Backoff schedule: `delay = min(base * multiplier^(attempt-1), max)`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl RetryPolicy {
    /// Budget for control-plane calls (reserve, status, delete).
    pub fn control(config: &RetryConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.base_delay_ms),
            multiplier: config.multiplier,
            max_delay: Duration::from_millis(config.max_delay_ms),
            max_attempts: config.control_max_attempts,
        }
    }

    /// Budget for data-plane calls (chunk writes).
    pub fn data(config: &RetryConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.base_delay_ms),
            multiplier: config.multiplier,
            max_delay: Duration::from_millis(config.max_delay_ms),
            max_attempts: config.data_max_attempts,
        }
    }

    /// Deterministic (pre-jitter) delay before the retry following
    /// `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let delay_ms = self.base_delay.as_millis() as f64 * self.multiplier.powi(exponent as i32);
        let capped = delay_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Add uniform jitter in [0, JITTER_FRACTION * delay].
    pub fn jittered(&self, delay: Duration) -> Duration {
        let mut rng = rand::rng();
        let fraction: f64 = rng.random_range(0.0..=JITTER_FRACTION);
        delay + Duration::from_millis((delay.as_millis() as f64 * fraction) as u64)
    }
}

/// Run `operation` under `policy`, sleeping through `sleeper` between
/// attempts. The closure receives the 1-based attempt number.
pub async fn run_with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    operation_name: &str,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    E: Transience + std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1;
    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) if !error.is_transient() => {
                return Err(RetryError {
                    error,
                    attempts: attempt,
                    retries_exhausted: false,
                });
            }
            Err(error) if attempt >= policy.max_attempts => {
                tracing::warn!(
                    operation = operation_name,
                    attempts = attempt,
                    error = %error,
                    "Retry budget exhausted"
                );
                return Err(RetryError {
                    error,
                    attempts: attempt,
                    retries_exhausted: true,
                });
            }
            Err(error) => {
                let delay = policy.jittered(policy.delay_for_attempt(attempt));
                tracing::warn!(
                    operation = operation_name,
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Transient error, retrying"
                );
                sleeper.sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
