//! Timeout and exponential-backoff retry wrappers for single async operations.
//!
//! Timeouts cancel the wrapped future: when the timer wins, the operation is dropped
//! at its current await point rather than left running in the background.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tracing::warn;

/// Produced when an operation does not finish within its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation timed out after {}ms", .0.as_millis())]
pub struct TimedOut(pub Duration);

/// Runs `operation` with a deadline. The error type absorbs [`TimedOut`].
pub async fn with_timeout<T, E, Fut>(operation: Fut, limit: Duration) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
    E: From<TimedOut>,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => Err(TimedOut(limit).into()),
    }
}

#[derive(Debug, Clone)]
pub struct RetryOptions {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Per-attempt deadline. `None` disables the timeout.
    pub timeout: Option<Duration>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(5000),
            timeout: Some(Duration::from_millis(30_000)),
        }
    }
}

impl RetryOptions {
    /// Longest time `with_retry` can take: every attempt hits its timeout and
    /// every backoff hits `max_delay`. `None` when attempts are unbounded in time.
    pub fn worst_case(&self) -> Option<Duration> {
        let attempts = self.max_attempts.max(1);
        let per_attempt = self.timeout?;
        Some(
            per_attempt
                .saturating_mul(attempts)
                .saturating_add(self.max_delay.saturating_mul(attempts - 1)),
        )
    }
}

/// Backoff before retrying after `attempt` (1-based) failed:
/// `min(base * 1.5^(attempt-1) * jitter, max)`.
pub fn backoff_delay(attempt: u32, options: &RetryOptions, jitter: f64) -> Duration {
    let exponent = attempt.saturating_sub(1) as i32;
    let millis = options.base_delay.as_millis() as f64 * 1.5_f64.powi(exponent) * jitter;
    let capped = millis.round().min(options.max_delay.as_millis() as f64).max(0.0);
    Duration::from_millis(capped as u64)
}

/// Calls `operation(attempt)` until it succeeds or `max_attempts` is exhausted.
///
/// Each attempt is bounded by `options.timeout`. After the final failure the last
/// error is returned unchanged.
pub async fn with_retry<T, E, F, Fut>(operation: F, options: &RetryOptions) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<TimedOut> + std::fmt::Display,
{
    with_retry_if(operation, options, |_| true).await
}

/// Like [`with_retry`], but an error for which `retryable` returns false is
/// returned immediately.
pub async fn with_retry_if<T, E, F, Fut, P>(
    mut operation: F,
    options: &RetryOptions,
    retryable: P,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<TimedOut> + std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = options.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let result = match options.timeout {
            Some(limit) => with_timeout(operation(attempt), limit).await,
            None => operation(attempt).await,
        };

        let error = match result {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if attempt >= max_attempts || !retryable(&error) {
            return Err(error);
        }

        let jitter = rand::thread_rng().gen_range(0.8..=1.2);
        let delay = backoff_delay(attempt, options, jitter);
        warn!(
            "Attempt {attempt}/{max_attempts} failed: {error}; retrying after {}ms",
            delay.as_millis()
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
