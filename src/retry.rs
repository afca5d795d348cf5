//! Retry logic with exponential backoff
//!
//! Page fetches that fail transiently can be retried a bounded number of
//! times. The policy is off by default (`max_attempts = 0`), in which case
//! every source error is fatal for the run.
//!
//! # Example
//!
//! ```no_run
//! use listing_collector::config::RetryConfig;
//! use listing_collector::retry::{IsRetryable, with_retry};
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         f.write_str("transient")
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() {
//! let config = RetryConfig { max_attempts: 3, ..Default::default() };
//! let cancel = CancellationToken::new();
//! let outcome = with_retry(&config, &cancel, |_| {}, || async {
//!     Ok::<_, MyError>(())
//! })
//! .await;
//! assert!(matches!(outcome, Some(Ok(()))));
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::FetchError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, resets, overloaded upstream) return `true`.
/// Permanent failures (rejected credential, malformed data) return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Unauthorized { .. } => false,
            // 429 Too Many Requests and every 5xx
            FetchError::ServerError { status, .. } => *status == 429 || (500..600).contains(status),
            FetchError::DecodeError { .. } => false,
            FetchError::TransportError { .. } => true,
        }
    }
}

/// Details of a scheduled retry, handed to the `on_retry` observer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryAttempt {
    /// Retry number, starting at 1
    pub attempt: u32,
    /// Configured retry budget
    pub max_attempts: u32,
    /// Wait before the retry, jitter included
    pub delay: Duration,
    /// Message of the error that triggered the retry
    pub error: String,
}

/// Execute an async operation with exponential backoff retry logic
///
/// `on_retry` is called once per scheduled retry, before the backoff wait.
/// The wait is raced against `cancel`; when the token fires the helper gives
/// up and returns `None`. Otherwise it returns the first success, the first
/// non-retryable error, or the last error once the budget is spent.
pub async fn with_retry<F, Fut, T, E, R>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut on_retry: R,
    mut operation: F,
) -> Option<Result<T, E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
    R: FnMut(RetryAttempt),
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "Operation succeeded after retry");
                }
                return Some(Ok(result));
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                attempt += 1;
                let delay = retry_delay(config, attempt);

                tracing::warn!(
                    error = %e,
                    attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Operation failed, retrying"
                );
                on_retry(RetryAttempt {
                    attempt,
                    max_attempts: config.max_attempts,
                    delay,
                    error: e.to_string(),
                });

                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!(attempt, "Retry backoff cancelled");
                        return None;
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            Err(e) => {
                if e.is_retryable() && config.max_attempts > 0 {
                    tracing::error!(
                        error = %e,
                        attempts = attempt + 1,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::debug!(error = %e, "Operation failed without retry");
                }
                return Some(Err(e));
            }
        }
    }
}

/// Backoff before retry number `attempt` (1-based), jitter applied if enabled
pub fn retry_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let delay = backoff_delay(config, attempt);
    if config.jitter {
        add_jitter(delay).min(config.max_delay)
    } else {
        delay
    }
}

/// Exponential backoff without jitter: `initial_delay * multiplier^(attempt-1)`,
/// capped at `max_delay`
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
    let secs = config.initial_delay.as_secs_f64() * config.backoff_multiplier.powi(exponent);
    if !secs.is_finite() || secs >= config.max_delay.as_secs_f64() {
        return config.max_delay;
    }
    Duration::from_secs_f64(secs)
}

/// Add random jitter to a delay
///
/// Jitter is uniformly distributed between 0% and 100% of the delay, so the
/// result lies between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
