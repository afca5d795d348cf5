//! Request rate limiting using a minimum inter-request interval
//!
//! The RateLimiter serializes callers through a single timeline so that no
//! two grants happen closer together than the configured interval.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Minimum-interval rate limiter shared across callers
///
/// # Algorithm
///
/// - `last_grant` records when the previous caller was let through
/// - On `acquire`, the caller waits `max(0, min_interval - (now - last_grant))`
/// - After the wait, `last_grant` is set to the current time
///
/// The read-wait-write sequence runs while holding a `tokio::sync::Mutex`.
/// That mutex is fair, so concurrent callers are granted in arrival order and
/// the i-th grant is never earlier than `min_interval` after the (i-1)-th.
///
/// Cloning produces a handle to the same timeline.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    /// Minimum interval between grants, in nanoseconds
    min_interval_nanos: Arc<AtomicU64>,
    /// Time of the last grant (None until the first acquire)
    last_grant: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    /// Create a limiter allowing `ops_per_second` operations per second
    ///
    /// Non-finite or non-positive rates are treated as "unlimited" (zero interval);
    /// configuration validation keeps those out of the controller.
    ///
    /// # Examples
    ///
    /// ```
    /// use listing_collector::rate_limiter::RateLimiter;
    /// use std::time::Duration;
    ///
    /// // One request every two seconds
    /// let limiter = RateLimiter::new(0.5);
    /// assert_eq!(limiter.min_interval(), Duration::from_secs(2));
    /// ```
    #[must_use]
    pub fn new(ops_per_second: f64) -> Self {
        let interval = if ops_per_second.is_finite() && ops_per_second > 0.0 {
            Duration::from_secs_f64(1.0 / ops_per_second)
        } else {
            Duration::ZERO
        };
        Self::with_interval(interval)
    }

    /// Create a limiter with an explicit minimum interval between operations
    #[must_use]
    pub fn with_interval(min_interval: Duration) -> Self {
        Self {
            min_interval_nanos: Arc::new(AtomicU64::new(duration_to_nanos(min_interval))),
            last_grant: Arc::new(Mutex::new(None)),
        }
    }

    /// Change the minimum interval; applies to the next grant
    pub fn set_interval(&self, min_interval: Duration) {
        self.min_interval_nanos
            .store(duration_to_nanos(min_interval), Ordering::SeqCst);
    }

    /// Current minimum interval between grants
    pub fn min_interval(&self) -> Duration {
        Duration::from_nanos(self.min_interval_nanos.load(Ordering::SeqCst))
    }

    /// Wait until the caller may proceed
    ///
    /// The first call is granted immediately. Cancel-safe: dropping the future
    /// while it waits releases the lock without recording a grant.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use listing_collector::rate_limiter::RateLimiter;
    ///
    /// # async fn example() {
    /// let limiter = RateLimiter::new(0.5);
    /// limiter.acquire().await;
    /// // ... perform request ...
    /// # }
    /// ```
    pub async fn acquire(&self) {
        let mut last_grant = self.last_grant.lock().await;

        if let Some(last) = *last_grant {
            let interval = self.min_interval();
            let elapsed = last.elapsed();
            if elapsed < interval {
                let delay = interval - elapsed;
                tracing::trace!(delay_ms = delay.as_millis() as u64, "Rate limiter delaying request");
                tokio::time::sleep(delay).await;
            }
        }

        *last_grant = Some(Instant::now());
    }
}

fn duration_to_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_converts_to_interval() {
        assert_eq!(RateLimiter::new(0.5).min_interval(), Duration::from_secs(2));
        assert_eq!(RateLimiter::new(4.0).min_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_invalid_rate_is_unlimited() {
        assert_eq!(RateLimiter::new(0.0).min_interval(), Duration::ZERO);
        assert_eq!(RateLimiter::new(-3.0).min_interval(), Duration::ZERO);
        assert_eq!(RateLimiter::new(f64::NAN).min_interval(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_first_acquire_is_immediate() {
        let limiter = RateLimiter::with_interval(Duration::from_secs(10));

        let start = std::time::Instant::now();
        limiter.acquire().await;

        assert!(
            start.elapsed() < Duration::from_millis(50),
            "first acquire should not wait, took {:?}",
            start.elapsed()
        );
    }

    #[tokio::test]
    async fn test_consecutive_acquires_respect_interval() {
        // 5 acquires at 10/s => at least 4 * 100ms
        let limiter = RateLimiter::new(10.0);
        let n = 5;

        let start = std::time::Instant::now();
        for _ in 0..n {
            limiter.acquire().await;
        }
        let elapsed = start.elapsed();

        let min = Duration::from_millis(100 * (n - 1));
        assert!(
            elapsed >= min,
            "{n} acquires finished in {elapsed:?}, expected at least {min:?}"
        );
        assert!(
            elapsed < min * 4,
            "{n} acquires took too long: {elapsed:?}"
        );
    }

    #[tokio::test]
    async fn test_no_wait_when_interval_already_elapsed() {
        let limiter = RateLimiter::with_interval(Duration::from_millis(50));
        limiter.acquire().await;
        tokio::time::sleep(Duration::from_millis(80)).await;

        let start = std::time::Instant::now();
        limiter.acquire().await;
        assert!(
            start.elapsed() < Duration::from_millis(30),
            "acquire after the interval elapsed should be immediate, took {:?}",
            start.elapsed()
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_are_spaced() {
        let interval = Duration::from_millis(60);
        let limiter = RateLimiter::with_interval(interval);
        let grants = Arc::new(std::sync::Mutex::new(Vec::new()));

        let mut handles = vec![];
        for _ in 0..4 {
            let limiter = limiter.clone();
            let grants = grants.clone();
            handles.push(tokio::spawn(async move {
                limiter.acquire().await;
                grants.lock().unwrap().push(std::time::Instant::now());
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut grants = grants.lock().unwrap().clone();
        grants.sort();
        for pair in grants.windows(2) {
            let gap = pair[1] - pair[0];
            // Small tolerance for the gap between grant and timestamp capture
            assert!(
                gap >= interval - Duration::from_millis(10),
                "grants only {gap:?} apart, expected ~{interval:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_set_interval_applies_to_next_grant() {
        let limiter = RateLimiter::with_interval(Duration::from_secs(10));
        limiter.acquire().await;

        limiter.set_interval(Duration::from_millis(20));
        assert_eq!(limiter.min_interval(), Duration::from_millis(20));

        let result = tokio::time::timeout(Duration::from_secs(1), limiter.acquire()).await;
        assert!(result.is_ok(), "acquire should use the shortened interval");
    }

    #[tokio::test]
    async fn test_dropped_acquire_does_not_record_grant() {
        let limiter = RateLimiter::with_interval(Duration::from_millis(300));
        limiter.acquire().await;

        // Abandon a waiting acquire
        let abandoned = tokio::time::timeout(Duration::from_millis(50), limiter.acquire()).await;
        assert!(abandoned.is_err());

        // The next acquire is measured from the first grant, not the abandoned one
        let start = std::time::Instant::now();
        limiter.acquire().await;
        assert!(
            start.elapsed() < Duration::from_millis(300),
            "abandoned acquire must not push back the timeline, waited {:?}",
            start.elapsed()
        );
    }

    #[test]
    fn test_clone_shares_state() {
        let original = RateLimiter::with_interval(Duration::from_secs(1));
        let clone = original.clone();

        clone.set_interval(Duration::from_millis(5));
        assert_eq!(original.min_interval(), Duration::from_millis(5));
    }
}
