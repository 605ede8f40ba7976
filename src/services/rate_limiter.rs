//! Token bucket shared by every provider call, plus retry with backoff.

use rand::Rng;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::ProviderError;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket sized from a requests-per-minute budget.
///
/// Holds at most one second worth of tokens so bursts stay short, and refills
/// continuously at `requests_per_minute / 60_000` tokens per millisecond.
#[derive(Debug)]
pub struct RateLimiter {
    name: String,
    capacity: f64,
    refill_per_ms: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    pub fn new(name: impl Into<String>, requests_per_minute: u32) -> Self {
        let rpm = requests_per_minute.max(1) as f64;
        let capacity = (rpm / 60.0).ceil().max(1.0);

        Self {
            name: name.into(),
            capacity,
            refill_per_ms: rpm / 60_000.0,
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Wait until a token is available, then take it.
    pub async fn acquire(&self) {
        loop {
            let wait = match self.try_acquire() {
                Ok(()) => return,
                Err(wait) => wait,
            };

            debug!(
                limiter = %self.name,
                wait_ms = wait.as_millis() as u64,
                "Rate limited, waiting for token"
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Take a token if one is available, otherwise return how long until one is.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        let mut bucket = match self.bucket.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let now = Instant::now();
        let elapsed_ms = now.duration_since(bucket.last_refill).as_secs_f64() * 1000.0;
        bucket.tokens = (bucket.tokens + elapsed_ms * self.refill_per_ms).min(self.capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Ok(())
        } else {
            let missing = 1.0 - bucket.tokens;
            let wait_ms = (missing / self.refill_per_ms).ceil() as u64;
            Err(Duration::from_millis(wait_ms.clamp(10, 60_000)))
        }
    }

    /// Tokens currently in the bucket, without refilling.
    pub fn available(&self) -> f64 {
        match self.bucket.lock() {
            Ok(guard) => guard.tokens,
            Err(poisoned) => poisoned.into_inner().tokens,
        }
    }
}

/// Retry policy for rate-limited calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based), with up to 50% jitter.
    ///
    /// A provider-supplied retry-after wins over the computed backoff.
    pub fn delay_for(&self, attempt: u32, retry_after_secs: Option<u64>) -> Duration {
        if let Some(secs) = retry_after_secs {
            return Duration::from_secs(secs).min(self.max_delay);
        }

        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        let backoff = exp.min(self.max_delay);
        let jitter_ms = rand::thread_rng().gen_range(0..=backoff.as_millis() as u64 / 2);
        (backoff + Duration::from_millis(jitter_ms)).min(self.max_delay)
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or retries run out.
///
/// Returns the final error with the number of attempts made.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, (ProviderError, u32)>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempts <= policy.max_retries => {
                let retry_after = match &e {
                    ProviderError::RateLimited { retry_after_secs } => *retry_after_secs,
                    _ => None,
                };
                let delay = policy.delay_for(attempts, retry_after);
                warn!(
                    call = label,
                    attempt = attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Rate limited, backing off"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err((e, attempts)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_bucket_capacity_from_rpm() {
        let limiter = RateLimiter::new("test", 120);
        assert!(limiter.try_acquire().is_ok());
        assert!(limiter.try_acquire().is_ok());
        assert!(limiter.try_acquire().is_err());
    }

    #[test]
    fn test_low_budget_still_allows_one_request() {
        let limiter = RateLimiter::new("test", 30);
        assert!(limiter.try_acquire().is_ok());
        let wait = limiter.try_acquire().unwrap_err();
        assert!(wait >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_acquire_waits_for_refill() {
        let limiter = RateLimiter::new("test", 6_000);
        let start = Instant::now();
        for _ in 0..110 {
            limiter.acquire().await;
        }
        // 100 tokens up front, the rest refill at 100/s.
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_retry_after_wins() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1, Some(2)), Duration::from_secs(2));
    }

    #[test]
    fn test_backoff_grows_and_is_capped() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1_000),
        };
        let first = policy.delay_for(1, None);
        assert!(first >= Duration::from_millis(100) && first <= Duration::from_millis(150));
        let third = policy.delay_for(3, None);
        assert!(third >= Duration::from_millis(400) && third <= Duration::from_millis(600));
        assert!(policy.delay_for(10, None) <= Duration::from_millis(1_000));
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_from_rate_limit() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = retry_with_backoff(&fast_policy(3), "quote", move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(ProviderError::RateLimited { retry_after_secs: None })
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), _> = retry_with_backoff(&fast_policy(2), "candles", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::RateLimited { retry_after_secs: None })
        })
        .await;
        let (err, attempts) = result.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), _> = retry_with_backoff(&fast_policy(3), "news", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::Unavailable("502".into()))
        })
        .await;
        assert_eq!(result, Err((ProviderError::Unavailable("502".into()), 1)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
