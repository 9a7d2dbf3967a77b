//! Backoff Retrier
//!
//! Retries a fallible async operation with exponential spacing. Client errors
//! (4xx other than 429) short-circuit because the same request cannot succeed.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::Result;

/// Attempt ceiling and base delay of the retrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// One attempt, no retries.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Delay after failed attempt `attempt` (1-based): `base * 2^(attempt-1)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// Invokes `operation` until it succeeds, fails non-retryably, or the policy's
/// attempts are exhausted; the last failure is returned.
pub async fn retry_with_backoff<T, F, Fut>(policy: RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= max_attempts || !err.is_retryable() => return Err(err),
            Err(err) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RelayError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(4, Duration::from_millis(100))
    }

    #[test]
    fn test_delay_doubles() {
        let policy = policy();
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(policy(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, RelayError>(42)
        })
        .await;

        tokio_test::assert_ok!(&result);
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_request_is_attempted_once() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_with_backoff(policy(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(RelayError::InvalidRequest("malformed".into()))
        })
        .await;

        assert_eq!(result, Err(RelayError::InvalidRequest("malformed".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_retries_with_increasing_delays() {
        let attempts: Mutex<Vec<Instant>> = Mutex::new(Vec::new());
        let result: Result<()> = retry_with_backoff(policy(), || async {
            attempts.lock().unwrap().push(Instant::now());
            Err(RelayError::rate_limited("slow down", None))
        })
        .await;

        tokio_test::assert_err!(&result);
        let attempts = attempts.into_inner().unwrap();
        assert_eq!(attempts.len(), 4);

        let gaps: Vec<Duration> = attempts.windows(2).map(|w| w[1] - w[0]).collect();
        assert_eq!(
            gaps,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(policy(), || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(RelayError::TransientNetwork("reset".into()))
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quota_exhaustion_fails_fast() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_with_backoff(policy(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(RelayError::quota_exhausted("Daily quota exceeded", None))
        })
        .await;

        assert!(matches!(result, Err(RelayError::RateLimited { status: 403, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
