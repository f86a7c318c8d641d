//! # Retry Policy
//!
//! Bounded exponential backoff for transient chain failures. Only
//! errors the taxonomy marks retryable are retried; deterministic
//! rejections surface immediately.

use crosslock_types::SwapError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Backoff parameters.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// First backoff delay.
    pub base_delay: Duration,
    /// Backoff ceiling.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Tight delays for test environments.
    pub fn for_testing() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
        }
    }

    /// Delay before attempt `attempt` (1-based; no delay before 1).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << (attempt.saturating_sub(2)).min(16);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails non-transiently, or attempts
    /// run out. `Timeout` is NOT retried here: a timed-out submission
    /// is indeterminate and must go through reconciliation instead of
    /// being blindly resent.
    pub async fn run<F, Fut, T>(&self, op_name: &str, mut op: F) -> Result<T, SwapError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SwapError>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let transient = matches!(err, SwapError::ChainUnavailable(_));
                    if !transient || attempt >= self.max_attempts {
                        return Err(err);
                    }
                    let delay = self.delay_for(attempt + 1);
                    warn!(op = op_name, attempt, ?delay, error = %err, "transient failure, backing off");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delay_progression() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(450),
        };
        assert_eq!(policy.delay_for(2), Duration::from_millis(100));
        assert_eq!(policy.delay_for(3), Duration::from_millis(200));
        assert_eq!(policy.delay_for(4), Duration::from_millis(400));
        assert_eq!(policy.delay_for(5), Duration::from_millis(450)); // Capped
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let policy = RetryPolicy::for_testing();
        let calls = AtomicU32::new(0);

        let result = policy
            .run("op", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(SwapError::ChainUnavailable("rpc down".into()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_does_not_retry_deterministic_failures() {
        let policy = RetryPolicy::for_testing();
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .run("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(SwapError::ContractReverted("bad-amount".into())) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_does_not_retry_timeouts() {
        let policy = RetryPolicy::for_testing();
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .run("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(SwapError::Timeout("deadline".into())) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let policy = RetryPolicy::for_testing();
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .run("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(SwapError::ChainUnavailable("still down".into())) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
