//! Bounded retry with linear backoff for remote reads.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::CommandError;

/// How often, and how patiently, a remote read is retried.
///
/// Attempt `n` that fails transiently is followed by a pause of
/// `n * backoff_unit`: with the defaults that is 1, 2, 3, 4 seconds
/// between five attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Clamps `max_attempts` to at least 1.
    pub fn validated(mut self) -> Self {
        self.max_attempts = self.max_attempts.max(1);
        self
    }

    /// Pause after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff_unit * attempt
    }

    /// Runs `op` until it succeeds, fails permanently, or runs out of
    /// attempts. `op` receives the 1-based attempt number.
    ///
    /// Only transient errors are retried; anything else is returned at
    /// once. After the last attempt the last error is returned. A
    /// backoff that would end past `deadline` is not slept: the error
    /// that caused it is returned instead.
    ///
    /// # Errors
    /// [`CommandError::Cancelled`] if `cancel` fires first.
    pub async fn run<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
        mut op: F,
    ) -> Result<T, CommandError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, CommandError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => return Err(CommandError::Cancelled),
                outcome = op(attempt) => outcome,
            };
            let error = match outcome {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() || attempt >= max_attempts => return Err(e),
                Err(e) => e,
            };

            let delay = self.delay_after(attempt);
            if deadline.is_some_and(|d| Instant::now() + delay > d) {
                tracing::warn!(attempt, error = %error, "retry deadline reached");
                return Err(error);
            }
            tracing::warn!(attempt, ?delay, error = %error, "transient failure, retrying");
            tokio::select! {
                _ = cancel.cancelled() => return Err(CommandError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use steamrelay_market::MarketError;
    use steamrelay_protocol::WireError;

    use super::*;

    fn transient() -> CommandError {
        CommandError::Market(MarketError::Status {
            context: "market page",
            status: 503,
        })
    }

    #[test]
    fn test_delay_after_is_linear() {
        let policy = RetryPolicy::default();
        let delays: Vec<_> = (1..5).map(|n| policy.delay_after(n).as_secs()).collect();
        assert_eq!(delays, [1, 2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_succeeds_on_fifth_attempt_after_ten_seconds() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();
        let result = RetryPolicy::default()
            .run(&CancellationToken::new(), None, |attempt| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    if attempt < 5 { Err(transient()) } else { Ok(attempt) }
                }
            })
            .await
            .unwrap();
        assert_eq!(result, 5);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_exhausted_returns_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let err = RetryPolicy::default()
            .run(&CancellationToken::new(), None, |attempt| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(CommandError::Market(MarketError::Status {
                        context: "market page",
                        status: 500 + attempt as u16,
                    }))
                }
            })
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert!(err.to_string().contains("505"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_permanent_error_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();
        let err = RetryPolicy::default()
            .run(&CancellationToken::new(), None, |_| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(CommandError::Market(MarketError::RateLimited("429".into())))
                }
            })
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(matches!(err, CommandError::Market(MarketError::RateLimited(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_invalid_argument_is_immediate() {
        let err = RetryPolicy::default()
            .run(&CancellationToken::new(), None, |_| async {
                Err::<(), _>(CommandError::Wire(WireError::InvalidArgument("count".into())))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Wire(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_deadline_stops_before_long_backoff() {
        let calls = Arc::new(AtomicU32::new(0));
        let deadline = Instant::now() + Duration::from_secs(4);
        let _ = RetryPolicy::default()
            .run(&CancellationToken::new(), Some(deadline), |_| {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(transient())
                }
            })
            .await;
        // Sleeps 1s and 2s fit; the 3s pause would end at 6s.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_cancelled_during_backoff() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            trigger.cancel();
        });
        let err = RetryPolicy::default()
            .run(&cancel, None, |_| async { Err::<(), _>(transient()) })
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Cancelled));
    }

    #[test]
    fn test_validated_clamps_zero_attempts() {
        let policy = RetryPolicy {
            max_attempts: 0,
            ..RetryPolicy::default()
        }
        .validated();
        assert_eq!(policy.max_attempts, 1);
    }
}
