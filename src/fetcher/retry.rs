//! Structured retry combinator.
//!
//! Every request goes through [`retry`]: an explicit attempt-counter loop
//! with a pluggable backoff, rather than recursion or ad-hoc loops at each
//! call site. The budgets differ per endpoint (see
//! [`crate::downloader::config`]), the policy does not.

use crate::fetcher::{FetcherError, FetcherResult};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Delay strategy between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Immediate retry
    None,
    /// Doubling delay starting at `initial_ms`, capped at `max_ms`
    Exponential {
        /// Delay before the first retry, in milliseconds
        initial_ms: u64,
        /// Upper bound on any single delay, in milliseconds
        max_ms: u64,
    },
}

impl Backoff {
    /// Delay to sleep after a failed attempt (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Backoff::None => Duration::ZERO,
            Backoff::Exponential { initial_ms, max_ms } => {
                let exp = 2u64.saturating_pow(attempt);
                let delay_ms = initial_ms.saturating_mul(exp).min(*max_ms);
                Duration::from_millis(delay_ms)
            }
        }
    }
}

/// Retry budget and backoff for one request.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Number of retries after the initial attempt
    pub max_retries: u32,
    /// Delay strategy between attempts
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Total attempts this policy allows.
    pub fn total_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

/// Run `op` until it succeeds or the policy's budget is spent.
///
/// `op` receives the 0-based attempt number and must issue an identical
/// request each time. Returns [`FetcherError::ExhaustedRetries`] carrying
/// the final attempt's error once the budget is spent.
pub async fn retry<T, F, Fut>(policy: RetryPolicy, label: &str, mut op: F) -> FetcherResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = FetcherResult<T>>,
{
    let total = policy.total_attempts();
    let mut last_error = String::new();

    for attempt in 0..total {
        match op(attempt).await {
            Ok(value) => {
                if attempt > 0 {
                    info!(label, attempt = attempt + 1, total, "request succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => {
                last_error = err.to_string();
                if attempt + 1 >= total {
                    break;
                }
                // Transient blips are common on the bulk endpoints, so
                // only the later attempts log at warn level.
                if attempt + 1 >= total / 2 {
                    warn!(
                        label,
                        error = %err,
                        "request failed, retrying ({}/{})",
                        attempt + 1,
                        total
                    );
                } else {
                    debug!(label, error = %err, "request failed, retrying");
                }
                let delay = policy.backoff.delay(attempt);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    Err(FetcherError::ExhaustedRetries {
        attempts: total,
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    const NO_DELAY: RetryPolicy = RetryPolicy {
        max_retries: 4,
        backoff: Backoff::None,
    };

    #[test]
    fn test_exponential_backoff_doubles_and_caps() {
        let backoff = Backoff::Exponential {
            initial_ms: 1000,
            max_ms: 30_000,
        };
        assert_eq!(backoff.delay(0), Duration::from_millis(1000));
        assert_eq!(backoff.delay(1), Duration::from_millis(2000));
        assert_eq!(backoff.delay(2), Duration::from_millis(4000));
        assert_eq!(backoff.delay(4), Duration::from_millis(16_000));
        assert_eq!(backoff.delay(10), Duration::from_millis(30_000));
    }

    #[tokio::test]
    async fn test_first_attempt_success_makes_one_call() {
        let calls = AtomicU32::new(0);
        let result = retry(NO_DELAY, "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, FetcherError>(7) }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_success_on_final_attempt() {
        let calls = AtomicU32::new(0);
        let result = retry(NO_DELAY, "test", |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 4 {
                    Err(FetcherError::Http("status 503".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_exhausted_budget_is_terminal() {
        let calls = AtomicU32::new(0);
        let result: FetcherResult<()> = retry(NO_DELAY, "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FetcherError::Network("connection refused".into())) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 5);
        match result.unwrap_err() {
            FetcherError::ExhaustedRetries {
                attempts,
                last_error,
            } => {
                assert_eq!(attempts, 5);
                assert!(last_error.contains("connection refused"));
                assert!(FetcherError::ExhaustedRetries {
                    attempts,
                    last_error
                }
                .is_terminal());
            }
            other => panic!("expected ExhaustedRetries, got {other:?}"),
        }
    }
}
