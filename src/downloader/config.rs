//! Download configuration constants

use crate::fetcher::retry::{Backoff, RetryPolicy};
use chrono::NaiveDate;

/// Records per search page. The search endpoint caps response sizes, so
/// pages are small and many requests run in parallel instead.
pub const PAGE_SIZE: u64 = 50;

/// Maximum concurrent in-flight page requests.
/// The endpoints are latency-bound rather than bandwidth-bound; 50 keeps a
/// full history download under a few minutes without tripping upstream
/// throttling.
pub const PARALLEL_DOWNLOADS: usize = 50;

/// Retry budget for count and other single polling queries.
pub const COUNT_MAX_RETRIES: u32 = 5;

/// Retry budget for bulk page and warning batch queries. Bulk endpoints
/// fail transiently far more often under load, hence the larger budget.
pub const BATCH_MAX_RETRIES: u32 = 10;

/// Initial backoff delay in milliseconds.
pub const INITIAL_BACKOFF_MS: u64 = 1000;

/// Maximum backoff delay in milliseconds.
/// Caps exponential growth so a 10-retry budget stays under ~4 minutes of
/// total waiting.
pub const MAX_BACKOFF_MS: u64 = 30_000;

/// Days of recent warning history that are re-fetched even when cached,
/// since upstream may still revise them.
pub const CACHE_REVISION_WINDOW_DAYS: u64 = 30;

/// Length of one warning fetch window in days. The forecast endpoint
/// rejects very long date ranges, so history is walked in bounded windows.
pub const WARNING_WINDOW_DAYS: u64 = 90;

/// First day with recorded data (start of the 2017-18 season).
pub fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2017, 9, 1).expect("fixed season start is a valid date")
}

/// Retry policy for count queries.
pub fn count_retry_policy() -> RetryPolicy {
    RetryPolicy {
        max_retries: COUNT_MAX_RETRIES,
        backoff: Backoff::Exponential {
            initial_ms: INITIAL_BACKOFF_MS,
            max_ms: MAX_BACKOFF_MS,
        },
    }
}

/// Retry policy for page and warning batch queries.
pub fn batch_retry_policy() -> RetryPolicy {
    RetryPolicy {
        max_retries: BATCH_MAX_RETRIES,
        backoff: Backoff::Exponential {
            initial_ms: INITIAL_BACKOFF_MS,
            max_ms: MAX_BACKOFF_MS,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_policies_carry_distinct_budgets() {
        assert_eq!(count_retry_policy().total_attempts(), 6);
        assert_eq!(batch_retry_policy().total_attempts(), 11);
    }

    #[test]
    fn test_backoff_capped() {
        let policy = batch_retry_policy();
        assert_eq!(policy.backoff.delay(0), Duration::from_millis(1000));
        assert_eq!(policy.backoff.delay(9), Duration::from_millis(MAX_BACKOFF_MS));
    }
}
