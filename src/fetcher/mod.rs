//! Data fetching from the Regobs search API and the Varsom forecast API

use crate::{Observation, Warning};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};

pub mod http;
pub mod regobs;
pub mod retry;

/// Fetcher errors
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// Transport-level error (timeout, connection refused, DNS)
    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx HTTP status
    #[error("HTTP error: {0}")]
    Http(String),

    /// Response body failed to parse or did not match the expected shape
    #[error("parse error: {0}")]
    Parse(String),

    /// Structurally valid response with impossible content
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Terminal: the retry budget for a request is spent
    #[error("retries exhausted after {attempts} attempts: {last_error}")]
    ExhaustedRetries {
        /// Total attempts made (initial request plus retries)
        attempts: u32,
        /// Message of the error from the final attempt
        last_error: String,
    },
}

impl FetcherError {
    /// Whether this error is terminal rather than worth another attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FetcherError::ExhaustedRetries { .. })
    }
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;

/// Observation time range sent with search and count queries.
#[derive(Debug, Clone)]
pub struct ObsTimeRange {
    /// Inclusive lower bound
    pub from: DateTime<Utc>,
    /// Inclusive upper bound
    pub to: DateTime<Utc>,
}

impl ObsTimeRange {
    /// Range between two instants.
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    /// From the first recorded season (September 2017) until now.
    pub fn season_to_now() -> Self {
        let from = Utc
            .with_ymd_and_hms(2017, 9, 1, 0, 0, 0)
            .single()
            .expect("fixed season start is a valid instant");
        Self {
            from,
            to: Utc::now(),
        }
    }
}

/// Search endpoint operations needed by the observation downloader.
#[async_trait]
pub trait ObservationApi: Send + Sync {
    /// Total number of observations matching the range.
    async fn count(&self, range: &ObsTimeRange) -> FetcherResult<u64>;

    /// One page of observations at `offset`, at most `limit` records.
    ///
    /// The final page may be shorter than `limit`.
    async fn fetch_page(
        &self,
        range: &ObsTimeRange,
        offset: u64,
        limit: u64,
    ) -> FetcherResult<Vec<Observation>>;
}

/// Forecast endpoint operations needed by the warning downloader.
#[async_trait]
pub trait WarningApi: Send + Sync {
    /// All warnings for one region across an inclusive date window.
    async fn region_warnings(
        &self,
        region_id: u32,
        from: NaiveDate,
        to: NaiveDate,
    ) -> FetcherResult<Vec<Warning>>;
}
