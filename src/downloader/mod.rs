//! Download orchestration
//!
//! The downloader drives the fetch phase of an ingestion cycle:
//!
//! 1. **Observations**: one count query, then all pages fetched by a
//!    bounded pool of concurrent workers ([`ObservationDownloader`])
//! 2. **Warnings**: the history is walked in date windows, one request per
//!    forecast region per window, resuming from the disk cache
//!    ([`WarningDownloader`])
//!
//! Page results are merged in arrival order; the aggregator re-sorts
//! everything by explicit keys, so no ordering is promised here.
//!
//! # Error Handling
//!
//! Transport and protocol failures are retried inside the fetcher layer
//! and never reach this module unless the budget is spent. A spent budget
//! is fatal to the whole cycle: no partial snapshot is published.

pub mod config;
pub mod observations;
pub mod warnings;

pub use observations::ObservationDownloader;
pub use warnings::WarningDownloader;

use crate::cache::CacheError;
use crate::fetcher::FetcherError;

/// Download errors
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// A request failed terminally after its retry budget was spent
    #[error("fetch error: {0}")]
    Fetch(#[from] FetcherError),

    /// The warning cache could not be written
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// A shutdown request stopped the cycle before completion
    #[error("download interrupted by shutdown request")]
    Interrupted,
}
