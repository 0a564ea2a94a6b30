//! CLI error type

use crate::cache::CacheError;
use crate::downloader::DownloadError;
use crate::fetcher::FetcherError;
use crate::snapshot::SnapshotError;

/// Errors surfaced by CLI commands
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// An argument failed validation
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The download phase failed terminally
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// A request failed before the download phase started
    #[error("fetch error: {0}")]
    Fetch(#[from] FetcherError),

    /// The warning cache could not be written
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// The snapshot could not be written
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
}
