//! Windowed warning download with disk-cache resume.
//!
//! Warning history is walked chronologically in bounded date windows. For
//! each window one request per forecast region runs, with bounded
//! parallelism; the next window only starts once every region of the
//! current window has landed, so a failure can never leave a half-merged
//! window in the record set. Completed windows are merged onto the cached
//! history and the cache is rewritten as a whole on success.

use crate::cache::WarningCache;
use crate::catalog::RegionCatalog;
use crate::downloader::config::{default_start_date, PARALLEL_DOWNLOADS, WARNING_WINDOW_DAYS};
use crate::downloader::DownloadError;
use crate::fetcher::WarningApi;
use crate::shutdown::SharedShutdown;
use crate::Warning;
use chrono::{Days, NaiveDate};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{info, warn};

/// Downloads the full warning history for all forecast regions.
pub struct WarningDownloader<A> {
    api: Arc<A>,
    region_ids: Vec<u32>,
    cache: WarningCache,
    start_date: NaiveDate,
    window_days: u64,
    parallelism: usize,
    shutdown: Option<SharedShutdown>,
}

impl<A: WarningApi + 'static> WarningDownloader<A> {
    /// Downloader over the catalog's forecast regions.
    pub fn new(api: Arc<A>, catalog: &RegionCatalog, cache: WarningCache) -> Self {
        Self {
            api,
            region_ids: catalog.forecast_region_ids(),
            cache,
            start_date: default_start_date(),
            window_days: WARNING_WINDOW_DAYS,
            parallelism: PARALLEL_DOWNLOADS,
            shutdown: None,
        }
    }

    /// Override the first day fetched when the cache is empty.
    pub fn with_start_date(mut self, start_date: NaiveDate) -> Self {
        self.start_date = start_date;
        self
    }

    /// Override the window length in days (minimum 1).
    pub fn with_window_days(mut self, window_days: u64) -> Self {
        self.window_days = window_days.max(1);
        self
    }

    /// Override the parallelism bound (minimum 1).
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Attach a shutdown handle; a pending request stops the download at
    /// the next window boundary after saving completed windows.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Fetch all warnings from the cache resume point through `today`.
    ///
    /// # Errors
    /// Fails when any region request spends its retry budget (nothing is
    /// saved), when the final cache write fails, or when shutdown stops
    /// the cycle early (completed windows are saved first).
    pub async fn download(&self, today: NaiveDate) -> Result<Vec<Warning>, DownloadError> {
        let loaded = self.cache.load(today);
        let mut records = loaded.records;
        let mut cursor = loaded.resume_from.unwrap_or(self.start_date);

        info!(
            cached = records.len(),
            resume_from = %cursor,
            regions = self.region_ids.len(),
            "starting warning download"
        );

        while cursor <= today {
            if let Some(shutdown) = &self.shutdown {
                if shutdown.is_shutdown_requested() {
                    warn!("shutdown requested - saving completed warning windows");
                    self.cache.save(&records)?;
                    return Err(DownloadError::Interrupted);
                }
            }

            let window_end = cursor
                .checked_add_days(Days::new(self.window_days - 1))
                .map_or(today, |end| end.min(today));

            let mut batches = stream::iter(self.region_ids.iter().copied())
                .map(|region_id| {
                    let api = Arc::clone(&self.api);
                    async move { api.region_warnings(region_id, cursor, window_end).await }
                })
                .buffer_unordered(self.parallelism);

            // The window only completes once every outstanding region
            // request has landed; a terminal failure abandons the rest.
            while let Some(batch) = batches.next().await {
                records.extend(batch?);
            }
            drop(batches);

            info!(from = %cursor, to = %window_end, total = records.len(), "warning window complete");

            cursor = match window_end.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }

        self.cache.save(&records)?;
        info!(total = records.len(), "warning download complete");
        Ok(records)
    }
}
