//! Paginated observation download with bounded parallelism.
//!
//! A preliminary count query sizes the job; the page offsets then form a
//! work queue drained by at most `parallelism` concurrent requests. Each
//! worker returns its own page batch and the coordinating task merges them
//! sequentially, so the accumulator needs no locking. A page that fails
//! after its retry budget aborts the download: no further offsets are
//! claimed and in-flight requests are abandoned unmerged.

use crate::downloader::config::{PAGE_SIZE, PARALLEL_DOWNLOADS};
use crate::downloader::DownloadError;
use crate::fetcher::{ObsTimeRange, ObservationApi};
use crate::shutdown::SharedShutdown;
use crate::Observation;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info};

/// Progress callback: `(records_fetched, records_total)`.
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Downloads all observations in a time range page by page.
pub struct ObservationDownloader<A> {
    api: Arc<A>,
    page_size: u64,
    parallelism: usize,
    progress: Option<ProgressFn>,
    shutdown: Option<SharedShutdown>,
}

impl<A: ObservationApi + 'static> ObservationDownloader<A> {
    /// Downloader with the default page size and parallelism.
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            page_size: PAGE_SIZE,
            parallelism: PARALLEL_DOWNLOADS,
            progress: None,
            shutdown: None,
        }
    }

    /// Override the page size (minimum 1).
    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Override the parallelism bound (minimum 1).
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Register a progress callback invoked after every merged page.
    pub fn with_progress(mut self, progress: impl Fn(u64, u64) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(progress));
        self
    }

    /// Attach a shutdown handle; a pending request aborts the download
    /// between page merges without publishing anything.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Fetch every observation in `range`.
    ///
    /// The returned order is arrival order and carries no meaning.
    ///
    /// # Errors
    /// Fails when the count query or any page spends its retry budget, or
    /// when shutdown is requested mid-download.
    pub async fn download(&self, range: &ObsTimeRange) -> Result<Vec<Observation>, DownloadError> {
        let total = self.api.count(range).await?;
        info!(total, "observation count fetched");

        if total == 0 {
            info!("no observations in range, nothing to fetch");
            return Ok(Vec::new());
        }

        let page_size = self.page_size;
        let offsets: Vec<u64> = (0..total).step_by(page_size as usize).collect();
        debug!(
            pages = offsets.len(),
            parallelism = self.parallelism,
            "starting paged download"
        );

        let mut pages = stream::iter(offsets)
            .map(|offset| {
                let api = Arc::clone(&self.api);
                let range = range.clone();
                async move {
                    let page = api.fetch_page(&range, offset, page_size).await?;
                    Ok::<_, DownloadError>((offset, page))
                }
            })
            .buffer_unordered(self.parallelism);

        let mut records: Vec<Observation> = Vec::with_capacity(total as usize);
        while let Some(result) = pages.next().await {
            if let Some(shutdown) = &self.shutdown {
                if shutdown.is_shutdown_requested() {
                    return Err(DownloadError::Interrupted);
                }
            }

            // A terminal page failure propagates here; dropping the stream
            // stops claiming new offsets and abandons in-flight requests.
            let (offset, page) = result?;
            debug!(offset, page_len = page.len(), "page merged");
            records.extend(page);

            if let Some(progress) = &self.progress {
                progress(records.len() as u64, total);
            }
            if records.len() as u64 % 1000 < page_size {
                info!(fetched = records.len(), total, "fetching observations");
            }
        }

        info!(fetched = records.len(), total, "observation download complete");
        Ok(records)
    }
}
