//! Disk cache for fetched warning history.
//!
//! The cache is a JSON array of raw warning records, rewritten as a whole
//! after every successful download cycle. Writes go through a temp file
//! and an atomic rename so a crash mid-write can never truncate the
//! history. Loading is tolerant: a missing or unreadable file is an empty
//! cache and the full history is re-fetched.

use crate::downloader::config::CACHE_REVISION_WINDOW_DAYS;
use crate::Warning;
use chrono::{Days, NaiveDate};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Cache errors. Load-side problems are handled internally as cache
/// misses; only save-side problems surface.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result of loading the cache.
#[derive(Debug)]
pub struct CacheLoad {
    /// Records safely past the revision window, oldest history first
    pub records: Vec<Warning>,
    /// First day that still needs fetching, if anything was cached
    pub resume_from: Option<NaiveDate>,
}

impl CacheLoad {
    fn empty() -> Self {
        Self {
            records: Vec::new(),
            resume_from: None,
        }
    }
}

/// Warning history cache backed by one JSON file.
#[derive(Debug)]
pub struct WarningCache {
    path: PathBuf,
    revision_window_days: u64,
}

impl WarningCache {
    /// Cache at `path` with the default revision window.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            revision_window_days: CACHE_REVISION_WINDOW_DAYS,
        }
    }

    /// Override how many trailing days are re-fetched even when cached.
    pub fn with_revision_window_days(mut self, days: u64) -> Self {
        self.revision_window_days = days;
        self
    }

    /// Cache file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load cached records, dropping everything inside the revision
    /// window ending at `today` so still-revisable data is re-fetched.
    ///
    /// Never fails: corruption and absence both mean an empty cache.
    pub fn load(&self, today: NaiveDate) -> CacheLoad {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "no warning cache, fetching full history");
                return CacheLoad::empty();
            }
        };

        let cached: Vec<Warning> = match serde_json::from_str(&contents) {
            Ok(records) => records,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "warning cache unreadable, fetching full history");
                return CacheLoad::empty();
            }
        };

        let cutoff = today
            .checked_sub_days(Days::new(self.revision_window_days))
            .unwrap_or(NaiveDate::MIN);

        let mut records = Vec::with_capacity(cached.len());
        let mut newest: Option<NaiveDate> = None;
        let mut still_revisable = 0usize;
        let mut undated = 0usize;

        for warning in cached {
            match warning.valid_date() {
                Some(date) if date >= cutoff => still_revisable += 1,
                Some(date) => {
                    newest = Some(newest.map_or(date, |n| n.max(date)));
                    records.push(warning);
                }
                None => {
                    undated += 1;
                    warn!(valid_from = %warning.valid_from, "dropping cached warning with unreadable date");
                }
            }
        }

        info!(
            kept = records.len(),
            still_revisable,
            undated,
            "warning cache loaded"
        );

        CacheLoad {
            records,
            resume_from: newest.and_then(|date| date.succ_opt()),
        }
    }

    /// Replace the cache file with `records`, atomically.
    pub fn save(&self, records: &[Warning]) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::Io(e.to_string()))?;
        }

        let json =
            serde_json::to_vec(records).map_err(|e| CacheError::Serialization(e.to_string()))?;

        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp_file = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| CacheError::Io(format!("failed to create temp file: {e}")))?;
        temp_file
            .write_all(&json)
            .map_err(|e| CacheError::Io(format!("failed to write temp file: {e}")))?;
        temp_file
            .flush()
            .map_err(|e| CacheError::Io(format!("failed to flush temp file: {e}")))?;
        temp_file
            .as_file()
            .sync_all()
            .map_err(|e| CacheError::Io(format!("failed to sync temp file: {e}")))?;
        temp_file
            .persist(&self.path)
            .map_err(|e| CacheError::Io(format!("failed to persist cache file: {e}")))?;

        info!(
            path = %self.path.display(),
            records = records.len(),
            "warning cache saved"
        );
        Ok(())
    }
}
