//! Ingest command implementation
//!
//! `ingest observations` runs the count-then-pages download and writes a
//! detail or summary snapshot; `ingest warnings` walks the warning
//! history through the disk cache and writes the weather snapshot.

use crate::aggregate::{
    aggregate_detail, aggregate_summary, aggregate_warnings, DropStats, SummaryConfig,
    WarningConfig,
};
use crate::cache::WarningCache;
use crate::catalog::RegionCatalog;
use crate::downloader::config::PARALLEL_DOWNLOADS;
use crate::downloader::{ObservationDownloader, WarningDownloader};
use crate::fetcher::regobs::RegobsApi;
use crate::fetcher::ObsTimeRange;
use crate::season::SeasonMode;
use crate::shutdown::SharedShutdown;
use crate::snapshot::write_snapshot;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use super::CliError;

/// Maximum allowed concurrency to avoid self-inflicted upstream throttling.
const MAX_CONCURRENCY: usize = 128;

/// Aggregates Regobs observations and Varsom warnings into JSON snapshots
#[derive(Debug, Parser)]
#[command(name = "regobs-aggregator", version, about)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Maximum concurrent in-flight requests
    #[arg(long, global = true, default_value_t = PARALLEL_DOWNLOADS, value_parser = parse_concurrency)]
    pub concurrency: usize,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Download records and write an aggregated snapshot
    Ingest(IngestArgs),
}

/// Arguments of the ingest command
#[derive(Debug, clap::Args)]
pub struct IngestArgs {
    /// What to ingest
    #[command(subcommand)]
    pub source: IngestSource,
}

/// Record sources
#[derive(Debug, Subcommand)]
pub enum IngestSource {
    /// Field observations from the Regobs search API
    Observations(ObservationsArgs),
    /// Regional avalanche warnings from the Varsom forecast API
    Warnings(WarningsArgs),
}

/// Observation aggregation modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ObservationMode {
    /// Per-day entry lists for the observation charts
    Detail,
    /// Per-day simple/advanced counters for the season charts
    Summary,
}

/// Arguments for observation ingestion
#[derive(Debug, clap::Args)]
pub struct ObservationsArgs {
    /// Aggregation mode
    #[arg(long, value_enum, default_value_t = ObservationMode::Detail)]
    pub mode: ObservationMode,

    /// First observation date (YYYY-MM-DD)
    #[arg(long, default_value = "2017-09-01")]
    pub from: String,

    /// Last observation date (YYYY-MM-DD); defaults to now
    #[arg(long)]
    pub to: Option<String>,

    /// Keep only observations of this hazard category (e.g. 10 for snow)
    #[arg(long)]
    pub hazard: Option<u32>,

    /// Group summary counters by calendar year instead of hydrological season
    #[arg(long)]
    pub calendar_year: bool,

    /// Snapshot output path
    #[arg(long, short, default_value = "counted.json")]
    pub output: PathBuf,
}

/// Arguments for warning ingestion
#[derive(Debug, clap::Args)]
pub struct WarningsArgs {
    /// First warning date fetched when the cache is empty (YYYY-MM-DD)
    #[arg(long, default_value = "2017-09-01")]
    pub from: String,

    /// Warning history cache file
    #[arg(long, default_value = "warnings-cache.json")]
    pub cache: PathBuf,

    /// Snapshot output path
    #[arg(long, short, default_value = "weather.json")]
    pub output: PathBuf,
}

impl ObservationsArgs {
    /// Execute observation ingestion.
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        let from = parse_date_arg(&self.from)?;
        let to = match &self.to {
            Some(to) => end_of_day(parse_date_arg(to)?),
            None => Utc::now(),
        };
        let range = ObsTimeRange::new(start_of_day(from), to);

        let api = Arc::new(RegobsApi::new()?);
        let bar = progress_bar();
        let bar_in_cb = bar.clone();
        let downloader = ObservationDownloader::new(api)
            .with_parallelism(cli.concurrency)
            .with_shutdown(shutdown)
            .with_progress(move |fetched, total| {
                if bar_in_cb.length() != Some(total) {
                    bar_in_cb.set_length(total);
                }
                bar_in_cb.set_position(fetched);
            });

        let mut records = downloader.download(&range).await?;
        bar.finish_and_clear();

        if let Some(hazard) = self.hazard {
            let before = records.len();
            records.retain(|obs| obs.geo_hazard_tid == hazard);
            info!(
                hazard,
                kept = records.len(),
                filtered = before - records.len(),
                "hazard filter applied"
            );
        }

        let catalog = RegionCatalog::shared();
        let stats = match self.mode {
            ObservationMode::Detail => {
                let (snapshot, stats) = aggregate_detail(&records, catalog);
                write_snapshot(&self.output, &snapshot)?;
                stats
            }
            ObservationMode::Summary => {
                let config = SummaryConfig {
                    season_mode: if self.calendar_year {
                        SeasonMode::Calendar
                    } else {
                        SeasonMode::Hydrological
                    },
                    ..SummaryConfig::default()
                };
                let (snapshot, stats) = aggregate_summary(&records, catalog, &config);
                write_snapshot(&self.output, &snapshot)?;
                stats
            }
        };

        report_drops(stats);
        info!(output = %self.output.display(), records = records.len(), "observation snapshot complete");
        Ok(())
    }
}

impl WarningsArgs {
    /// Execute warning ingestion.
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        let start_date = parse_date_arg(&self.from)?;
        let today = Utc::now().date_naive();

        let api = Arc::new(RegobsApi::new()?);
        let catalog = RegionCatalog::shared();
        let downloader = WarningDownloader::new(api, catalog, WarningCache::new(&self.cache))
            .with_start_date(start_date)
            .with_parallelism(cli.concurrency)
            .with_shutdown(shutdown);

        let records = downloader.download(today).await?;

        let (snapshot, stats) = aggregate_warnings(&records, catalog, &WarningConfig::default());
        write_snapshot(&self.output, &snapshot)?;

        report_drops(stats);
        info!(output = %self.output.display(), records = records.len(), "warning snapshot complete");
        Ok(())
    }
}

/// Parse a YYYY-MM-DD argument.
fn parse_date_arg(input: &str) -> Result<NaiveDate, CliError> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|e| CliError::InvalidArgument(format!("invalid date '{input}': {e}")))
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .unwrap_or_else(Utc::now)
}

fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_milli_opt(23, 59, 59, 999)
        .map(|dt| dt.and_utc())
        .unwrap_or_else(Utc::now)
}

/// Parse and validate the concurrency flag.
fn parse_concurrency(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if value == 0 {
        return Err("concurrency must be at least 1".to_string());
    }
    if value > MAX_CONCURRENCY {
        return Err(format!(
            "concurrency {value} exceeds maximum of {MAX_CONCURRENCY}"
        ));
    }
    Ok(value)
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::no_length();
    bar.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} observations ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar
}

fn report_drops(stats: DropStats) {
    if stats.malformed_timestamps > 0 {
        warn!(
            dropped = stats.malformed_timestamps,
            "records dropped for malformed timestamps"
        );
    }
    if stats.unknown_regions > 0 {
        warn!(
            bucketed = stats.unknown_regions,
            "records aggregated under the sentinel region"
        );
    }
}
