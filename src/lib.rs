//! # Regobs Aggregator Library
//!
//! A library for downloading Norwegian avalanche, snow and water field
//! observations from the Regobs search API and regional avalanche warnings
//! from the Varsom forecast API, and folding them into deterministic nested
//! counter snapshots for a charting front end.
//!
//! ## Features
//!
//! - **Paginated Download**: Concurrent page fetching with bounded
//!   parallelism over the Regobs search endpoint
//! - **Retry with Backoff**: Every request is retried with exponential
//!   backoff before the ingestion cycle is aborted
//! - **Resume Capability**: Warning history is cached on disk so a restart
//!   resumes from the last safely-cached day
//! - **Deterministic Aggregation**: Snapshots are identical for any
//!   permutation of the input record list
//!
//! ## Quick Start
//!
//! ```no_run
//! use regobs_aggregator::catalog::RegionCatalog;
//! use regobs_aggregator::downloader::ObservationDownloader;
//! use regobs_aggregator::fetcher::regobs::RegobsApi;
//! use regobs_aggregator::fetcher::ObsTimeRange;
//! use regobs_aggregator::aggregate;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let api = Arc::new(RegobsApi::new()?);
//! let downloader = ObservationDownloader::new(api);
//! let records = downloader.download(&ObsTimeRange::season_to_now()).await?;
//!
//! let catalog = RegionCatalog::shared();
//! let (snapshot, drops) = aggregate::aggregate_detail(&records, catalog);
//! println!("{} records dropped", drops.malformed_timestamps);
//! let json = serde_json::to_string(&snapshot)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`catalog`] - Immutable region id to canonical name lookup
//! - [`fetcher`] - Retrying HTTP client and the Regobs/Varsom API bindings
//! - [`downloader`] - Paginated observation download and windowed warning
//!   download orchestration
//! - [`cache`] - Disk cache for warning history with revision-window
//!   filtering
//! - [`aggregate`] - Detail, summary and warning aggregation modes
//! - [`season`] - Hydrological/calendar season derivation
//! - [`snapshot`] - Atomic snapshot JSON writer

#![warn(missing_docs)]
#![warn(clippy::all)]

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// Deterministic aggregation of raw records into nested counter snapshots
pub mod aggregate;

/// Disk cache for previously fetched warning batches
pub mod cache;

/// Region id to canonical name catalog
pub mod catalog;

/// CLI command implementations
pub mod cli;

/// Download orchestration
pub mod downloader;

/// Retrying HTTP client and API bindings
pub mod fetcher;

/// Season label derivation
pub mod season;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

/// Atomic snapshot file writer
pub mod snapshot;

// Re-export commonly used types
pub use catalog::RegionCatalog;
pub use season::SeasonMode;

/// One field observation as returned by the Regobs search endpoint.
///
/// Immutable once fetched; the observation timestamp is kept as the raw
/// wire string and parsed during aggregation so that malformed values can
/// be counted instead of failing the whole page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Observation {
    /// Observation time as reported by the observer
    #[serde(rename = "DtObsTime")]
    pub dt_obs_time: String,
    /// Hazard category of the observation (snow 10, soil 20, water 60, ice 70)
    #[serde(rename = "GeoHazardTID")]
    pub geo_hazard_tid: u32,
    /// Location metadata; only the forecast region id is consumed here
    #[serde(rename = "ObsLocation")]
    pub obs_location: ObsLocation,
    /// One entry per filled-in registration schema
    #[serde(rename = "Summaries", default)]
    pub summaries: Vec<ObservationSummary>,
}

impl Observation {
    /// Calendar date of the observation, if the wire timestamp parses.
    pub fn obs_date(&self) -> Option<NaiveDate> {
        parse_wire_date(&self.dt_obs_time)
    }

    /// Registration type ids of all schemas on this observation.
    pub fn registration_tids(&self) -> Vec<u32> {
        self.summaries.iter().map(|s| s.registration_tid).collect()
    }
}

/// Location block of an observation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObsLocation {
    /// External numeric forecast region id
    #[serde(rename = "ForecastRegionTID")]
    pub forecast_region_tid: u32,
}

/// One registration schema attached to an observation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObservationSummary {
    /// Registration type id (e.g. danger sign 13, avalanche 26, problem 32)
    #[serde(rename = "RegistrationTID")]
    pub registration_tid: u32,
}

/// One regional avalanche warning as returned by the Varsom forecast API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Warning {
    /// First day the warning is valid for
    #[serde(rename = "ValidFrom")]
    pub valid_from: String,
    /// External numeric forecast region id
    #[serde(rename = "RegionId")]
    pub region_id: u32,
    /// Danger level 1-5; the API serializes this either as a number or a
    /// numeric string depending on endpoint version
    #[serde(rename = "DangerLevel", deserialize_with = "danger_level_flexible")]
    pub danger_level: i32,
    /// Forecast avalanche problems for the day
    #[serde(rename = "AvalancheProblems", default)]
    pub avalanche_problems: Vec<AvalancheProblem>,
    /// Forecast mountain weather measurements
    #[serde(rename = "MountainWeather", default)]
    pub mountain_weather: Option<MountainWeather>,
}

impl Warning {
    /// Calendar date the warning is valid for, if the wire value parses.
    pub fn valid_date(&self) -> Option<NaiveDate> {
        parse_wire_date(&self.valid_from)
    }

    /// Avalanche problem type ids in wire order.
    pub fn problem_type_ids(&self) -> Vec<u32> {
        self.avalanche_problems
            .iter()
            .map(|p| p.avalanche_problem_type_id)
            .collect()
    }
}

/// One avalanche problem block on a warning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AvalancheProblem {
    /// Problem type id (wind slab 10, PWL 30/37, wet slab 45, glide 50, ...)
    #[serde(rename = "AvalancheProblemTypeId")]
    pub avalanche_problem_type_id: u32,
}

/// Mountain weather block of a warning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MountainWeather {
    /// Measurement groups (precipitation 10, wind 20, temperature 40)
    #[serde(rename = "MeasurementTypes", default)]
    pub measurement_types: Vec<MeasurementType>,
}

/// One measurement group with its sub-measurements.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MeasurementType {
    /// Measurement type id
    #[serde(rename = "Id")]
    pub id: u32,
    /// Sub-measurements within the group
    #[serde(rename = "MeasurementSubTypes", default)]
    pub sub_types: Vec<MeasurementSubType>,
}

/// One sub-measurement carrying the actual value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MeasurementSubType {
    /// Sub-type id within the group (wind speed 20, wind direction 50, ...)
    #[serde(rename = "Id")]
    pub id: u32,
    /// Raw value; numbers and strings both occur, null means not forecast
    #[serde(rename = "Value", default)]
    pub value: Option<serde_json::Value>,
}

/// Parse a wire timestamp into a calendar date.
///
/// Accepts RFC 3339 with or without a zone designator and plain
/// `YYYY-MM-DD[THH:MM:SS[.fff]]` forms, which covers every variant the
/// Regobs and Varsom endpoints have been observed to emit.
pub fn parse_wire_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();

    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(input) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.date());
    }
    if input.len() >= 10 {
        if let Ok(d) = NaiveDate::parse_from_str(&input[..10], "%Y-%m-%d") {
            return Some(d);
        }
    }
    None
}

fn danger_level_flexible<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(i32),
        Text(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
