//! Summary aggregation: per-day scalar counters split by simple/advanced.
//!
//! Snapshot shape: season → ISO date → region →
//! `{observations: {simple, advanced}, schemas: {simple, advanced}}`.
//! Serves the seasonal comparison charts, which only need counts.

use crate::aggregate::{DropStats, OrderedMap};
use crate::catalog::{RegionCatalog, NO_REGION};
use crate::season::{season_label, season_start_year, SeasonMode};
use crate::Observation;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// Tuning knobs for summary aggregation, injected rather than global.
#[derive(Debug, Clone)]
pub struct SummaryConfig {
    /// Registration type ids that mark an observation as advanced
    pub advanced_markers: Vec<u32>,
    /// How dates group into seasons
    pub season_mode: SeasonMode,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            // Snow profile (31) and avalanche problem (32) schemas are only
            // filed through the advanced registration flow.
            advanced_markers: vec![31, 32],
            season_mode: SeasonMode::Hydrological,
        }
    }
}

/// Counter pair split by registration flow.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct SplitCount {
    /// Observations without advanced-marker schemas
    pub simple: u64,
    /// Observations carrying at least one advanced-marker schema
    pub advanced: u64,
}

/// Per-day, per-region counters.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct DayCounters {
    /// Number of observations
    pub observations: SplitCount,
    /// Total number of schemas across those observations
    pub schemas: SplitCount,
}

/// Regions of one date.
pub type SummaryRegions = OrderedMap<String, DayCounters>;
/// Dates of one season.
pub type SummaryDates = OrderedMap<String, SummaryRegions>;
/// Complete summary snapshot keyed by season label.
pub type SummarySnapshot = OrderedMap<String, SummaryDates>;

/// Fold observations into the summary snapshot.
///
/// Seasons sort by their numeric start year; dates chronologically (keys
/// are zero-padded ISO dates but the sort uses the underlying date, never
/// the string); regions by catalog index. Identical input in any order
/// yields identical output.
pub fn aggregate_summary(
    records: &[Observation],
    catalog: &RegionCatalog,
    config: &SummaryConfig,
) -> (SummarySnapshot, DropStats) {
    let mut stats = DropStats::default();
    let mut tree: BTreeMap<(i32, String), BTreeMap<NaiveDate, HashMap<&str, DayCounters>>> =
        BTreeMap::new();

    for obs in records {
        let Some(date) = obs.obs_date() else {
            stats.malformed_timestamps += 1;
            warn!(timestamp = %obs.dt_obs_time, "dropping observation with malformed timestamp");
            continue;
        };

        let region_id = obs.obs_location.forecast_region_tid;
        let region = match catalog.lookup(region_id) {
            Some(name) => name,
            None => {
                stats.unknown_regions += 1;
                warn!(region_id, "unknown region id, bucketing under sentinel");
                NO_REGION
            }
        };

        let advanced = obs
            .summaries
            .iter()
            .any(|s| config.advanced_markers.contains(&s.registration_tid));
        let schemas = obs.summaries.len() as u64;

        let season = (
            season_start_year(date, config.season_mode),
            season_label(date, config.season_mode),
        );
        let counters = tree
            .entry(season)
            .or_default()
            .entry(date)
            .or_default()
            .entry(region)
            .or_default();

        if advanced {
            counters.observations.advanced += 1;
            counters.schemas.advanced += schemas;
        } else {
            counters.observations.simple += 1;
            counters.schemas.simple += schemas;
        }
    }

    let mut snapshot = SummarySnapshot::new();
    for ((_, label), dates) in tree {
        let mut dates_out = SummaryDates::new();
        for (date, regions) in dates {
            let mut region_entries: Vec<_> = regions.into_iter().collect();
            region_entries.sort_by(|(a, _), (b, _)| {
                catalog.name_index(a).cmp(&catalog.name_index(b)).then(a.cmp(b))
            });

            let regions_out: SummaryRegions = region_entries
                .into_iter()
                .map(|(name, counters)| (name.to_string(), counters))
                .collect();
            dates_out.insert(date.format("%Y-%m-%d").to_string(), regions_out);
        }
        snapshot.insert(label, dates_out);
    }

    (snapshot, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ObsLocation, ObservationSummary};

    fn obs(time: &str, region: u32, tids: &[u32]) -> Observation {
        Observation {
            dt_obs_time: time.to_string(),
            geo_hazard_tid: 10,
            obs_location: ObsLocation {
                forecast_region_tid: region,
            },
            summaries: tids
                .iter()
                .map(|tid| ObservationSummary {
                    registration_tid: *tid,
                })
                .collect(),
        }
    }

    #[test]
    fn test_advanced_markers_classify() {
        let catalog = RegionCatalog::shared();
        let config = SummaryConfig::default();
        let records = vec![
            obs("2021-03-05T10:00:00", 3028, &[13, 31]),
            obs("2021-03-05T11:00:00", 3028, &[32]),
            obs("2021-03-05T12:00:00", 3028, &[13, 22, 25]),
        ];
        let (snapshot, _) = aggregate_summary(&records, catalog, &config);

        let counters = snapshot
            .get("2020-21")
            .and_then(|dates| dates.get("2021-03-05"))
            .and_then(|regions| regions.get("Jotunheimen"))
            .unwrap();
        assert_eq!(counters.observations.advanced, 2);
        assert_eq!(counters.observations.simple, 1);
        assert_eq!(counters.schemas.advanced, 3);
        assert_eq!(counters.schemas.simple, 3);
    }

    #[test]
    fn test_no_tags_is_simple() {
        let catalog = RegionCatalog::shared();
        let (snapshot, _) = aggregate_summary(
            &[obs("2021-03-05T10:00:00", 3028, &[])],
            catalog,
            &SummaryConfig::default(),
        );
        let counters = snapshot
            .get("2020-21")
            .and_then(|d| d.get("2021-03-05"))
            .and_then(|r| r.get("Jotunheimen"))
            .unwrap();
        assert_eq!(counters.observations.simple, 1);
        assert_eq!(counters.schemas.simple, 0);
    }

    #[test]
    fn test_seasons_sort_by_start_year() {
        let catalog = RegionCatalog::shared();
        let records = vec![
            obs("2021-03-05T10:00:00", 3028, &[13]), // 2020-21
            obs("2017-12-24T10:00:00", 3028, &[13]), // 2017-18
            obs("2021-09-15T10:00:00", 3028, &[13]), // 2021-22
        ];
        let (snapshot, _) = aggregate_summary(&records, catalog, &SummaryConfig::default());

        let seasons: Vec<&String> = snapshot.keys().collect();
        assert_eq!(seasons, vec!["2017-18", "2020-21", "2021-22"]);
    }

    #[test]
    fn test_dates_sort_chronologically_zero_padded() {
        let catalog = RegionCatalog::shared();
        let records = vec![
            obs("2020-11-02T10:00:00", 3028, &[13]),
            obs("2020-10-20T10:00:00", 3028, &[13]),
            obs("2021-02-01T10:00:00", 3028, &[13]),
        ];
        let (snapshot, _) = aggregate_summary(&records, catalog, &SummaryConfig::default());

        let dates: Vec<&String> = snapshot.get("2020-21").unwrap().keys().collect();
        assert_eq!(dates, vec!["2020-10-20", "2020-11-02", "2021-02-01"]);
    }

    #[test]
    fn test_regions_sort_by_catalog_index() {
        let catalog = RegionCatalog::shared();
        let records = vec![
            obs("2021-03-05T10:00:00", 3046, &[13]), // Østfold, declared last
            obs("2021-03-05T10:00:00", 3003, &[13]), // Nordenskiöld Land
            obs("2021-03-05T10:00:00", 3028, &[13]), // Jotunheimen
        ];
        let (snapshot, _) = aggregate_summary(&records, catalog, &SummaryConfig::default());

        let regions: Vec<&String> = snapshot
            .get("2020-21")
            .and_then(|d| d.get("2021-03-05"))
            .unwrap()
            .keys()
            .collect();
        assert_eq!(regions, vec!["Nordenskiöld Land", "Jotunheimen", "Østfold"]);
    }

    #[test]
    fn test_calendar_mode_labels() {
        let catalog = RegionCatalog::shared();
        let config = SummaryConfig {
            season_mode: SeasonMode::Calendar,
            ..SummaryConfig::default()
        };
        let (snapshot, _) = aggregate_summary(
            &[obs("2021-03-05T10:00:00", 3028, &[13])],
            catalog,
            &config,
        );
        assert!(snapshot.get("2021").is_some());
    }
}
