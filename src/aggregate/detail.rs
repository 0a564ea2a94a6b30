//! Detail aggregation: per-day observation entries.
//!
//! Snapshot shape: region → year → month → day → list of
//! `[hazardType, [registrationTids]]` pairs. Serves the main observation
//! chart, which filters the tag lists client-side.

use crate::aggregate::{norwegian_cmp, DropStats, OrderedMap};
use crate::catalog::{RegionCatalog, NO_REGION};
use crate::Observation;
use chrono::Datelike;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// One observation within a day bucket: hazard type and sorted
/// registration type ids. Serializes as `[hazard, [tids]]`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DetailEntry(pub u32, pub Vec<u32>);

/// Days of one month.
pub type DetailDays = OrderedMap<u32, Vec<DetailEntry>>;
/// Months of one year.
pub type DetailMonths = OrderedMap<u32, DetailDays>;
/// Years of one region.
pub type DetailYears = OrderedMap<i32, DetailMonths>;
/// Complete detail snapshot keyed by region name.
pub type DetailSnapshot = OrderedMap<String, DetailYears>;

/// Fold observations into the detail snapshot.
///
/// Regions sort in Norwegian alphabetical order; years, months and days
/// ascend numerically; day entries sort by tag-list length, then first
/// tag, then the full tag list, then hazard type. Identical input in any
/// order yields identical output.
pub fn aggregate_detail(
    records: &[Observation],
    catalog: &RegionCatalog,
) -> (DetailSnapshot, DropStats) {
    let mut stats = DropStats::default();
    let mut tree: HashMap<&str, BTreeMap<i32, BTreeMap<u32, BTreeMap<u32, Vec<DetailEntry>>>>> =
        HashMap::new();

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

        let mut tids = obs.registration_tids();
        tids.sort_unstable();

        tree.entry(region)
            .or_default()
            .entry(date.year())
            .or_default()
            .entry(date.month())
            .or_default()
            .entry(date.day())
            .or_default()
            .push(DetailEntry(obs.geo_hazard_tid, tids));
    }

    let mut regions: Vec<_> = tree.into_iter().collect();
    regions.sort_by(|(a, _), (b, _)| norwegian_cmp(a, b));

    let mut snapshot = DetailSnapshot::new();
    for (region, years) in regions {
        let mut years_out = DetailYears::new();
        for (year, months) in years {
            let mut months_out = DetailMonths::new();
            for (month, days) in months {
                let mut days_out = DetailDays::new();
                for (day, mut entries) in days {
                    entries.sort_by(compare_entries);
                    days_out.insert(day, entries);
                }
                months_out.insert(month, days_out);
            }
            years_out.insert(year, months_out);
        }
        snapshot.insert(region.to_string(), years_out);
    }

    (snapshot, stats)
}

fn compare_entries(a: &DetailEntry, b: &DetailEntry) -> Ordering {
    a.1.len()
        .cmp(&b.1.len())
        .then_with(|| a.1.first().cmp(&b.1.first()))
        .then_with(|| a.1.cmp(&b.1))
        .then_with(|| a.0.cmp(&b.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ObsLocation, ObservationSummary};

    fn obs(time: &str, region: u32, hazard: u32, tids: &[u32]) -> Observation {
        Observation {
            dt_obs_time: time.to_string(),
            geo_hazard_tid: hazard,
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
    fn test_groups_by_region_and_date() {
        let catalog = RegionCatalog::shared();
        let records = vec![
            obs("2021-03-05T10:00:00", 3028, 10, &[13]),
            obs("2021-03-05T14:00:00", 3028, 10, &[25, 22]),
            obs("2021-03-06T09:00:00", 3028, 10, &[13]),
        ];
        let (snapshot, stats) = aggregate_detail(&records, catalog);

        assert_eq!(stats, DropStats::default());
        let days = snapshot
            .get("Jotunheimen")
            .and_then(|years| years.get(&2021))
            .and_then(|months| months.get(&3))
            .unwrap();
        assert_eq!(days.get(&5).unwrap().len(), 2);
        assert_eq!(days.get(&6).unwrap().len(), 1);
    }

    #[test]
    fn test_day_entries_sort_by_length_then_first_tag() {
        let catalog = RegionCatalog::shared();
        let records = vec![
            obs("2021-03-05T10:00:00", 3028, 10, &[25, 13]),
            obs("2021-03-05T11:00:00", 3028, 10, &[22]),
            obs("2021-03-05T12:00:00", 3028, 10, &[13, 21]),
            obs("2021-03-05T13:00:00", 3028, 10, &[]),
        ];
        let (snapshot, _) = aggregate_detail(&records, catalog);

        let entries = snapshot
            .get("Jotunheimen")
            .and_then(|y| y.get(&2021))
            .and_then(|m| m.get(&3))
            .and_then(|d| d.get(&5))
            .unwrap();
        // Empty list first, then singleton, then the two pairs ordered by
        // their first (sorted) tag.
        assert_eq!(
            entries,
            &vec![
                DetailEntry(10, vec![]),
                DetailEntry(10, vec![22]),
                DetailEntry(10, vec![13, 21]),
                DetailEntry(10, vec![13, 25]),
            ]
        );
    }

    #[test]
    fn test_tag_lists_sorted_ascending() {
        let catalog = RegionCatalog::shared();
        let records = vec![obs("2021-03-05T10:00:00", 3028, 10, &[36, 13, 25])];
        let (snapshot, _) = aggregate_detail(&records, catalog);

        let entries = snapshot
            .get("Jotunheimen")
            .and_then(|y| y.get(&2021))
            .and_then(|m| m.get(&3))
            .and_then(|d| d.get(&5))
            .unwrap();
        assert_eq!(entries[0].1, vec![13, 25, 36]);
    }

    #[test]
    fn test_regions_in_norwegian_alphabetical_order() {
        let catalog = RegionCatalog::shared();
        let records = vec![
            obs("2021-03-05T10:00:00", 3046, 10, &[13]), // Østfold
            obs("2021-03-05T10:00:00", 3044, 10, &[13]), // Akershus
            obs("2021-03-05T10:00:00", 3031, 10, &[13]), // Voss
        ];
        let (snapshot, _) = aggregate_detail(&records, catalog);

        let regions: Vec<&String> = snapshot.keys().collect();
        assert_eq!(regions, vec!["Akershus", "Voss", "Østfold"]);
    }

    #[test]
    fn test_unknown_region_buckets_under_sentinel() {
        let catalog = RegionCatalog::shared();
        let records = vec![obs("2021-03-05T10:00:00", 9999, 10, &[13])];
        let (snapshot, stats) = aggregate_detail(&records, catalog);

        assert_eq!(stats.unknown_regions, 1);
        assert!(snapshot.get(NO_REGION).is_some());
    }

    #[test]
    fn test_malformed_timestamp_dropped_and_counted() {
        let catalog = RegionCatalog::shared();
        let records = vec![
            obs("garbage", 3028, 10, &[13]),
            obs("2021-03-05T10:00:00", 3028, 10, &[13]),
        ];
        let (snapshot, stats) = aggregate_detail(&records, catalog);

        assert_eq!(stats.malformed_timestamps, 1);
        let entries = snapshot
            .get("Jotunheimen")
            .and_then(|y| y.get(&2021))
            .and_then(|m| m.get(&3))
            .and_then(|d| d.get(&5))
            .unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_serialized_shape() {
        let catalog = RegionCatalog::shared();
        let records = vec![obs("2021-03-05T10:00:00", 3028, 10, &[25, 13])];
        let (snapshot, _) = aggregate_detail(&records, catalog);

        let json = serde_json::to_string(&snapshot).unwrap();
        assert_eq!(json, r#"{"Jotunheimen":{"2021":{"3":{"5":[[10,[13,25]]]}}}}"#);
    }
}
