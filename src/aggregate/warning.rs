//! Warning aggregation: one classified warning per region and day.
//!
//! Snapshot shape: region → year → month → day →
//! `[dangerLevel, [problemTypeIds], {typeId: {subTypeId: value}}]`.
//! Measurement values are classified per sub-type: wind speed maps onto
//! Beaufort-style buckets, wind direction onto compass sectors, the
//! precipitation and temperature scalars are rounded, and anything else
//! passes through unchanged. Serves the weather charts.

use crate::aggregate::{DropStats, OrderedMap};
use crate::catalog::{RegionCatalog, NO_REGION};
use crate::Warning;
use chrono::Datelike;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Wind measurement group.
const WIND_TYPE: u32 = 20;
/// Wind speed sub-type within the wind group.
const WIND_SPEED_SUBTYPE: u32 = 20;
/// Wind direction sub-type within the wind group.
const WIND_DIRECTION_SUBTYPE: u32 = 50;
/// Precipitation measurement group (max 60, mean 70).
const PRECIPITATION_TYPE: u32 = 10;
/// Temperature measurement group (min 30, max 40).
const TEMPERATURE_TYPE: u32 = 40;

/// Tuning knobs for warning aggregation, injected rather than global.
#[derive(Debug, Clone)]
pub struct WarningConfig {
    /// Wind speed buckets: lower bound in m/s and bucket label, ascending
    pub wind_speeds: Vec<(f64, String)>,
    /// Compass sector labels, clockwise from north
    pub wind_directions: Vec<String>,
}

impl Default for WarningConfig {
    fn default() -> Self {
        let speeds = [
            (0.0, "Calm"),
            (6.0, "Breeze"),
            (9.0, "Fresh breeze"),
            (12.0, "Strong breeze"),
            (16.0, "Moderate gale"),
            (19.0, "Gale"),
            (23.0, "Strong gale"),
            (26.0, "Storm"),
            (35.0, "Hurricane force"),
        ];
        let directions = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];
        Self {
            wind_speeds: speeds
                .into_iter()
                .map(|(bound, label)| (bound, label.to_string()))
                .collect(),
            wind_directions: directions.into_iter().map(str::to_string).collect(),
        }
    }
}

impl WarningConfig {
    /// Bucket label for a wind speed in m/s.
    fn wind_speed_label(&self, speed: f64) -> Option<&str> {
        self.wind_speeds
            .iter()
            .rev()
            .find(|(bound, _)| speed >= *bound)
            .or_else(|| self.wind_speeds.first())
            .map(|(_, label)| label.as_str())
    }

    /// Compass sector label for a direction in degrees.
    fn wind_direction_label(&self, degrees: f64) -> Option<&str> {
        if self.wind_directions.is_empty() {
            return None;
        }
        let sectors = self.wind_directions.len();
        let width = 360.0 / sectors as f64;
        let index = ((degrees.rem_euclid(360.0) + width / 2.0) / width) as usize % sectors;
        Some(&self.wind_directions[index])
    }
}

/// A classified measurement value.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum MeasurementValue {
    /// Rounded or passed-through numeric value
    Number(f64),
    /// Bucket label or passed-through string
    Text(String),
}

/// Classified measurements of one warning: type id → sub-type id → value.
pub type Measurements = OrderedMap<u32, OrderedMap<u32, MeasurementValue>>;

/// One warning day: danger level, distinct problem type ids, and the
/// classified measurements. Serializes as `[level, [ids], {..}]`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WarningEntry(pub i32, pub Vec<u32>, pub Measurements);

/// Days of one month.
pub type WarningDays = OrderedMap<u32, WarningEntry>;
/// Months of one year.
pub type WarningMonths = OrderedMap<u32, WarningDays>;
/// Years of one region.
pub type WarningYears = OrderedMap<i32, WarningMonths>;
/// Complete warning snapshot keyed by region name.
pub type WarningSnapshot = OrderedMap<String, WarningYears>;

/// Fold warnings into the warning snapshot.
///
/// Regions sort in catalog declaration order, not alphabetically; years,
/// months and days ascend numerically. At most one entry exists per
/// region and day: when the input carries several, the last one processed
/// wins. Warnings whose measurement map is empty after dropping null
/// values are skipped entirely.
pub fn aggregate_warnings(
    records: &[Warning],
    catalog: &RegionCatalog,
    config: &WarningConfig,
) -> (WarningSnapshot, DropStats) {
    let mut stats = DropStats::default();
    let mut tree: HashMap<&str, BTreeMap<i32, BTreeMap<u32, BTreeMap<u32, WarningEntry>>>> =
        HashMap::new();

    for warning in records {
        let Some(date) = warning.valid_date() else {
            stats.malformed_timestamps += 1;
            warn!(valid_from = %warning.valid_from, "dropping warning with malformed date");
            continue;
        };

        let region = match catalog.lookup(warning.region_id) {
            Some(name) => name,
            None => {
                stats.unknown_regions += 1;
                warn!(region_id = warning.region_id, "unknown region id, bucketing under sentinel");
                NO_REGION
            }
        };

        let measurements = classify_measurements(warning, config);
        if measurements.is_empty() {
            debug!(region, date = %date, "skipping warning without usable measurements");
            continue;
        }

        let mut problems = Vec::new();
        for id in warning.problem_type_ids() {
            if !problems.contains(&id) {
                problems.push(id);
            }
        }

        let entry = WarningEntry(warning.danger_level, problems, measurements);
        let days = tree
            .entry(region)
            .or_default()
            .entry(date.year())
            .or_default()
            .entry(date.month())
            .or_default();
        if days.insert(date.day(), entry).is_some() {
            debug!(region, date = %date, "duplicate warning for day, keeping the later one");
        }
    }

    let mut regions: Vec<_> = tree.into_iter().collect();
    regions.sort_by(|(a, _), (b, _)| {
        catalog.name_index(a).cmp(&catalog.name_index(b)).then(a.cmp(b))
    });

    let mut snapshot = WarningSnapshot::new();
    for (region, years) in regions {
        let mut years_out = WarningYears::new();
        for (year, months) in years {
            let mut months_out = WarningMonths::new();
            for (month, days) in months {
                months_out.insert(month, days.into_iter().collect());
            }
            years_out.insert(year, months_out);
        }
        snapshot.insert(region.to_string(), years_out);
    }

    (snapshot, stats)
}

/// Build the classified measurement map, dropping null values.
fn classify_measurements(warning: &Warning, config: &WarningConfig) -> Measurements {
    let mut groups: BTreeMap<u32, BTreeMap<u32, MeasurementValue>> = BTreeMap::new();

    if let Some(weather) = &warning.mountain_weather {
        for group in &weather.measurement_types {
            for sub in &group.sub_types {
                let Some(raw) = &sub.value else { continue };
                if let Some(value) = classify_value(config, group.id, sub.id, raw) {
                    groups.entry(group.id).or_default().insert(sub.id, value);
                }
            }
        }
    }

    groups
        .into_iter()
        .map(|(id, subs)| (id, subs.into_iter().collect()))
        .collect()
}

/// Apply the per-sub-type classification rule to one raw value.
fn classify_value(
    config: &WarningConfig,
    type_id: u32,
    sub_id: u32,
    raw: &serde_json::Value,
) -> Option<MeasurementValue> {
    if raw.is_null() {
        return None;
    }
    let numeric = raw
        .as_f64()
        .or_else(|| raw.as_str().and_then(|s| s.trim().parse().ok()));

    match (type_id, sub_id) {
        (WIND_TYPE, WIND_SPEED_SUBTYPE) => numeric
            .and_then(|speed| config.wind_speed_label(speed))
            .map(|label| MeasurementValue::Text(label.to_string()))
            .or_else(|| passthrough_text(raw)),
        (WIND_TYPE, WIND_DIRECTION_SUBTYPE) => match numeric {
            Some(degrees) => config
                .wind_direction_label(degrees)
                .map(|label| MeasurementValue::Text(label.to_string())),
            None => passthrough_text(raw),
        },
        (PRECIPITATION_TYPE, 60 | 70) | (TEMPERATURE_TYPE, 30 | 40) => numeric
            .map(|v| MeasurementValue::Number(v.round()))
            .or_else(|| passthrough_text(raw)),
        _ => numeric
            .map(MeasurementValue::Number)
            .or_else(|| passthrough_text(raw)),
    }
}

fn passthrough_text(raw: &serde_json::Value) -> Option<MeasurementValue> {
    raw.as_str()
        .map(|s| MeasurementValue::Text(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AvalancheProblem, MeasurementSubType, MeasurementType, MountainWeather};
    use serde_json::json;

    fn warning(
        valid_from: &str,
        region: u32,
        level: i32,
        problems: &[u32],
        weather: &[(u32, u32, serde_json::Value)],
    ) -> Warning {
        let mut groups: BTreeMap<u32, Vec<MeasurementSubType>> = BTreeMap::new();
        for (type_id, sub_id, value) in weather {
            groups.entry(*type_id).or_default().push(MeasurementSubType {
                id: *sub_id,
                value: Some(value.clone()),
            });
        }
        Warning {
            valid_from: valid_from.to_string(),
            region_id: region,
            danger_level: level,
            avalanche_problems: problems
                .iter()
                .map(|id| AvalancheProblem {
                    avalanche_problem_type_id: *id,
                })
                .collect(),
            mountain_weather: Some(MountainWeather {
                measurement_types: groups
                    .into_iter()
                    .map(|(id, sub_types)| MeasurementType { id, sub_types })
                    .collect(),
            }),
        }
    }

    #[test]
    fn test_wind_speed_buckets() {
        let config = WarningConfig::default();
        assert_eq!(config.wind_speed_label(0.0), Some("Calm"));
        assert_eq!(config.wind_speed_label(5.9), Some("Calm"));
        assert_eq!(config.wind_speed_label(6.0), Some("Breeze"));
        assert_eq!(config.wind_speed_label(20.0), Some("Gale"));
        assert_eq!(config.wind_speed_label(50.0), Some("Hurricane force"));
    }

    #[test]
    fn test_wind_direction_sectors() {
        let config = WarningConfig::default();
        assert_eq!(config.wind_direction_label(0.0), Some("N"));
        assert_eq!(config.wind_direction_label(350.0), Some("N"));
        assert_eq!(config.wind_direction_label(90.0), Some("E"));
        assert_eq!(config.wind_direction_label(200.0), Some("S"));
        assert_eq!(config.wind_direction_label(225.0), Some("SW"));
    }

    #[test]
    fn test_measurement_classification_rules() {
        let catalog = RegionCatalog::shared();
        let records = vec![warning(
            "2021-01-10",
            3028,
            3,
            &[10],
            &[
                (20, 20, json!(13.2)),
                (20, 50, json!(315)),
                (40, 30, json!(-7.4)),
                (10, 70, json!("2.6")),
            ],
        )];
        let (snapshot, _) = aggregate_warnings(&records, catalog, &WarningConfig::default());

        let entry = snapshot
            .get("Jotunheimen")
            .and_then(|y| y.get(&2021))
            .and_then(|m| m.get(&1))
            .and_then(|d| d.get(&10))
            .unwrap();
        let wind = entry.2.get(&20).unwrap();
        assert_eq!(
            wind.get(&20),
            Some(&MeasurementValue::Text("Strong breeze".to_string()))
        );
        assert_eq!(wind.get(&50), Some(&MeasurementValue::Text("NW".to_string())));
        let temperature = entry.2.get(&40).unwrap();
        assert_eq!(temperature.get(&30), Some(&MeasurementValue::Number(-7.0)));
        let precipitation = entry.2.get(&10).unwrap();
        assert_eq!(precipitation.get(&70), Some(&MeasurementValue::Number(3.0)));
    }

    #[test]
    fn test_null_values_filtered_and_empty_entry_dropped() {
        let catalog = RegionCatalog::shared();
        let records = vec![warning(
            "2021-01-10",
            3028,
            3,
            &[10],
            &[(20, 20, serde_json::Value::Null)],
        )];
        let (snapshot, stats) = aggregate_warnings(&records, catalog, &WarningConfig::default());

        assert!(snapshot.is_empty());
        assert_eq!(stats.malformed_timestamps, 0);
    }

    #[test]
    fn test_problem_list_is_distinct() {
        let catalog = RegionCatalog::shared();
        let records = vec![warning(
            "2021-01-10",
            3028,
            3,
            &[30, 10, 30, 10],
            &[(20, 20, json!(5.0))],
        )];
        let (snapshot, _) = aggregate_warnings(&records, catalog, &WarningConfig::default());

        let entry = snapshot
            .get("Jotunheimen")
            .and_then(|y| y.get(&2021))
            .and_then(|m| m.get(&1))
            .and_then(|d| d.get(&10))
            .unwrap();
        assert_eq!(entry.1, vec![30, 10]);
    }

    #[test]
    fn test_last_warning_wins_for_same_region_day() {
        // Pins current behavior: later records silently replace earlier
        // ones for the same region/day.
        let catalog = RegionCatalog::shared();
        let records = vec![
            warning("2021-01-10", 3028, 2, &[10], &[(20, 20, json!(5.0))]),
            warning("2021-01-10", 3028, 4, &[30], &[(20, 20, json!(25.0))]),
        ];
        let (snapshot, _) = aggregate_warnings(&records, catalog, &WarningConfig::default());

        let days = snapshot
            .get("Jotunheimen")
            .and_then(|y| y.get(&2021))
            .and_then(|m| m.get(&1))
            .unwrap();
        assert_eq!(days.len(), 1);
        assert_eq!(days.get(&10).unwrap().0, 4);
    }

    #[test]
    fn test_regions_in_catalog_order_not_alphabetical() {
        let catalog = RegionCatalog::shared();
        let records = vec![
            warning("2021-01-10", 3028, 2, &[], &[(20, 20, json!(5.0))]), // Jotunheimen
            warning("2021-01-10", 3003, 2, &[], &[(20, 20, json!(5.0))]), // Nordenskiöld Land
            warning("2021-01-10", 3010, 2, &[], &[(20, 20, json!(5.0))]), // Lyngen
        ];
        let (snapshot, _) = aggregate_warnings(&records, catalog, &WarningConfig::default());

        let regions: Vec<&String> = snapshot.keys().collect();
        // Declaration order of the catalog, which is ascending region id
        // here, not the alphabetical order Jotunheimen/Lyngen/Nordenskiöld.
        assert_eq!(regions, vec!["Nordenskiöld Land", "Lyngen", "Jotunheimen"]);
    }

    #[test]
    fn test_serialized_shape() {
        let catalog = RegionCatalog::shared();
        let records = vec![warning(
            "2021-01-10",
            3028,
            3,
            &[10, 30],
            &[(20, 20, json!(13.2))],
        )];
        let (snapshot, _) = aggregate_warnings(&records, catalog, &WarningConfig::default());

        let json = serde_json::to_string(&snapshot).unwrap();
        assert_eq!(
            json,
            r#"{"Jotunheimen":{"2021":{"1":{"10":[3,[10,30],{"20":{"20":"Strong breeze"}}]}}}}"#
        );
    }
}
