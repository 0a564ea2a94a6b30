//! Deterministic aggregation of raw records into nested counter snapshots.
//!
//! Three modes exist: [`detail`] keeps per-day observation entries,
//! [`summary`] keeps per-day scalar counters split by simple/advanced,
//! and [`warning`] keeps one classified warning tuple per region and day.
//!
//! Every mode rebuilds its snapshot from scratch and sorts every level by
//! explicit keys, so the serialized output is byte-identical for any
//! permutation of the input record list. Fetch arrival order never leaks
//! into a snapshot.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;

pub mod detail;
pub mod summary;
pub mod warning;

pub use detail::{aggregate_detail, DetailEntry, DetailSnapshot};
pub use summary::{aggregate_summary, DayCounters, SplitCount, SummaryConfig, SummarySnapshot};
pub use warning::{
    aggregate_warnings, MeasurementValue, WarningConfig, WarningEntry, WarningSnapshot,
};

/// Records excluded or flagged during aggregation.
///
/// Unknown regions are not dropped (they aggregate under the sentinel);
/// they are counted so gaps in the catalog stay visible. Records with
/// malformed timestamps are the only ones actually dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DropStats {
    /// Records dropped because the timestamp did not parse
    pub malformed_timestamps: u64,
    /// Records bucketed under the sentinel region
    pub unknown_regions: u64,
}

/// A JSON object that serializes its keys in insertion order.
///
/// `serde_json` maps with integer keys serialize as stringified decimals,
/// which is exactly the wire shape the front end consumes; this type adds
/// the ordering guarantee plain maps cannot give.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<K, V> {
    entries: Vec<(K, V)>,
}

impl<K, V> OrderedMap<K, V> {
    /// Empty map.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append an entry. Callers are responsible for key uniqueness and
    /// order; aggregation inserts from pre-sorted collections.
    pub fn insert(&mut self, key: K, value: V) {
        self.entries.push((key, value));
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in order.
    pub fn iter(&self) -> impl Iterator<Item = &(K, V)> {
        self.entries.iter()
    }

    /// Keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|(k, _)| k)
    }

    /// Value for `key`, by linear scan.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: std::borrow::Borrow<Q>,
        Q: PartialEq + ?Sized,
    {
        self.entries
            .iter()
            .find(|(k, _)| k.borrow() == key)
            .map(|(_, v)| v)
    }
}

impl<K, V> Default for OrderedMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> FromIterator<(K, V)> for OrderedMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<K: Serialize, V: Serialize> Serialize for OrderedMap<K, V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Compare region names the way a Norwegian reader sorts them: æ, ø and å
/// follow z, everything else compares case-insensitively by code point.
pub fn norwegian_cmp(a: &str, b: &str) -> Ordering {
    fn key(c: char) -> u32 {
        match c {
            'æ' => 'z' as u32 + 1,
            'ø' => 'z' as u32 + 2,
            'å' => 'z' as u32 + 3,
            other => other as u32,
        }
    }

    let ka = a.chars().flat_map(char::to_lowercase).map(key);
    let kb = b.chars().flat_map(char::to_lowercase).map(key);
    ka.cmp(kb).then_with(|| a.cmp(b))
}
