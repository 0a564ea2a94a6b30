//! Season labels for grouping observations by winter.
//!
//! The hydrological year starts in September: everything before the cutoff
//! belongs to the season that started the previous autumn.

use chrono::{Datelike, NaiveDate};

/// First month of a hydrological year.
pub const SEASON_START_MONTH: u32 = 9;

/// How observations are grouped into seasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeasonMode {
    /// September-to-August seasons labelled `"2020-21"`
    Hydrological,
    /// Plain calendar years labelled `"2021"`
    Calendar,
}

/// Year in which the season containing `date` starts.
pub fn season_start_year(date: NaiveDate, mode: SeasonMode) -> i32 {
    match mode {
        SeasonMode::Hydrological => {
            if date.month() < SEASON_START_MONTH {
                date.year() - 1
            } else {
                date.year()
            }
        }
        SeasonMode::Calendar => date.year(),
    }
}

/// Label of the season containing `date`.
///
/// Hydrological labels are `"<startYear>-<endYearShort>"`; calendar labels
/// are the plain year. Total for any valid date.
pub fn season_label(date: NaiveDate, mode: SeasonMode) -> String {
    let start = season_start_year(date, mode);
    match mode {
        SeasonMode::Hydrological => {
            let end_short = (start + 1).rem_euclid(100);
            format!("{start}-{end_short:02}")
        }
        SeasonMode::Calendar => format!("{start}"),
    }
}
