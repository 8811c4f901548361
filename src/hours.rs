//! Hour and date normalization for timesheet cells
//!
//! Time cells in the timesheets are irregular: `7.30`, `07,30`, `00:59` written
//! for the last minute of the night block, or hours past 24 from some exporters.
//! Every token goes through [`normalize_hour`] before it is compared with anything.

use crate::Error;
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub const MINUTES_PER_DAY: u32 = 1440;

/// A bare single-colon numeric token, after separator normalization
static TIME_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,2}):(\d{1,2})$").unwrap());

/// Date formats seen in exported timesheets, tried in order
const DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%d-%m-%Y", "%Y-%m-%d", "%d.%m.%Y", "%d/%m/%y"];

/// A time of day with minute granularity.
///
/// Hours run from 0 to 24; hour 24 only appears as the post-midnight
/// marker `24:59` produced by normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime {
    hour: u8,
    minute: u8,
}

impl ClockTime {
    /// The post-midnight marker `24:59`
    pub const LAST_NIGHT_MINUTE: ClockTime = ClockTime {
        hour: 24,
        minute: 59,
    };

    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        if hour > 24 || minute > 59 {
            return None;
        }
        Some(Self { hour, minute })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    /// Minutes since 00:00 of the shift's day
    pub fn minutes(&self) -> u32 {
        u32::from(self.hour) * 60 + u32::from(self.minute)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Strict `HH:MM` parsing, used for configuration values.
///
/// Unlike [`normalize_hour`] no rewriting happens: `00:59` stays `00:59`.
impl FromStr for ClockTime {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = TIME_TOKEN
            .captures(s.trim())
            .ok_or_else(|| Error::Config(format!("invalid time of day: {s:?}")))?;
        let hour: u8 = caps[1]
            .parse()
            .map_err(|_| Error::Config(format!("invalid hour: {s:?}")))?;
        let minute: u8 = caps[2]
            .parse()
            .map_err(|_| Error::Config(format!("invalid minute: {s:?}")))?;
        ClockTime::new(hour, minute)
            .ok_or_else(|| Error::Config(format!("time of day out of range: {s:?}")))
    }
}

impl Serialize for ClockTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClockTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Normalize a raw time token.
///
/// - `.` and `,` separators become `:`
/// - the token must be `H:MM`/`HH:MM` with exactly one colon
/// - `00:59` becomes `24:59` (last minute of the night block)
/// - hours from 24 to 47 have 24 subtracted; `24:59` itself is kept
///
/// Returns `None` for anything else, including minutes past 59 and
/// hours of 48 or more.
pub fn normalize_hour(token: &str) -> Option<ClockTime> {
    let token = token.trim().replace(['.', ','], ":");
    let caps = TIME_TOKEN.captures(&token)?;
    let hour: u8 = caps[1].parse().ok()?;
    let minute: u8 = caps[2].parse().ok()?;

    if minute > 59 {
        return None;
    }

    match (hour, minute) {
        (0, 59) | (24, 59) => Some(ClockTime::LAST_NIGHT_MINUTE),
        (h, _) if h >= 48 => None,
        (h, m) if h >= 24 => ClockTime::new(h - 24, m),
        (h, m) => ClockTime::new(h, m),
    }
}

/// Extract every valid time token from a cell, in order
pub fn time_tokens(cell: &str) -> Vec<ClockTime> {
    cell.split_whitespace().filter_map(normalize_hour).collect()
}

/// Parse a date cell.
///
/// The first whitespace-separated token that parses as a date wins, so cells
/// like `01/05/2024 MIE` work. Two-digit years are read as 20xx.
pub fn parse_date(cell: &str) -> Option<NaiveDate> {
    cell.split_whitespace().find_map(parse_date_token)
}

fn parse_date_token(token: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .filter_map(|fmt| NaiveDate::parse_from_str(token, fmt).ok())
        // "%Y" happily reads "24" as year 24
        .find(|date| date.year() >= 1000)
}

/// Format a date the way the timesheets print it
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}
