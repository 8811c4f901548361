//! Night-minute calculation and pricing
//!
//! A shift earns the premium for every minute it spends inside a night
//! window. Window end minutes are inclusive, so 22:00-24:59 is 180 minutes.
//! Shifts that wrap past midnight are unrolled onto a two-day axis and
//! checked against the windows of both days.

use crate::hours::{normalize_hour, parse_date, ClockTime, MINUTES_PER_DAY};
use crate::table::RawRow;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize, Serializer};

const DAY: i64 = MINUTES_PER_DAY as i64;

/// A fixed clock interval earning the premium, both ends inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NightWindow {
    pub start: ClockTime,
    pub end: ClockTime,
}

impl NightWindow {
    pub fn new(start: ClockTime, end: ClockTime) -> Self {
        Self { start, end }
    }
}

/// One tariff tier: `rate` applies to dates on or before `until`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TariffTier {
    pub until: NaiveDate,
    pub rate: f64,
}

/// Date-dependent €-per-minute rate.
///
/// Tiers are checked in order, so they must be sorted by `until`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tariff {
    pub tiers: Vec<TariffTier>,
    /// Rate for dates after the last tier
    pub rate_after: f64,
}

impl Tariff {
    pub fn rate_for(&self, date: NaiveDate) -> f64 {
        self.tiers
            .iter()
            .find(|tier| date <= tier.until)
            .map_or(self.rate_after, |tier| tier.rate)
    }
}

impl Default for Tariff {
    fn default() -> Self {
        Self {
            tiers: vec![TariffTier {
                until: ymd(2025, 4, 25),
                rate: 0.05,
            }],
            rate_after: 0.062,
        }
    }
}

/// Night windows, tariff and the first applicable date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NightConfig {
    pub windows: Vec<NightWindow>,
    pub tariff: Tariff,
    /// Shifts dated before this are not covered by the premium
    pub min_date: NaiveDate,
}

impl Default for NightConfig {
    fn default() -> Self {
        Self {
            windows: vec![
                NightWindow::new(clock(22, 0), ClockTime::LAST_NIGHT_MINUTE),
                NightWindow::new(clock(4, 0), clock(6, 0)),
            ],
            tariff: Tariff::default(),
            min_date: ymd(2022, 3, 30),
        }
    }
}

impl NightConfig {
    /// Whether shifts on `date` are covered at all
    pub fn applies_to(&self, date: NaiveDate) -> bool {
        date >= self.min_date
    }

    /// Minutes of `start..=end` that fall inside the night windows.
    ///
    /// An end earlier than the start means the shift crosses midnight.
    /// A shift starting before 00:59 that ends on the `24:59` marker ends
    /// at 00:59 of its own day. Windows are checked on the previous, the
    /// same and the next day, so the small hours of the shift's own date
    /// still fall in the evening window that began the day before.
    /// Zero-length shifts earn nothing.
    pub fn night_minutes(&self, start: ClockTime, end: ClockTime) -> u32 {
        let start = i64::from(start.minutes());
        let mut end = i64::from(end.minutes());
        if end == i64::from(ClockTime::LAST_NIGHT_MINUTE.minutes()) && start < 59 {
            end = 59;
        }
        if end < start {
            end += DAY;
        }
        if start >= end {
            return 0;
        }

        [-DAY, 0, DAY]
            .iter()
            .flat_map(|&base| {
                self.windows.iter().map(move |w| {
                    let w_start = i64::from(w.start.minutes()) + base;
                    let w_end = i64::from(w.end.minutes()) + base;
                    overlap(start, end, w_start, w_end)
                })
            })
            .sum()
    }

    /// Night minutes of a shift and their unrounded price
    pub fn compute_night_minutes(
        &self,
        date: NaiveDate,
        start: ClockTime,
        end: ClockTime,
    ) -> (u32, f64) {
        let minutes = self.night_minutes(start, end);
        (minutes, f64::from(minutes) * self.tariff.rate_for(date))
    }

    /// Price a shift, or `None` when its date is before `min_date`
    pub fn evaluate(&self, record: &ShiftRecord) -> Option<DailyResult> {
        if !self.applies_to(record.date) {
            log::debug!("{} is before {}, skipped", record.date, self.min_date);
            return None;
        }
        let (night_minutes, amount) =
            self.compute_night_minutes(record.date, record.start, record.end);
        Some(DailyResult {
            date: record.date,
            start: record.start,
            end: record.end,
            is_primary: record.is_primary,
            night_minutes,
            amount,
        })
    }
}

/// Inclusive overlap of `[a_start, a_end]` and `[w_start, w_end]` in minutes
pub fn overlap(a_start: i64, a_end: i64, w_start: i64, w_end: i64) -> u32 {
    let lo = a_start.max(w_start);
    let hi = a_end.min(w_end);
    u32::try_from(hi - lo + 1).unwrap_or(0)
}

/// A parsed shift
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftRecord {
    pub date: NaiveDate,
    pub start: ClockTime,
    pub end: ClockTime,
    pub is_primary: bool,
}

impl ShiftRecord {
    /// Parse a recovered row; `None` if the date or either time is unreadable
    pub fn from_raw(row: &RawRow) -> Option<Self> {
        let Some(date) = parse_date(&row.date_text) else {
            log::debug!("unreadable date {:?}, row dropped", row.date_text);
            return None;
        };
        Some(Self {
            date,
            start: normalize_hour(&row.start_text)?,
            end: normalize_hour(&row.end_text)?,
            is_primary: row.is_primary,
        })
    }
}

/// A priced shift
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyResult {
    pub date: NaiveDate,
    pub start: ClockTime,
    pub end: ClockTime,
    pub is_primary: bool,
    pub night_minutes: u32,
    /// Unrounded; serialized to cents
    #[serde(serialize_with = "serialize_cents")]
    pub amount: f64,
}

/// Round a euro amount to cents
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

pub(crate) fn serialize_cents<S: Serializer>(amount: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round_cents(*amount))
}

fn clock(hour: u8, minute: u8) -> ClockTime {
    ClockTime::new(hour, minute).expect("valid clock time")
}

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid calendar date")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> ClockTime {
        normalize_hour(s).unwrap()
    }

    fn minutes(start: &str, end: &str) -> u32 {
        NightConfig::default().night_minutes(t(start), t(end))
    }

    #[test]
    fn test_inclusive_window_end() {
        assert_eq!(minutes("22:00", "22:01"), 2);
        assert_eq!(minutes("06:00", "06:01"), 1);
        assert_eq!(minutes("21:00", "00:59"), 180);
        assert_eq!(minutes("03:00", "07:00"), 121);
    }

    #[test]
    fn test_overnight_both_windows() {
        // 23:00..=24:59 is 120, 04:00..=05:00 on the next day is 61
        assert_eq!(minutes("23:00", "05:00"), 181);
        assert_eq!(minutes("22:00", "06:00"), 301);
    }

    #[test]
    fn test_small_hours_start() {
        // 00:00..=00:59 belongs to the window that opened at 22:00 the day before
        assert_eq!(minutes("00:30", "00:58"), 29);
        assert_eq!(minutes("00:30", "00:59"), 30);
        assert_eq!(minutes("00:30", "01:00"), 30);
        assert_eq!(minutes("00:00", "06:00"), 181);
    }

    #[test]
    fn test_day_shift_earns_nothing() {
        assert_eq!(minutes("08:00", "15:00"), 0);
        assert_eq!(minutes("06:01", "21:59"), 0);
    }

    #[test]
    fn test_degenerate_shift() {
        assert_eq!(minutes("09:00", "09:00"), 0);
        assert_eq!(minutes("22:30", "22:30"), 0);
    }

    #[test]
    fn test_monotonic_in_end() {
        let config = NightConfig::default();
        for start in [0u32, 240, 600, 1260, 1380, 1439] {
            let mut previous = 0;
            for adjusted_end in start + 1..start + MINUTES_PER_DAY {
                let clock_end = adjusted_end % MINUTES_PER_DAY;
                let end = ClockTime::new((clock_end / 60) as u8, (clock_end % 60) as u8).unwrap();
                let begin = ClockTime::new((start / 60) as u8, (start % 60) as u8).unwrap();
                let current = config.night_minutes(begin, end);
                assert!(current >= previous, "start {start} end {adjusted_end}");
                previous = current;
            }
        }
    }

    #[test]
    fn test_monotonic_in_start() {
        let config = NightConfig::default();
        let end = ClockTime::new(6, 0).unwrap();
        let mut previous = 0;
        // Walk the start back one minute at a time from 05:59 to 06:01 of the day before
        for back in 1..MINUTES_PER_DAY {
            let clock_start = (360 + MINUTES_PER_DAY - back) % MINUTES_PER_DAY;
            let start = ClockTime::new((clock_start / 60) as u8, (clock_start % 60) as u8).unwrap();
            let current = config.night_minutes(start, end);
            assert!(current >= previous, "start {start}");
            previous = current;
        }
    }

    #[test]
    fn test_tariff_boundary() {
        let tariff = Tariff::default();
        assert_eq!(tariff.rate_for(ymd(2025, 4, 25)), 0.05);
        assert_eq!(tariff.rate_for(ymd(2025, 4, 26)), 0.062);
        assert_eq!(tariff.rate_for(ymd(2022, 3, 30)), 0.05);
    }

    #[test]
    fn test_compute_amount() {
        let config = NightConfig::default();
        let (m, amount) = config.compute_night_minutes(ymd(2025, 4, 25), t("23:00"), t("05:00"));
        assert_eq!(m, 181);
        assert!((amount - 9.05).abs() < 1e-9);

        let (m, amount) = config.compute_night_minutes(ymd(2025, 4, 26), t("23:00"), t("05:00"));
        assert_eq!(m, 181);
        assert!((amount - 11.222).abs() < 1e-9);
        assert_eq!(round_cents(amount), 11.22);
    }

    #[test]
    fn test_date_floor() {
        let config = NightConfig::default();
        let record = |date| ShiftRecord {
            date,
            start: t("22:00"),
            end: t("23:00"),
            is_primary: true,
        };
        assert!(config.evaluate(&record(ymd(2022, 3, 29))).is_none());
        let included = config.evaluate(&record(ymd(2022, 3, 30))).unwrap();
        assert_eq!(included.night_minutes, 61);
    }

    #[test]
    fn test_record_from_raw() {
        let row = RawRow {
            date_text: "12/05/2024 DOM".into(),
            start_text: "21:00".into(),
            end_text: "00:59".into(),
            is_primary: false,
        };
        let record = ShiftRecord::from_raw(&row).unwrap();
        assert_eq!(record.date, ymd(2024, 5, 12));
        assert_eq!(record.end, ClockTime::LAST_NIGHT_MINUTE);
        assert!(!record.is_primary);

        let bad = RawRow {
            date_text: "sin fecha".into(),
            ..row
        };
        assert!(ShiftRecord::from_raw(&bad).is_none());
    }

    #[test]
    fn test_overlap_formula() {
        assert_eq!(overlap(0, 10, 20, 30), 0);
        assert_eq!(overlap(0, 20, 20, 30), 1);
        assert_eq!(overlap(25, 40, 20, 30), 6);
        assert_eq!(overlap(-120, 59, 30, 58), 29);
    }
}
