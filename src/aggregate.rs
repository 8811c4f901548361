//! Monthly, yearly and global totals
//!
//! Amounts are summed unrounded and only rounded to cents when a bucket is
//! serialized. A date counts toward `day_count` once per bucket, and only if
//! it earned night minutes.

use crate::night::{round_cents, DailyResult};
use chrono::{Datelike, NaiveDate};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Month bucket key, printed as `MM/YYYY` and ordered chronologically
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{:04}", self.month, self.year)
    }
}

impl Serialize for MonthKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Running totals for one period
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bucket {
    minutes: u64,
    amount: f64,
    days: BTreeSet<NaiveDate>,
}

impl Bucket {
    pub fn minutes(&self) -> u64 {
        self.minutes
    }

    /// Unrounded amount
    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn rounded_amount(&self) -> f64 {
        round_cents(self.amount)
    }

    /// Distinct dates with night minutes
    pub fn day_count(&self) -> usize {
        self.days.len()
    }

    fn add(&mut self, result: &DailyResult) {
        self.minutes += u64::from(result.night_minutes);
        self.amount += result.amount;
        if result.night_minutes > 0 {
            self.days.insert(result.date);
        }
    }

    fn merge(&mut self, other: &Bucket) {
        self.minutes += other.minutes;
        self.amount += other.amount;
        self.days.extend(other.days.iter().copied());
    }
}

impl Serialize for Bucket {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Bucket", 3)?;
        state.serialize_field("minutes", &self.minutes)?;
        state.serialize_field("amount", &self.rounded_amount())?;
        state.serialize_field("day_count", &self.day_count())?;
        state.end()
    }
}

/// Totals of a batch
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub by_month: BTreeMap<MonthKey, Bucket>,
    pub by_year: BTreeMap<i32, Bucket>,
    pub global: Bucket,
}

impl Summary {
    pub fn add(&mut self, result: &DailyResult) {
        self.by_month
            .entry(MonthKey::of(result.date))
            .or_default()
            .add(result);
        self.by_year
            .entry(result.date.year())
            .or_default()
            .add(result);
        self.global.add(result);
    }

    /// Fold another summary into this one
    pub fn merge(&mut self, other: &Summary) {
        for (key, bucket) in &other.by_month {
            self.by_month.entry(*key).or_default().merge(bucket);
        }
        for (year, bucket) in &other.by_year {
            self.by_year.entry(*year).or_default().merge(bucket);
        }
        self.global.merge(&other.global);
    }
}

/// Fold daily results into monthly, yearly and global buckets
pub fn aggregate<'a, I>(results: I) -> Summary
where
    I: IntoIterator<Item = &'a DailyResult>,
{
    let mut summary = Summary::default();
    for result in results {
        summary.add(result);
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hours::ClockTime;

    fn result(y: i32, m: u32, d: u32, night_minutes: u32, amount: f64) -> DailyResult {
        DailyResult {
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            start: ClockTime::new(22, 0).unwrap(),
            end: ClockTime::new(6, 0).unwrap(),
            is_primary: true,
            night_minutes,
            amount,
        }
    }

    #[test]
    fn test_same_date_counts_once() {
        let results = [result(2024, 5, 1, 60, 3.0), result(2024, 5, 1, 30, 1.5)];
        let summary = aggregate(&results);

        let may = &summary.by_month[&MonthKey { year: 2024, month: 5 }];
        assert_eq!(may.minutes(), 90);
        assert_eq!(may.day_count(), 1);
        assert_eq!(summary.global.day_count(), 1);
        assert_eq!(summary.by_year[&2024].day_count(), 1);
    }

    #[test]
    fn test_zero_minute_day_not_counted() {
        let results = [result(2024, 5, 1, 0, 0.0), result(2024, 5, 2, 10, 0.5)];
        let summary = aggregate(&results);
        assert_eq!(summary.global.day_count(), 1);
        assert_eq!(summary.global.minutes(), 10);
        // The month still exists even though one of its days earned nothing
        assert_eq!(summary.by_month.len(), 1);
    }

    #[test]
    fn test_month_keys_chronological() {
        let results = [
            result(2025, 1, 3, 10, 0.5),
            result(2024, 12, 30, 10, 0.5),
            result(2024, 2, 1, 10, 0.5),
        ];
        let summary = aggregate(&results);
        let keys: Vec<String> = summary.by_month.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, ["02/2024", "12/2024", "01/2025"]);
    }

    #[test]
    fn test_amount_rounded_once() {
        let results = [
            result(2025, 5, 1, 1, 0.062),
            result(2025, 5, 2, 1, 0.062),
            result(2025, 5, 3, 1, 0.062),
        ];
        let summary = aggregate(&results);
        // Per-row rounding would give 0.18
        assert_eq!(summary.global.rounded_amount(), 0.19);
    }

    #[test]
    fn test_months_sum_to_global() {
        let results = [
            result(2024, 4, 1, 181, 9.05),
            result(2024, 4, 2, 61, 3.05),
            result(2025, 6, 1, 181, 11.222),
            result(2025, 7, 9, 2, 0.124),
        ];
        let summary = aggregate(&results);

        let minutes: u64 = summary.by_month.values().map(Bucket::minutes).sum();
        let amount: f64 = summary.by_month.values().map(Bucket::amount).sum();
        let days: usize = summary.by_month.values().map(Bucket::day_count).sum();
        assert_eq!(minutes, summary.global.minutes());
        assert!((amount - summary.global.amount()).abs() < 1e-9);
        assert_eq!(days, summary.global.day_count());
    }

    #[test]
    fn test_merge_matches_single_fold() {
        let first = [result(2024, 4, 1, 181, 9.05), result(2024, 4, 2, 61, 3.05)];
        let second = [result(2024, 4, 2, 10, 0.5), result(2024, 5, 1, 120, 6.0)];

        let all = aggregate(first.iter().chain(second.iter()));
        let mut merged = aggregate(&second);
        merged.merge(&aggregate(&first));

        assert_eq!(merged.global.minutes(), all.global.minutes());
        assert_eq!(merged.global.day_count(), all.global.day_count());
        assert!((merged.global.amount() - all.global.amount()).abs() < 1e-9);
        assert_eq!(merged.by_month.len(), all.by_month.len());
        for (key, bucket) in &all.by_month {
            assert_eq!(merged.by_month[key].minutes(), bucket.minutes());
            assert_eq!(merged.by_month[key].day_count(), bucket.day_count());
        }
    }

    #[test]
    fn test_serialized_shape() {
        let results = [result(2024, 5, 1, 60, 3.004)];
        let json = serde_json::to_value(aggregate(&results)).unwrap();
        assert_eq!(json["by_month"]["05/2024"]["minutes"], 60);
        assert_eq!(json["by_month"]["05/2024"]["amount"], 3.0);
        assert_eq!(json["by_year"]["2024"]["day_count"], 1);
        assert_eq!(json["global"]["day_count"], 1);
    }
}
