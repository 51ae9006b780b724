//! Daily and weekly ridership series
//!
//! Daily counts are sparse: a day carries an entry only when at least one
//! retained trip started on it. Weekly series are dense: one slot per
//! week-ending Sunday from the first week to the last, with `None` for weeks
//! that have no data.

use crate::error::{ForecastError, Result};
use crate::trips::TripRecord;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Sunday on or after `date`; a Sunday maps to itself
pub fn week_ending(date: NaiveDate) -> NaiveDate {
    let offset = (7 - date.weekday().num_days_from_sunday()) % 7;
    date + Duration::days(offset as i64)
}

/// Trips per calendar day of their start timestamp
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCounts {
    counts: BTreeMap<NaiveDate, u32>,
}

impl DailyCounts {
    /// Count trips by the day their start timestamp falls on
    pub fn from_trips(trips: &[TripRecord]) -> Self {
        let mut counts = BTreeMap::new();
        for trip in trips {
            *counts.entry(trip.start_time.date()).or_insert(0) += 1;
        }
        debug!(days = counts.len(), trips = trips.len(), "Aggregated daily counts");
        Self { counts }
    }

    /// Number of days with at least one trip
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Count for one day; `None` when the day has no entry
    pub fn get(&self, date: NaiveDate) -> Option<u32> {
        self.counts.get(&date).copied()
    }

    /// Sum over all days
    pub fn total(&self) -> u64 {
        self.counts.values().map(|&c| c as u64).sum()
    }

    /// Sum over the days from `from` to `to`, both inclusive
    pub fn count_between(&self, from: NaiveDate, to: NaiveDate) -> u64 {
        if from > to {
            return 0;
        }
        self.counts.range(from..=to).map(|(_, &c)| c as u64).sum()
    }

    /// Days in calendar order
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, u32)> + '_ {
        self.counts.iter().map(|(d, c)| (*d, *c))
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        self.counts.keys().next().copied()
    }

    pub fn last_day(&self) -> Option<NaiveDate> {
        self.counts.keys().next_back().copied()
    }
}

/// Strictly weekly series indexed by week-ending Sunday
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklySeries {
    start: Option<NaiveDate>,
    values: Vec<Option<f64>>,
}

impl WeeklySeries {
    /// Build a series from its first Sunday and one value slot per week
    pub fn new(start: NaiveDate, values: Vec<Option<f64>>) -> Result<Self> {
        if start.weekday() != Weekday::Sun {
            return Err(ForecastError::InvalidParameter(format!(
                "Weekly series must start on a Sunday, got {} ({})",
                start,
                start.weekday()
            )));
        }
        Ok(Self {
            start: Some(start),
            values,
        })
    }

    /// A series without weeks
    pub fn empty() -> Self {
        Self {
            start: None,
            values: Vec::new(),
        }
    }

    /// Mean daily rides per week
    ///
    /// Days between the first and last day with trips that have no entry
    /// count as zero. A week is divided by its days inside that span, so the
    /// partial first and last weeks are averaged over the days observed. Weeks
    /// without a single trip are missing.
    pub fn from_daily(daily: &DailyCounts) -> Self {
        let (Some(first_day), Some(last_day)) = (daily.first_day(), daily.last_day()) else {
            return Self::empty();
        };

        let mut sums: BTreeMap<NaiveDate, u64> = BTreeMap::new();
        for (day, count) in daily.iter() {
            *sums.entry(week_ending(day)).or_insert(0) += count as u64;
        }
        let points = sums.into_iter().map(|(week, sum)| {
            let from = (week - Duration::days(6)).max(first_day);
            let to = week.min(last_day);
            let days = (to - from).num_days() + 1;
            (week, Some(sum as f64 / days as f64))
        });
        let series = Self::dense(points);
        debug!(
            weeks = series.len(),
            missing = series.missing_count(),
            "Aggregated weekly means"
        );
        series
    }

    /// Snap dated values to their week-ending Sunday on a strict weekly index
    ///
    /// Weeks between the first and last point that no point falls in are
    /// missing. Two points in the same week are rejected. Reindexing the
    /// output of [`WeeklySeries::points`] gives back the same series.
    pub fn reindex<I>(points: I) -> Result<Self>
    where
        I: IntoIterator<Item = (NaiveDate, Option<f64>)>,
    {
        let mut by_week: BTreeMap<NaiveDate, Option<f64>> = BTreeMap::new();
        for (date, value) in points {
            let week = week_ending(date);
            if by_week.insert(week, value).is_some() {
                return Err(ForecastError::DataError(format!(
                    "More than one value for the week ending {}",
                    week
                )));
            }
        }
        Ok(Self::dense(by_week))
    }

    /// [`WeeklySeries::reindex`] for fully observed points
    pub fn from_points<I>(points: I) -> Result<Self>
    where
        I: IntoIterator<Item = (NaiveDate, f64)>,
    {
        Self::reindex(points.into_iter().map(|(d, v)| (d, Some(v))))
    }

    /// Lay out week-keyed values densely; keys must already be Sundays
    fn dense<I>(points: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, Option<f64>)>,
    {
        let mut start: Option<NaiveDate> = None;
        let mut values: Vec<Option<f64>> = Vec::new();
        for (week, value) in points {
            let first = *start.get_or_insert(week);
            let index = ((week - first).num_days() / 7) as usize;
            if values.len() <= index {
                values.resize(index + 1, None);
            }
            values[index] = value;
        }
        Self { start, values }
    }

    /// First week-ending Sunday
    pub fn start(&self) -> Option<NaiveDate> {
        self.start
    }

    /// Last week-ending Sunday
    pub fn end(&self) -> Option<NaiveDate> {
        self.start
            .filter(|_| !self.values.is_empty())
            .map(|s| s + Duration::weeks(self.values.len() as i64 - 1))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    /// Week-ending Sunday of slot `index`
    pub(crate) fn week(&self, index: usize) -> NaiveDate {
        self.start.unwrap_or_default() + Duration::weeks(index as i64)
    }

    /// Week-ending Sundays, one per slot
    pub fn dates(&self) -> Vec<NaiveDate> {
        (0..self.values.len()).map(|i| self.week(i)).collect()
    }

    /// `(week_ending, value)` pairs, one per slot
    pub fn points(&self) -> Vec<(NaiveDate, Option<f64>)> {
        self.dates().into_iter().zip(self.values.iter().copied()).collect()
    }

    /// Value of the week containing `date`; `None` outside the series
    pub fn get(&self, date: NaiveDate) -> Option<Option<f64>> {
        self.index_of(date).map(|i| self.values[i])
    }

    /// Slot of the week containing `date`
    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        let start = self.start?;
        let week = week_ending(date);
        if week < start {
            return None;
        }
        let index = ((week - start).num_days() / 7) as usize;
        (index < self.values.len()).then_some(index)
    }

    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_none()).count()
    }

    pub fn observed_count(&self) -> usize {
        self.values.len() - self.missing_count()
    }

    /// All values, failing if any week is missing
    pub fn complete_values(&self) -> Result<Vec<f64>> {
        let missing = self.missing_count();
        if missing > 0 {
            return Err(ForecastError::MissingValues { count: missing });
        }
        Ok(self.values.iter().flatten().copied().collect())
    }

    /// Weeks whose week-ending Sunday is strictly before `date`
    pub fn before(&self, date: NaiveDate) -> WeeklySeries {
        self.split_at(date).0
    }

    /// Split into the weeks ending strictly before `date` and the rest
    pub fn split_at(&self, date: NaiveDate) -> (WeeklySeries, WeeklySeries) {
        let Some(start) = self.start else {
            return (Self::empty(), Self::empty());
        };
        let cut = if date <= start {
            0
        } else {
            let days = (date - start).num_days();
            (((days + 6) / 7) as usize).min(self.values.len())
        };

        let head = if cut == 0 {
            Self::empty()
        } else {
            Self {
                start: Some(start),
                values: self.values[..cut].to_vec(),
            }
        };
        let tail = if cut == self.values.len() {
            Self::empty()
        } else {
            Self {
                start: Some(self.week(cut)),
                values: self.values[cut..].to_vec(),
            }
        };
        (head, tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_week_ending() {
        assert_eq!(week_ending(date(2017, 7, 16)), date(2017, 7, 16));
        assert_eq!(week_ending(date(2017, 7, 17)), date(2017, 7, 23));
        assert_eq!(week_ending(date(2017, 7, 22)), date(2017, 7, 23));
        assert_eq!(week_ending(date(2016, 12, 31)), date(2017, 1, 1));
    }

    #[test]
    fn test_dense_layout_fills_gaps() {
        let series = WeeklySeries::from_points(vec![
            (date(2015, 1, 4), 10.0),
            (date(2015, 1, 20), 12.0),
        ])
        .unwrap();
        assert_eq!(series.start(), Some(date(2015, 1, 4)));
        assert_eq!(series.end(), Some(date(2015, 1, 25)));
        assert_eq!(series.values(), &[Some(10.0), None, None, Some(12.0)]);
    }

    #[test]
    fn test_same_week_rejected() {
        let result = WeeklySeries::from_points(vec![(date(2015, 1, 5), 1.0), (date(2015, 1, 6), 2.0)]);
        assert!(matches!(result, Err(ForecastError::DataError(_))));
    }

    #[test]
    fn test_split_at_sunday_boundary() {
        let series = WeeklySeries::new(date(2016, 12, 18), vec![Some(1.0), Some(2.0), Some(3.0)])
            .unwrap();
        let (train, test) = series.split_at(date(2017, 1, 1));
        assert_eq!(train.values(), &[Some(1.0), Some(2.0)]);
        assert_eq!(test.start(), Some(date(2017, 1, 1)));
        assert_eq!(test.values(), &[Some(3.0)]);
    }

    #[test]
    fn test_weekly_mean_counts_quiet_days_as_zero() {
        let mut counts = BTreeMap::new();
        counts.insert(date(2015, 1, 5), 7);
        counts.insert(date(2015, 1, 11), 7);
        let weekly = WeeklySeries::from_daily(&DailyCounts { counts });
        assert_eq!(weekly.values(), &[Some(2.0)]);
    }

    #[test]
    fn test_new_requires_sunday() {
        assert!(WeeklySeries::new(date(2017, 1, 2), vec![]).is_err());
    }
}
