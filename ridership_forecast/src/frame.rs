//! Tabular export of the intermediate series
//!
//! The series are turned into polars DataFrames and written as CSV for
//! downstream plotting tools. Dates are written as ISO `YYYY-MM-DD` strings.

use crate::error::Result;
use crate::models::WeekPrediction;
use crate::series::{DailyCounts, WeeklySeries};
use chrono::NaiveDate;
use polars::prelude::*;
use std::fs::{self, File};
use std::path::Path;
use tracing::debug;

fn iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// `date, rides` for every day with at least one trip
pub fn daily_frame(daily: &DailyCounts) -> Result<DataFrame> {
    let (dates, rides): (Vec<String>, Vec<u32>) = daily.iter().map(|(d, c)| (iso(d), c)).unzip();
    let df = DataFrame::new(vec![Series::new("date", dates), Series::new("rides", rides)])?;
    Ok(df)
}

/// `week_ending, mean_rides` with nulls for missing weeks
pub fn weekly_frame(weekly: &WeeklySeries) -> Result<DataFrame> {
    let dates: Vec<String> = weekly.dates().into_iter().map(iso).collect();
    let values: Vec<Option<f64>> = weekly.values().to_vec();
    let df = DataFrame::new(vec![
        Series::new("week_ending", dates),
        Series::new("mean_rides", values),
    ])?;
    Ok(df)
}

/// One row per predicted week with its interval and observation
pub fn prediction_frame(predictions: &[WeekPrediction]) -> Result<DataFrame> {
    let dates: Vec<String> = predictions.iter().map(|p| iso(p.week_ending)).collect();
    let observed: Vec<Option<f64>> = predictions.iter().map(|p| p.observed).collect();
    let mean: Vec<f64> = predictions.iter().map(|p| p.mean).collect();
    let lower: Vec<f64> = predictions.iter().map(|p| p.lower).collect();
    let upper: Vec<f64> = predictions.iter().map(|p| p.upper).collect();

    let df = DataFrame::new(vec![
        Series::new("week_ending", dates),
        Series::new("observed", observed),
        Series::new("predicted", mean),
        Series::new("lower", lower),
        Series::new("upper", upper),
    ])?;
    Ok(df)
}

/// Write a frame as CSV with a header row
pub fn write_csv<P: AsRef<Path>>(df: &mut DataFrame, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).has_header(true).finish(df)?;
    debug!(path = %path.display(), rows = df.height(), "Wrote CSV export");
    Ok(())
}
