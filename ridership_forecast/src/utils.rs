//! Utility functions for the ridership_forecast crate

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};

/// Parsing of the date and timestamp spellings found in trip files and
/// forecast requests
pub mod date_parser {
    use super::*;
    use chrono::{DateTime, NaiveDate, NaiveDateTime};

    /// Trip file timestamps, `month/day/year hour:minute` first
    const TIMESTAMP_FORMATS: &[&str] = &[
        "%m/%d/%Y %H:%M",
        "%m/%d/%Y %H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
    ];

    // Two-digit year formats come before their four-digit twins and
    // year-first formats come last; `%Y` would otherwise read "01/03/17" as
    // the year 17.
    const DATE_FORMATS: &[&str] = &[
        "%m-%d-%y",
        "%m-%d-%Y",
        "%m/%d/%y",
        "%m/%d/%Y",
        "%Y-%m-%d",
        "%Y/%m/%d",
        "%b %d, %Y",
        "%B %d, %Y",
        "%b %d %Y",
        "%B %d %Y",
        "%d %b %Y",
        "%d %B %Y",
    ];

    /// Parse a trip start/stop timestamp
    pub fn parse_timestamp(input: &str) -> Result<NaiveDateTime> {
        let trimmed = input.trim();
        TIMESTAMP_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
            .ok_or_else(|| ForecastError::DateParse(input.to_string()))
    }

    /// Parse a calendar date from any common textual representation
    ///
    /// Timestamps are accepted too; their time of day is discarded.
    pub fn parse_date(input: &str) -> Result<NaiveDate> {
        let trimmed = input.trim();
        if let Some(date) = DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        {
            return Ok(date);
        }
        if let Ok(ts) = parse_timestamp(trimmed) {
            return Ok(ts.date());
        }
        DateTime::parse_from_rfc3339(trimmed)
            .map(|dt| dt.date_naive())
            .map_err(|_| ForecastError::DateParse(input.to_string()))
    }
}

/// Calculate accuracy metrics for predictions vs actual values
///
/// Pairs where the actual value is missing are skipped.
pub fn forecast_accuracy(predicted: &[f64], actual: &[Option<f64>]) -> Result<ForecastAccuracy> {
    if predicted.len() != actual.len() {
        return Err(ForecastError::InvalidParameter(format!(
            "Prediction length ({}) doesn't match actual length ({})",
            predicted.len(),
            actual.len()
        )));
    }

    let pairs: Vec<(f64, f64)> = predicted
        .iter()
        .zip(actual)
        .filter_map(|(&p, a)| a.map(|a| (p, a)))
        .collect();

    if pairs.is_empty() {
        return Err(ForecastError::InsufficientData { needed: 1, got: 0 });
    }

    let n = pairs.len() as f64;

    // Mean Absolute Error
    let mae = pairs.iter().map(|(p, a)| (a - p).abs()).sum::<f64>() / n;

    // Root Mean Squared Error
    let mse = pairs.iter().map(|(p, a)| (a - p).powi(2)).sum::<f64>() / n;
    let rmse = mse.sqrt();

    // Mean Absolute Percentage Error, over non-zero actuals
    let nonzero: Vec<&(f64, f64)> = pairs.iter().filter(|(_, a)| *a != 0.0).collect();
    let mape = if nonzero.is_empty() {
        f64::NAN
    } else {
        nonzero
            .iter()
            .map(|(p, a)| ((a - p) / a).abs() * 100.0)
            .sum::<f64>()
            / nonzero.len() as f64
    };

    Ok(ForecastAccuracy {
        mae,
        rmse,
        mape,
        observations: pairs.len(),
    })
}

/// Forecast accuracy metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastAccuracy {
    /// Mean Absolute Error
    pub mae: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Percentage Error
    pub mape: f64,
    /// Number of observed weeks the metrics cover
    pub observations: usize,
}

impl std::fmt::Display for ForecastAccuracy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Forecast Accuracy Metrics ({} weeks):", self.observations)?;
        writeln!(f, "  MAE:   {:.4}", self.mae)?;
        writeln!(f, "  RMSE:  {:.4}", self.rmse)?;
        writeln!(f, "  MAPE:  {:.4}%", self.mape)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::date_parser::{parse_date, parse_timestamp};
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_parse_trip_timestamp() {
        let ts = parse_timestamp("1/1/2015 0:14").unwrap();
        assert_eq!(ts.date(), NaiveDate::from_ymd_opt(2015, 1, 1).unwrap());
        assert_eq!(ts.format("%H:%M").to_string(), "00:14");
    }

    #[test]
    fn test_parse_date_variants() {
        let expected = NaiveDate::from_ymd_opt(2017, 1, 3).unwrap();
        for input in [
            "2017-01-03",
            "01-03-2017",
            "01/03/2017",
            "01/03/17",
            "Jan 3, 2017",
            "January 3, 2017",
            "3 Jan 2017",
            "1/3/2017 8:15",
            "2017-01-03T10:00:00+00:00",
        ] {
            assert_eq!(parse_date(input).unwrap(), expected, "input {}", input);
        }
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert!(matches!(
            parse_date("not a date"),
            Err(ForecastError::DateParse(_))
        ));
    }

    #[test]
    fn test_forecast_accuracy_skips_missing() {
        let acc = forecast_accuracy(&[10.0, 12.0, 8.0], &[Some(11.0), None, Some(10.0)]).unwrap();
        assert_eq!(acc.observations, 2);
        assert!((acc.mae - 1.5).abs() < 1e-12);
        assert!((acc.rmse - (2.5f64).sqrt()).abs() < 1e-12);
    }
}
