//! Hold-out validation
//!
//! The model is estimated on the weeks before a cutoff, then the estimated
//! parameters are transplanted onto the full series. The one-step-ahead
//! predictions for weeks at or after the cutoff are compared with what was
//! observed.

use crate::error::{ForecastError, Result};
use crate::models::{ArimaModel, ArimaParams, FittedArima, WeekPrediction};
use crate::series::WeeklySeries;
use crate::utils::{forecast_accuracy, ForecastAccuracy};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Outcome of a hold-out validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// First day outside the training window
    pub train_end: NaiveDate,
    /// Weeks in the training window
    pub train_weeks: usize,
    /// Parameters estimated on the training window
    pub params: ArimaParams,
    /// One-step-ahead predictions for the held-out weeks
    pub held_out: Vec<WeekPrediction>,
    pub accuracy: ForecastAccuracy,
    /// Share of observed held-out weeks inside their interval
    pub coverage: f64,
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Trained on {} weeks before {}, {} held-out weeks",
            self.train_weeks,
            self.train_end,
            self.held_out.len()
        )?;
        write!(f, "{}", self.accuracy)?;
        writeln!(f, "  Interval coverage: {:.1}%", self.coverage * 100.0)
    }
}

/// Fit on the weeks ending before `train_end` and score the rest
///
/// Returns the report and the model trained on the training window.
pub fn validate(
    weekly: &WeeklySeries,
    train_end: NaiveDate,
    model: &ArimaModel,
) -> Result<(ValidationReport, FittedArima)> {
    let (train, _) = weekly.split_at(train_end);
    let trained = model.fit(&train)?;
    let transplanted = trained.apply_to(weekly)?;

    let held_out: Vec<WeekPrediction> = transplanted
        .predictions()
        .into_iter()
        .skip(train.len())
        .collect();
    if held_out.is_empty() {
        return Err(ForecastError::InsufficientData { needed: 1, got: 0 });
    }

    let means: Vec<f64> = held_out.iter().map(|p| p.mean).collect();
    let observed: Vec<Option<f64>> = held_out.iter().map(|p| p.observed).collect();
    let accuracy = forecast_accuracy(&means, &observed)?;

    let checks: Vec<bool> = held_out.iter().filter_map(WeekPrediction::covers).collect();
    let coverage = checks.iter().filter(|c| **c).count() as f64 / checks.len() as f64;

    info!(
        train_weeks = train.len(),
        held_out = held_out.len(),
        mae = accuracy.mae,
        rmse = accuracy.rmse,
        coverage,
        "Validated on held-out weeks"
    );

    Ok((
        ValidationReport {
            train_end,
            train_weeks: train.len(),
            params: trained.params().clone(),
            held_out,
            accuracy,
            coverage,
        },
        trained,
    ))
}
