//! Date-to-prediction lookup on a saved model

use crate::error::Result;
use crate::models::{FittedArima, WeekPrediction};
use crate::persistence::load_model;
use crate::utils::date_parser::parse_date;
use chrono::NaiveDate;
use std::path::Path;
use tracing::debug;

/// Answers "how many rides per day in the week of this date?"
#[derive(Debug, Clone)]
pub struct WeeklyForecaster {
    model: FittedArima,
}

impl WeeklyForecaster {
    pub fn new(model: FittedArima) -> Self {
        Self { model }
    }

    /// Load the model file written by the fit stage
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(load_model(path)?))
    }

    pub fn model(&self) -> &FittedArima {
        &self.model
    }

    /// Point prediction for the week containing the given date
    ///
    /// Any common date spelling is accepted, e.g. `2017-01-03`, `01-03-2017`
    /// or `Jan 3, 2017`.
    pub fn forecast(&self, date: &str) -> Result<f64> {
        let date = parse_date(date)?;
        Ok(self.forecast_week(date)?.mean)
    }

    /// Full prediction for the week containing `date`
    pub fn forecast_week(&self, date: NaiveDate) -> Result<WeekPrediction> {
        let prediction = self.model.predict_at(date)?;
        debug!(%date, week = %prediction.week_ending, mean = prediction.mean, "Forecast");
        Ok(prediction)
    }
}
