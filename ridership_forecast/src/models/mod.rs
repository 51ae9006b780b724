//! Forecasting models for weekly ridership series

use crate::error::{ForecastError, Result};
use crate::series::WeeklySeries;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use std::fmt::{self, Debug};

/// Non-seasonal ARIMA order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArimaOrder {
    /// Autoregressive order
    pub p: usize,
    /// Differencing order
    pub d: usize,
    /// Moving-average order
    pub q: usize,
}

impl ArimaOrder {
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self { p, d, q }
    }

    /// Number of estimated parameters, the innovation variance included
    pub fn num_params(&self) -> usize {
        self.p + self.q + 1
    }

    /// Fewest observed weeks a fit can work with
    pub fn min_observations(&self) -> usize {
        self.d + self.num_params() + 1
    }
}

impl Default for ArimaOrder {
    fn default() -> Self {
        Self::new(2, 1, 2)
    }
}

impl fmt::Display for ArimaOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ARIMA({},{},{})", self.p, self.d, self.q)
    }
}

/// Prediction for one week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekPrediction {
    /// Sunday closing the predicted week
    pub week_ending: NaiveDate,
    /// Point prediction
    pub mean: f64,
    /// Prediction variance
    pub variance: f64,
    /// Lower confidence bound
    pub lower: f64,
    /// Upper confidence bound
    pub upper: f64,
    /// Observed value of the week, when there is one
    pub observed: Option<f64>,
}

impl WeekPrediction {
    pub(crate) fn new(
        week_ending: NaiveDate,
        mean: f64,
        variance: f64,
        z: f64,
        observed: Option<f64>,
    ) -> Self {
        let half_width = z * variance.max(0.0).sqrt();
        Self {
            week_ending,
            mean,
            variance,
            lower: mean - half_width,
            upper: mean + half_width,
            observed,
        }
    }

    /// Whether the observed value, if any, lies within the interval
    pub fn covers(&self) -> Option<bool> {
        self.observed
            .map(|value| value >= self.lower && value <= self.upper)
    }
}

/// Two-sided standard normal quantile for the given coverage
pub fn normal_quantile(confidence_level: f64) -> Result<f64> {
    if !(confidence_level > 0.0 && confidence_level < 1.0) {
        return Err(ForecastError::InvalidParameter(
            "Confidence level must be between 0 and 1".to_string(),
        ));
    }
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| ForecastError::ModelError(format!("Normal distribution: {}", e)))?;
    Ok(normal.inverse_cdf(0.5 + confidence_level / 2.0))
}

/// Trained forecast model
pub trait TrainedForecastModel: Debug {
    /// Forecast the weeks following the end of the series
    fn forecast(&self, horizons: usize) -> Result<Vec<WeekPrediction>>;

    /// One-step-ahead predictions over another series, without re-estimation
    fn predict(&self, series: &WeeklySeries) -> Result<Vec<WeekPrediction>>;

    /// Name of the model
    fn name(&self) -> String;
}

/// Forecast model that can be trained on a weekly series
pub trait ForecastModel: Debug + Clone {
    /// The type of trained model produced
    type Trained: TrainedForecastModel;

    /// Train the model on a weekly series
    fn train(&self, series: &WeeklySeries) -> Result<Self::Trained>;

    /// Get the name of the model
    fn name(&self) -> String;
}

pub mod arima;
pub mod state_space;

pub use arima::{ArimaModel, ArimaParams, FittedArima};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_display_and_counts() {
        let order = ArimaOrder::default();
        assert_eq!(order.to_string(), "ARIMA(2,1,2)");
        assert_eq!(order.num_params(), 5);
        assert_eq!(order.min_observations(), 7);
    }

    #[test]
    fn test_normal_quantile() {
        let z = normal_quantile(0.95).unwrap();
        assert!((z - 1.959964).abs() < 1e-5);
        assert!(normal_quantile(1.0).is_err());
    }

    #[test]
    fn test_interval_and_coverage() {
        let week = NaiveDate::from_ymd_opt(2017, 1, 8).unwrap();
        let p = WeekPrediction::new(week, 100.0, 4.0, 2.0, Some(103.0));
        assert_eq!(p.lower, 96.0);
        assert_eq!(p.upper, 104.0);
        assert_eq!(p.covers(), Some(true));
    }
}
