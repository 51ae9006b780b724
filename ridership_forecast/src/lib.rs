//! # Ridership Forecast
//!
//! Weekly bike-share ridership forecasting.
//!
//! ## Features
//!
//! - Trip file ingestion with configurable handling of malformed rows
//! - Failed-ride cleaning (same station, shorter than two minutes)
//! - Daily counts and strictly weekly mean series
//! - Diagnostics: additive seasonal decomposition, ADF test, ACF/PACF
//! - ARIMA models estimated by exact maximum likelihood (Kalman filter)
//! - Hold-out validation with parameters frozen from a training window
//! - Model files and a date-to-prediction lookup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ridership_forecast::inference::WeeklyForecaster;
//! use ridership_forecast::models::ArimaModel;
//! use ridership_forecast::persistence::save_model;
//! use ridership_forecast::series::{DailyCounts, WeeklySeries};
//! use ridership_forecast::trips::{clean, TripLoader};
//!
//! # fn main() -> ridership_forecast::error::Result<()> {
//! let batch = TripLoader::from_csv_files(&["2015-Q1.csv", "2015-Q2.csv"])?;
//! let (trips, _removed) = clean(batch.trips, 120.0);
//! let weekly = WeeklySeries::from_daily(&DailyCounts::from_trips(&trips));
//!
//! let model = ArimaModel::new(2, 1, 2).fit(&weekly)?;
//! save_model(&model, "weekly_arima.json")?;
//!
//! let forecaster = WeeklyForecaster::from_file("weekly_arima.json")?;
//! let rides = forecaster.forecast("Jan 3, 2017")?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod frame;
pub mod inference;
pub mod models;
pub mod persistence;
pub mod pipeline;
pub mod series;
pub mod trips;
pub mod utils;
pub mod validation;

// Re-export commonly used types
pub use crate::config::PipelineConfig;
pub use crate::error::ForecastError;
pub use crate::inference::WeeklyForecaster;
pub use crate::models::{ArimaModel, ArimaOrder, FittedArima, WeekPrediction};
pub use crate::series::{week_ending, DailyCounts, WeeklySeries};
pub use crate::trips::{TripLoader, TripRecord};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
