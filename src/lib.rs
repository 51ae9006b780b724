//! # Ridership Workspace
//!
//! Umbrella crate over the weekly ridership forecasting workspace.
//!
//! - [`math`]: autocorrelation, least squares, linear algebra and
//!   Nelder-Mead optimization
//! - [`forecast`]: trip ingestion, weekly aggregation, diagnostics, ARIMA
//!   models, model files and inference
//!
//! ## Example
//!
//! ```
//! use chrono::NaiveDate;
//! use ridership_workspace::forecast::week_ending;
//!
//! let tuesday = NaiveDate::from_ymd_opt(2017, 1, 3).unwrap();
//! assert_eq!(week_ending(tuesday), NaiveDate::from_ymd_opt(2017, 1, 8).unwrap());
//! ```

pub use ridership_forecast as forecast;
pub use ridership_math as math;
