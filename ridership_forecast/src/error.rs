//! Error types for the ridership_forecast crate

use chrono::NaiveDate;
use polars::prelude::PolarsError;
use ridership_math::MathError;
use std::path::PathBuf;
use thiserror::Error;

/// Custom error types for the ridership_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Error related to data validation or processing
    #[error("Data error: {0}")]
    DataError(String),

    /// A trip row that cannot be ingested under the abort policy
    #[error("Malformed row at line {line}: {reason}")]
    MalformedRow { line: u64, reason: String },

    /// A date or timestamp string in no recognised format
    #[error("Unparseable date '{0}'")]
    DateParse(String),

    /// The series has gaps where the operation needs complete data
    #[error("Series has {count} missing values; this operation needs a complete series")]
    MissingValues { count: usize },

    /// Too few observations for a decomposition, test or model fit
    #[error("Insufficient observations: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// No model file at the given location
    #[error("Model file not found: {}", .0.display())]
    ModelNotFound(PathBuf),

    /// The model file exists but cannot be turned back into a model
    #[error("Corrupt model file: {0}")]
    CorruptModel(String),

    /// A date before the first week the model knows about
    #[error("Date {date} is before the first modelled week ending {first_week}")]
    DateOutOfRange { date: NaiveDate, first_week: NaiveDate },

    /// Error related to model estimation or filtering
    #[error("Model error: {0}")]
    ModelError(String),

    /// Error from mathematical operations
    #[error("Math error: {0}")]
    MathError(#[from] MathError),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from the CSV reader
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Error from JSON (de)serialization
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}

impl From<chrono::ParseError> for ForecastError {
    fn from(err: chrono::ParseError) -> Self {
        ForecastError::DateParse(err.to_string())
    }
}

impl ForecastError {
    /// Lift a math-crate shortage into the crate's own insufficient-data error
    pub(crate) fn from_math(err: MathError) -> Self {
        match err {
            MathError::InsufficientData { needed, got } => {
                ForecastError::InsufficientData { needed, got }
            }
            other => ForecastError::MathError(other),
        }
    }
}
