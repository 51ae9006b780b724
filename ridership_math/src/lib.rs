//! # Ridership Math
//!
//! Numerical building blocks for ridership time series analysis.
//! This crate provides the routines the forecasting crate is assembled from:
//! autocorrelation and partial autocorrelation, least-squares regression,
//! small dense linear algebra and derivative-free optimization.

use thiserror::Error;

pub mod correlation;
pub mod linalg;
pub mod optimize;
pub mod regression;

pub use correlation::{acf, difference, pacf, PacfMethod};
pub use linalg::Matrix;
pub use optimize::{nelder_mead, NelderMeadConfig, NelderMeadResult};
pub use regression::{ols, OlsFit};

/// Errors that can occur in numerical calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Matrix is singular or nearly singular")]
    Singular,

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for numerical operations
pub type Result<T> = std::result::Result<T, MathError>;
