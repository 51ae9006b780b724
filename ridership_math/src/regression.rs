//! Ordinary least squares

use crate::linalg::Matrix;
use crate::{MathError, Result};

/// Result of an ordinary least squares fit
#[derive(Debug, Clone)]
pub struct OlsFit {
    /// Estimated coefficients, one per regressor column
    pub coefficients: Vec<f64>,
    /// Standard errors of the coefficients
    pub std_errors: Vec<f64>,
    /// Sum of squared residuals
    pub ssr: f64,
    /// Number of observations
    pub nobs: usize,
}

impl OlsFit {
    /// t statistics of the coefficients
    pub fn t_values(&self) -> Vec<f64> {
        self.coefficients
            .iter()
            .zip(&self.std_errors)
            .map(|(b, se)| b / se)
            .collect()
    }

    /// Gaussian log-likelihood at the estimate
    pub fn log_likelihood(&self) -> f64 {
        let n = self.nobs as f64;
        -0.5 * n * ((2.0 * std::f64::consts::PI).ln() + (self.ssr / n).ln() + 1.0)
    }

    /// Akaike information criterion
    pub fn aic(&self) -> f64 {
        -2.0 * self.log_likelihood() + 2.0 * self.coefficients.len() as f64
    }
}

/// Fit `y = X b + e` by least squares
///
/// `design` holds one row of regressors per observation. Any constant term
/// must be supplied as an explicit column of ones.
pub fn ols(y: &[f64], design: &[Vec<f64>]) -> Result<OlsFit> {
    let n = y.len();
    if design.len() != n {
        return Err(MathError::DimensionMismatch {
            expected: n,
            got: design.len(),
        });
    }
    let x = Matrix::from_rows(design)?;
    let k = x.cols();
    if n <= k {
        return Err(MathError::InsufficientData {
            needed: k + 1,
            got: n,
        });
    }

    let xt = x.transpose();
    let xtx = xt.matmul(&x)?;
    let xty = xt.mul_vec(y)?;
    let xtx_inv = xtx.inverse()?;
    let coefficients = xtx_inv.mul_vec(&xty)?;

    let fitted = x.mul_vec(&coefficients)?;
    let ssr: f64 = y.iter().zip(&fitted).map(|(a, f)| (a - f).powi(2)).sum();
    let sigma2 = ssr / (n - k) as f64;

    let std_errors = (0..k)
        .map(|i| (sigma2 * xtx_inv[(i, i)]).max(0.0).sqrt())
        .collect();

    Ok(OlsFit {
        coefficients,
        std_errors,
        ssr,
        nobs: n,
    })
}
