//! Autocorrelation structure of a series
//!
//! Contains:
//! - Sample autocovariance and autocorrelation (ACF)
//! - Partial autocorrelation (PACF) from Yule-Walker equations
//! - Differencing

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};

/// Autocovariance normalization used by the Yule-Walker PACF
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacfMethod {
    /// Divide lag-k sums by `n` (the maximum likelihood estimate)
    #[default]
    YuleWalkerMle,
    /// Divide lag-k sums by `n - k`
    YuleWalkerAdjusted,
}

/// Difference a series `order` times
///
/// Each pass shortens the series by one element.
pub fn difference(values: &[f64], order: usize) -> Vec<f64> {
    let mut current = values.to_vec();
    for _ in 0..order {
        current = current.windows(2).map(|w| w[1] - w[0]).collect();
    }
    current
}

/// Sample autocovariances for lags `0..=nlags`
pub fn autocovariance(values: &[f64], nlags: usize, adjusted: bool) -> Result<Vec<f64>> {
    let n = values.len();
    if nlags >= n {
        return Err(MathError::InsufficientData {
            needed: nlags + 1,
            got: n,
        });
    }

    let mean = values.iter().sum::<f64>() / n as f64;
    let centered: Vec<f64> = values.iter().map(|v| v - mean).collect();

    Ok((0..=nlags)
        .map(|lag| {
            let sum: f64 = centered[lag..]
                .iter()
                .zip(&centered[..n - lag])
                .map(|(a, b)| a * b)
                .sum();
            let denom = if adjusted { n - lag } else { n };
            sum / denom as f64
        })
        .collect())
}

/// Autocorrelation function for lags `0..=nlags`
///
/// The first element is always 1.0.
pub fn acf(values: &[f64], nlags: usize) -> Result<Vec<f64>> {
    let acov = autocovariance(values, nlags, false)?;
    let c0 = acov[0];
    if c0 <= 0.0 {
        return Err(MathError::CalculationError(
            "Autocorrelation is undefined for a constant series".to_string(),
        ));
    }
    Ok(acov.iter().map(|c| c / c0).collect())
}

/// Partial autocorrelation function for lags `0..=nlags`
///
/// Solves the Yule-Walker equations of increasing order with the
/// Durbin-Levinson recursion. `nlags` may be at most half the sample size.
pub fn pacf(values: &[f64], nlags: usize, method: PacfMethod) -> Result<Vec<f64>> {
    let n = values.len();
    if nlags > n / 2 {
        return Err(MathError::InsufficientData {
            needed: 2 * nlags,
            got: n,
        });
    }

    let adjusted = matches!(method, PacfMethod::YuleWalkerAdjusted);
    let r = autocovariance(values, nlags, adjusted)?;
    if r[0] <= 0.0 {
        return Err(MathError::CalculationError(
            "Partial autocorrelation is undefined for a constant series".to_string(),
        ));
    }

    let mut result = Vec::with_capacity(nlags + 1);
    result.push(1.0);

    let mut phi: Vec<f64> = Vec::with_capacity(nlags);
    for k in 1..=nlags {
        let numerator = r[k] - (1..k).map(|j| phi[j - 1] * r[k - j]).sum::<f64>();
        let denominator = r[0] - (1..k).map(|j| phi[j - 1] * r[j]).sum::<f64>();
        if denominator.abs() < f64::EPSILON {
            return Err(MathError::CalculationError(format!(
                "Durbin-Levinson recursion broke down at lag {}",
                k
            )));
        }
        let phi_kk = numerator / denominator;

        let previous = phi.clone();
        for j in 1..k {
            phi[j - 1] = previous[j - 1] - phi_kk * previous[k - j - 1];
        }
        phi.push(phi_kk);
        result.push(phi_kk);
    }

    Ok(result)
}

/// Half-width of the approximate 95% band for white-noise correlations
pub fn significance_bound(n: usize) -> f64 {
    if n == 0 {
        return f64::NAN;
    }
    1.96 / (n as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_difference_orders() {
        let values = vec![1.0, 4.0, 9.0, 16.0];
        assert_eq!(difference(&values, 1), vec![3.0, 5.0, 7.0]);
        assert_eq!(difference(&values, 2), vec![2.0, 2.0]);
        assert_eq!(difference(&values, 0), values);
    }

    #[test]
    fn test_acf_lag_zero_is_one() {
        let values: Vec<f64> = (0..20).map(|i| (i as f64 * 0.7).sin()).collect();
        let r = acf(&values, 5).unwrap();
        assert_eq!(r.len(), 6);
        assert!((r[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_acf_rejects_constant_series() {
        assert!(acf(&[3.0; 10], 2).is_err());
    }

    #[test]
    fn test_pacf_lag_one_matches_acf() {
        let values: Vec<f64> = (0..40).map(|i| (i as f64 * 0.3).cos() + i as f64 * 0.01).collect();
        let r = acf(&values, 3).unwrap();
        let p = pacf(&values, 3, PacfMethod::YuleWalkerMle).unwrap();
        assert!((p[1] - r[1]).abs() < 1e-12);
    }

    #[test]
    fn test_pacf_lag_two_closed_form() {
        let values: Vec<f64> = (0..50).map(|i| ((i * i) % 7) as f64).collect();
        let r = acf(&values, 2).unwrap();
        let p = pacf(&values, 2, PacfMethod::YuleWalkerMle).unwrap();
        let expected = (r[2] - r[1] * r[1]) / (1.0 - r[1] * r[1]);
        assert!((p[2] - expected).abs() < 1e-10);
    }

    #[test]
    fn test_pacf_lag_limit() {
        let values: Vec<f64> = (0..10).map(|i| i as f64).collect();
        assert!(matches!(
            pacf(&values, 6, PacfMethod::YuleWalkerMle),
            Err(MathError::InsufficientData { .. })
        ));
    }
}
