//! Statistical diagnostics of the weekly series
//!
//! Contains:
//! - Classical additive seasonal decomposition
//! - Augmented Dickey-Fuller unit-root test with MacKinnon p-values
//! - Correlograms (ACF and PACF with the white-noise band)

use crate::config::DiagnosticsConfig;
use crate::error::{ForecastError, Result};
use crate::series::WeeklySeries;
use ridership_math::correlation::significance_bound;
use ridership_math::{acf, difference, ols, pacf, PacfMethod};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use std::fmt;
use tracing::{debug, info};

/// Additive decomposition `observed = trend + seasonal + residual`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decomposition {
    pub period: usize,
    pub observed: Vec<f64>,
    /// Centred moving average; `None` for the first and last `period / 2` points
    pub trend: Vec<Option<f64>>,
    pub seasonal: Vec<f64>,
    /// `None` wherever the trend is
    pub residual: Vec<Option<f64>>,
}

/// Classical additive decomposition with a centred moving-average trend
pub fn decompose(values: &[f64], period: usize) -> Result<Decomposition> {
    if period < 2 {
        return Err(ForecastError::InvalidParameter(
            "Seasonal period must be at least 2".to_string(),
        ));
    }
    let n = values.len();
    if n < 2 * period {
        return Err(ForecastError::InsufficientData {
            needed: 2 * period,
            got: n,
        });
    }

    // 2 x period filter for even periods
    let weights: Vec<f64> = if period % 2 == 0 {
        let mut w = vec![1.0 / period as f64; period + 1];
        w[0] = 0.5 / period as f64;
        w[period] = 0.5 / period as f64;
        w
    } else {
        vec![1.0 / period as f64; period]
    };
    let half = weights.len() / 2;

    let trend: Vec<Option<f64>> = (0..n)
        .map(|t| {
            if t < half || t + weights.len() - half > n {
                None
            } else {
                Some(
                    weights
                        .iter()
                        .enumerate()
                        .map(|(j, w)| w * values[t + j - half])
                        .sum(),
                )
            }
        })
        .collect();

    let detrended: Vec<Option<f64>> = values
        .iter()
        .zip(&trend)
        .map(|(x, t)| t.map(|t| x - t))
        .collect();

    let mut period_means: Vec<f64> = (0..period)
        .map(|phase| {
            let present: Vec<f64> = detrended
                .iter()
                .skip(phase)
                .step_by(period)
                .flatten()
                .copied()
                .collect();
            present.iter().sum::<f64>() / present.len() as f64
        })
        .collect();
    let overall = period_means.iter().sum::<f64>() / period as f64;
    period_means.iter_mut().for_each(|m| *m -= overall);

    let seasonal: Vec<f64> = (0..n).map(|t| period_means[t % period]).collect();
    let residual = detrended
        .iter()
        .zip(&seasonal)
        .map(|(d, s)| d.map(|d| d - s))
        .collect();

    Ok(Decomposition {
        period,
        observed: values.to_vec(),
        trend,
        seasonal,
        residual,
    })
}

/// Critical values of the test statistic
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriticalValues {
    pub one_percent: f64,
    pub five_percent: f64,
    pub ten_percent: f64,
}

/// Result of an augmented Dickey-Fuller test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdfResult {
    /// t statistic of the lagged level
    pub statistic: f64,
    /// MacKinnon approximate p-value
    pub p_value: f64,
    /// Lagged differences in the final regression
    pub used_lag: usize,
    /// Observations in the final regression
    pub nobs: usize,
    pub critical_values: CriticalValues,
    /// Best information criterion of the lag search
    pub ic_best: f64,
}

impl AdfResult {
    /// Whether a unit root is rejected at the given level
    pub fn is_stationary(&self, significance: f64) -> bool {
        self.p_value < significance
    }
}

impl fmt::Display for AdfResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ADF Statistic: {:.6}", self.statistic)?;
        writeln!(f, "p-value: {:.6}", self.p_value)?;
        writeln!(f, "Lags used: {}  Observations: {}", self.used_lag, self.nobs)?;
        writeln!(f, "Critical Values:")?;
        writeln!(f, "  1%: {:.3}", self.critical_values.one_percent)?;
        writeln!(f, "  5%: {:.3}", self.critical_values.five_percent)?;
        writeln!(f, "  10%: {:.3}", self.critical_values.ten_percent)?;
        Ok(())
    }
}

/// Augmented Dickey-Fuller test with a constant
///
/// The number of lagged differences is chosen by AIC from
/// `0..=ceil(12 (n/100)^(1/4))`, all candidates fit on a common sample.
pub fn adf_test(values: &[f64]) -> Result<AdfResult> {
    let n = values.len();
    let maxlag = (12.0 * (n as f64 / 100.0).powf(0.25)).ceil() as usize;
    if n / 2 < 2 {
        return Err(ForecastError::InsufficientData { needed: 4, got: n });
    }
    let maxlag = maxlag.min(n / 2 - 2);

    let diffs = difference(values, 1);
    let common = diffs.len() - maxlag;

    let mut best: Option<(f64, usize)> = None;
    for lag in 0..=maxlag {
        let (y, x) = adf_regression(values, &diffs, lag, common);
        let fit = ols(&y, &x).map_err(ForecastError::from_math)?;
        let aic = fit.aic();
        if best.map_or(true, |(b, _)| aic < b) {
            best = Some((aic, lag));
        }
    }
    let (ic_best, used_lag) =
        best.ok_or_else(|| ForecastError::ModelError("ADF lag search found no fit".to_string()))?;

    let nobs = diffs.len() - used_lag;
    let (y, x) = adf_regression(values, &diffs, used_lag, nobs);
    let fit = ols(&y, &x).map_err(ForecastError::from_math)?;
    let statistic = fit.t_values()[1];
    let p_value = mackinnon_p_value(statistic)?;
    let critical_values = mackinnon_critical_values(nobs);

    debug!(maxlag, used_lag, nobs, statistic, "ADF regression");
    Ok(AdfResult {
        statistic,
        p_value,
        used_lag,
        nobs,
        critical_values,
        ic_best,
    })
}

/// Regress the last `nobs` differences on a constant, the lagged level and
/// `lags` lagged differences
fn adf_regression(
    levels: &[f64],
    diffs: &[f64],
    lags: usize,
    nobs: usize,
) -> (Vec<f64>, Vec<Vec<f64>>) {
    let m = diffs.len();
    let rows = (m - nobs)..m;
    let y = diffs[rows.clone()].to_vec();
    let x = rows
        .map(|t| {
            let mut row = Vec::with_capacity(lags + 2);
            row.push(1.0);
            row.push(levels[t]);
            row.extend((1..=lags).map(|j| diffs[t - j]));
            row
        })
        .collect();
    (y, x)
}

const TAU_MAX: f64 = 2.74;
const TAU_MIN: f64 = -18.83;
const TAU_STAR: f64 = -1.61;
const TAU_SMALL_P: [f64; 3] = [2.1659, 1.4412, 0.038269];
const TAU_LARGE_P: [f64; 4] = [1.7339, 0.93202, -0.12745, -0.010368];

/// MacKinnon (1994) approximate p-value, constant-only regression
fn mackinnon_p_value(statistic: f64) -> Result<f64> {
    if statistic > TAU_MAX {
        return Ok(1.0);
    }
    if statistic < TAU_MIN {
        return Ok(0.0);
    }
    let coefficients: &[f64] = if statistic <= TAU_STAR {
        &TAU_SMALL_P
    } else {
        &TAU_LARGE_P
    };
    let z = polyval(coefficients, statistic);
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| ForecastError::ModelError(format!("Normal distribution: {}", e)))?;
    Ok(normal.cdf(z))
}

/// MacKinnon (2010) critical values, constant-only regression
fn mackinnon_critical_values(nobs: usize) -> CriticalValues {
    const ONE: [f64; 4] = [-3.43035, -6.5393, -16.786, -79.433];
    const FIVE: [f64; 4] = [-2.86154, -2.8903, -4.234, -40.040];
    const TEN: [f64; 4] = [-2.56677, -1.5384, -2.809, 0.0];
    let inv = 1.0 / nobs as f64;
    CriticalValues {
        one_percent: polyval(&ONE, inv),
        five_percent: polyval(&FIVE, inv),
        ten_percent: polyval(&TEN, inv),
    }
}

/// `c0 + c1 x + c2 x^2 + ...`
fn polyval(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// ACF and PACF up to some lag
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Correlogram {
    /// Autocorrelations for lags `0..=max_lag`
    pub acf: Vec<f64>,
    /// Partial autocorrelations for lags `0..=max_lag`
    pub pacf: Vec<f64>,
    /// Half-width of the approximate 95% white-noise band
    pub bound: f64,
    pub nobs: usize,
}

impl Correlogram {
    /// Lags (from 1) whose partial autocorrelation lies outside the band
    pub fn significant_pacf_lags(&self) -> Vec<usize> {
        self.pacf
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, v)| v.abs() > self.bound)
            .map(|(lag, _)| lag)
            .collect()
    }

    /// Lags (from 1) whose autocorrelation lies outside the band
    pub fn significant_acf_lags(&self) -> Vec<usize> {
        self.acf
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, v)| v.abs() > self.bound)
            .map(|(lag, _)| lag)
            .collect()
    }
}

pub fn correlogram(values: &[f64], max_lag: usize, method: PacfMethod) -> Result<Correlogram> {
    Ok(Correlogram {
        acf: acf(values, max_lag).map_err(ForecastError::from_math)?,
        pacf: pacf(values, max_lag, method).map_err(ForecastError::from_math)?,
        bound: significance_bound(values.len()),
        nobs: values.len(),
    })
}

/// Everything the diagnostic stage computes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsReport {
    pub decomposition: Decomposition,
    pub adf_levels: AdfResult,
    pub adf_differenced: AdfResult,
    pub correlogram_levels: Correlogram,
    pub correlogram_differenced: Correlogram,
}

/// Run all diagnostics on a complete weekly series
pub fn run_diagnostics(
    series: &WeeklySeries,
    config: &DiagnosticsConfig,
) -> Result<DiagnosticsReport> {
    let values = series.complete_values()?;
    let differenced = difference(&values, 1);

    let decomposition = decompose(&values, config.seasonal_period)?;
    let adf_levels = adf_test(&values)?;
    let adf_differenced = adf_test(&differenced)?;
    let correlogram_levels = correlogram(&values, config.max_lag, config.pacf_method)?;
    let correlogram_differenced = correlogram(&differenced, config.max_lag, config.pacf_method)?;

    info!(
        adf_levels = adf_levels.statistic,
        p_levels = adf_levels.p_value,
        adf_differenced = adf_differenced.statistic,
        p_differenced = adf_differenced.p_value,
        "Unit-root tests"
    );
    debug!(
        pacf_lags = ?correlogram_differenced.significant_pacf_lags(),
        acf_lags = ?correlogram_differenced.significant_acf_lags(),
        "Significant lags of the differenced series"
    );

    Ok(DiagnosticsReport {
        decomposition,
        adf_levels,
        adf_differenced,
        correlogram_levels,
        correlogram_differenced,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polyval() {
        assert_eq!(polyval(&[1.0, 2.0, 3.0], 2.0), 17.0);
    }

    #[test]
    fn test_p_value_branches_meet_at_switch_point() {
        let small = polyval(&TAU_SMALL_P, TAU_STAR);
        let large = polyval(&TAU_LARGE_P, TAU_STAR);
        assert!((small - large).abs() < 0.01);
        assert_eq!(mackinnon_p_value(3.0).unwrap(), 1.0);
        assert_eq!(mackinnon_p_value(-20.0).unwrap(), 0.0);
    }

    #[test]
    fn test_critical_values_large_sample() {
        let cv = mackinnon_critical_values(1_000_000);
        assert!((cv.one_percent + 3.43035).abs() < 1e-4);
        assert!((cv.five_percent + 2.86154).abs() < 1e-4);
        assert!((cv.ten_percent + 2.56677).abs() < 1e-4);
    }

    #[test]
    fn test_trend_edges_for_even_period() {
        let values: Vec<f64> = (0..12).map(|i| i as f64).collect();
        let d = decompose(&values, 4).unwrap();
        assert!(d.trend[..2].iter().all(Option::is_none));
        assert!(d.trend[10..].iter().all(Option::is_none));
        assert!(d.trend[2..10].iter().all(Option::is_some));
        // a linear series is its own centred moving average
        assert!((d.trend[5].unwrap() - 5.0).abs() < 1e-12);
    }
}
