//! ARIMA models for weekly ridership
//!
//! Parameters are estimated by exact Gaussian maximum likelihood computed
//! through the Kalman filter in [`super::state_space`]. The search runs over
//! unconstrained values mapped to stationary AR coefficients, invertible MA
//! coefficients and a positive innovation variance.

use super::state_space::{FilterOutput, StateSpace};
use super::{normal_quantile, ArimaOrder, ForecastModel, TrainedForecastModel, WeekPrediction};
use crate::config::ModelConfig;
use crate::error::{ForecastError, Result};
use crate::series::{week_ending, WeeklySeries};
use chrono::{Duration, NaiveDate};
use ridership_math::correlation::autocovariance;
use ridership_math::{nelder_mead, Matrix, NelderMeadConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Estimated ARIMA coefficients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArimaParams {
    /// AR coefficients `ar.L1..ar.Lp`
    pub ar: Vec<f64>,
    /// MA coefficients `ma.L1..ma.Lq`
    pub ma: Vec<f64>,
    /// Innovation variance
    pub sigma2: f64,
}

impl ArimaParams {
    /// Parameter names in vector order
    pub fn names(&self) -> Vec<String> {
        (1..=self.ar.len())
            .map(|i| format!("ar.L{}", i))
            .chain((1..=self.ma.len()).map(|i| format!("ma.L{}", i)))
            .chain(std::iter::once("sigma2".to_string()))
            .collect()
    }

    /// Parameters as one vector: AR, then MA, then variance
    pub fn to_vec(&self) -> Vec<f64> {
        self.ar
            .iter()
            .chain(&self.ma)
            .copied()
            .chain(std::iter::once(self.sigma2))
            .collect()
    }

    /// Map an unconstrained search point onto admissible parameters
    pub fn from_unconstrained(order: ArimaOrder, x: &[f64]) -> Self {
        let ar = constrain_stationary(&x[..order.p]);
        let ma = constrain_stationary(&x[order.p..order.p + order.q])
            .into_iter()
            .map(|v| -v)
            .collect();
        Self {
            ar,
            ma,
            sigma2: x[order.p + order.q].exp(),
        }
    }

    /// Inverse of [`ArimaParams::from_unconstrained`]
    ///
    /// Returns `None` for non-stationary AR, non-invertible MA or a
    /// non-positive variance.
    pub fn to_unconstrained(&self) -> Option<Vec<f64>> {
        if !(self.sigma2 > 0.0) {
            return None;
        }
        let negated_ma: Vec<f64> = self.ma.iter().map(|v| -v).collect();
        let mut x = unconstrain_stationary(&self.ar)?;
        x.extend(unconstrain_stationary(&negated_ma)?);
        x.push(self.sigma2.ln());
        Some(x)
    }
}

/// Map reals to the coefficients of a stationary polynomial (Monahan/Jones)
pub fn constrain_stationary(unconstrained: &[f64]) -> Vec<f64> {
    let n = unconstrained.len();
    if n == 0 {
        return Vec::new();
    }
    let partials: Vec<f64> = unconstrained
        .iter()
        .map(|x| x / (1.0 + x * x).sqrt())
        .collect();

    let mut y = vec![vec![0.0; n]; n];
    for k in 0..n {
        for i in 0..k {
            y[k][i] = y[k - 1][i] + partials[k] * y[k - 1][k - i - 1];
        }
        y[k][k] = partials[k];
    }
    y[n - 1].iter().map(|v| -v).collect()
}

/// Inverse of [`constrain_stationary`]; `None` outside the stationary region
pub fn unconstrain_stationary(constrained: &[f64]) -> Option<Vec<f64>> {
    let n = constrained.len();
    if n == 0 {
        return Some(Vec::new());
    }

    let mut y = vec![vec![0.0; n]; n];
    y[n - 1] = constrained.iter().map(|v| -v).collect();
    for k in (1..n).rev() {
        let denom = 1.0 - y[k][k] * y[k][k];
        if !(denom > 0.0) {
            return None;
        }
        for i in 0..k {
            y[k - 1][i] = (y[k][i] - y[k][k] * y[k][k - i - 1]) / denom;
        }
    }

    (0..n)
        .map(|k| {
            let r = y[k][k];
            if r.abs() < 1.0 {
                Some(r / (1.0 - r * r).sqrt())
            } else {
                None
            }
        })
        .collect()
}

/// ARIMA model (AutoRegressive Integrated Moving Average)
#[derive(Debug, Clone)]
pub struct ArimaModel {
    order: ArimaOrder,
    confidence_level: f64,
    optimizer: NelderMeadConfig,
}

impl ArimaModel {
    /// Create a new ARIMA model with 95% intervals
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self {
            order: ArimaOrder::new(p, d, q),
            confidence_level: 0.95,
            optimizer: NelderMeadConfig::default(),
        }
    }

    /// Create a model from its configuration section
    pub fn from_config(config: &ModelConfig) -> Self {
        Self {
            order: config.order,
            confidence_level: config.confidence_level,
            optimizer: config.optimizer.clone(),
        }
    }

    pub fn with_confidence_level(mut self, confidence_level: f64) -> Self {
        self.confidence_level = confidence_level;
        self
    }

    pub fn with_optimizer(mut self, optimizer: NelderMeadConfig) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn order(&self) -> ArimaOrder {
        self.order
    }

    /// Estimate the parameters on `series` by maximum likelihood
    pub fn fit(&self, series: &WeeklySeries) -> Result<FittedArima> {
        let order = self.order;
        let observed = series.observed_count();
        let needed = order.min_observations();
        if observed < needed {
            return Err(ForecastError::InsufficientData {
                needed,
                got: observed,
            });
        }
        normal_quantile(self.confidence_level)?;

        let values = series.values();
        let start = start_params(order, values);
        let initial = start
            .to_unconstrained()
            .or_else(|| {
                ArimaParams {
                    ar: vec![0.0; order.p],
                    ma: vec![0.0; order.q],
                    sigma2: start.sigma2,
                }
                .to_unconstrained()
            })
            .ok_or_else(|| {
                ForecastError::ModelError("No admissible starting parameters".to_string())
            })?;
        debug!(?start, "Starting parameters");

        let objective = |x: &[f64]| {
            let params = ArimaParams::from_unconstrained(order, x);
            match StateSpace::new(order, &params).and_then(|ss| ss.filter(values)) {
                Ok(out) if out.nobs > 0 => -out.log_likelihood / out.nobs as f64,
                _ => f64::INFINITY,
            }
        };

        let result = nelder_mead(objective, &initial, &self.optimizer);
        if !result.value.is_finite() {
            return Err(ForecastError::ModelError(
                "Likelihood could not be evaluated at any parameter value".to_string(),
            ));
        }
        debug!(
            iterations = result.iterations,
            converged = result.converged,
            objective = result.value,
            "Likelihood maximisation finished"
        );
        if !result.converged {
            warn!(
                iterations = result.iterations,
                "Optimizer stopped before reaching its tolerance"
            );
        }

        let params = ArimaParams::from_unconstrained(order, &result.point);
        let fitted =
            FittedArima::from_parts(order, params, series.clone(), self.confidence_level)?;
        info!(
            model = %order,
            weeks = series.len(),
            log_likelihood = fitted.log_likelihood(),
            aic = fitted.aic(),
            "Fitted model"
        );
        Ok(fitted)
    }
}

impl ForecastModel for ArimaModel {
    type Trained = FittedArima;

    fn train(&self, series: &WeeklySeries) -> Result<Self::Trained> {
        self.fit(series)
    }

    fn name(&self) -> String {
        self.order.to_string()
    }
}

/// Yule-Walker AR coefficients and the variance of the differenced series
fn start_params(order: ArimaOrder, values: &[Option<f64>]) -> ArimaParams {
    let mut current: Vec<Option<f64>> = values.to_vec();
    for _ in 0..order.d {
        current = current
            .windows(2)
            .map(|w| match (w[0], w[1]) {
                (Some(a), Some(b)) => Some(b - a),
                _ => None,
            })
            .collect();
    }
    let diffs: Vec<f64> = current.into_iter().flatten().collect();

    let n = diffs.len().max(1) as f64;
    let mean = diffs.iter().sum::<f64>() / n;
    let variance = diffs.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let sigma2 = if variance > 0.0 && variance.is_finite() {
        variance
    } else {
        1.0
    };

    let ar = yule_walker(&diffs, order.p)
        .filter(|phi| unconstrain_stationary(phi).is_some())
        .unwrap_or_else(|| vec![0.0; order.p]);

    ArimaParams {
        ar,
        ma: vec![0.0; order.q],
        sigma2,
    }
}

fn yule_walker(values: &[f64], p: usize) -> Option<Vec<f64>> {
    if p == 0 {
        return Some(Vec::new());
    }
    let r = autocovariance(values, p, false).ok()?;
    let rows: Vec<Vec<f64>> = (0..p)
        .map(|i| (0..p).map(|j| r[i.abs_diff(j)]).collect())
        .collect();
    let toeplitz = Matrix::from_rows(&rows).ok()?;
    toeplitz.solve(&r[1..]).ok()
}

/// ARIMA model with estimated parameters and its filtered series
#[derive(Debug, Clone)]
pub struct FittedArima {
    order: ArimaOrder,
    params: ArimaParams,
    series: WeeklySeries,
    confidence_level: f64,
    z: f64,
    state_space: StateSpace,
    output: FilterOutput,
}

impl FittedArima {
    /// Filter `series` with known parameters
    pub fn from_parts(
        order: ArimaOrder,
        params: ArimaParams,
        series: WeeklySeries,
        confidence_level: f64,
    ) -> Result<Self> {
        let z = normal_quantile(confidence_level)?;
        let state_space = StateSpace::new(order, &params)?;
        let output = state_space.filter(series.values())?;
        Ok(Self {
            order,
            params,
            series,
            confidence_level,
            z,
            state_space,
            output,
        })
    }

    pub fn order(&self) -> ArimaOrder {
        self.order
    }

    pub fn params(&self) -> &ArimaParams {
        &self.params
    }

    /// Series the model was filtered over
    pub fn series(&self) -> &WeeklySeries {
        &self.series
    }

    pub fn confidence_level(&self) -> f64 {
        self.confidence_level
    }

    /// Same parameters filtered over another series, without re-estimation
    pub fn apply_to(&self, series: &WeeklySeries) -> Result<FittedArima> {
        FittedArima::from_parts(
            self.order,
            self.params.clone(),
            series.clone(),
            self.confidence_level,
        )
    }

    /// In-sample one-step-ahead predictions, one per week
    pub fn predictions(&self) -> Vec<WeekPrediction> {
        (0..self.series.len()).map(|i| self.prediction(i)).collect()
    }

    /// In-sample predictions with intervals at another coverage
    pub fn predictions_at_level(&self, confidence_level: f64) -> Result<Vec<WeekPrediction>> {
        let z = normal_quantile(confidence_level)?;
        Ok((0..self.series.len())
            .map(|i| self.prediction_with(i, z))
            .collect())
    }

    fn prediction(&self, index: usize) -> WeekPrediction {
        self.prediction_with(index, self.z)
    }

    fn prediction_with(&self, index: usize, z: f64) -> WeekPrediction {
        WeekPrediction::new(
            self.series.week(index),
            self.output.predicted[index],
            self.output.variance[index],
            z,
            self.series.values()[index],
        )
    }

    /// Prediction errors; `None` for missing weeks and the burned first `d` weeks
    pub fn residuals(&self) -> Vec<Option<f64>> {
        self.output
            .innovations
            .iter()
            .enumerate()
            .map(|(t, v)| if t < self.output.burn { None } else { *v })
            .collect()
    }

    pub fn log_likelihood(&self) -> f64 {
        self.output.log_likelihood
    }

    /// Observations that entered the likelihood
    pub fn nobs(&self) -> usize {
        self.output.nobs
    }

    /// Akaike information criterion
    pub fn aic(&self) -> f64 {
        -2.0 * self.log_likelihood() + 2.0 * self.order.num_params() as f64
    }

    /// Bayesian information criterion
    pub fn bic(&self) -> f64 {
        -2.0 * self.log_likelihood() + (self.nobs() as f64).ln() * self.order.num_params() as f64
    }

    /// Forecasts for the weeks after the last week of the series
    pub fn forecast(&self, horizons: usize) -> Result<Vec<WeekPrediction>> {
        let last = self.series.end().ok_or(ForecastError::InsufficientData {
            needed: 1,
            got: 0,
        })?;
        Ok(self
            .state_space
            .forecast(&self.output, horizons)?
            .into_iter()
            .enumerate()
            .map(|(h, (mean, variance))| {
                let week = last + Duration::weeks(h as i64 + 1);
                WeekPrediction::new(week, mean, variance, self.z, None)
            })
            .collect())
    }

    /// Prediction for the week containing `date`
    ///
    /// Weeks inside the series get their one-step-ahead prediction; later
    /// weeks are forecast from the end of the series.
    pub fn predict_at(&self, date: NaiveDate) -> Result<WeekPrediction> {
        let first_week = self
            .series
            .start()
            .ok_or(ForecastError::InsufficientData { needed: 1, got: 0 })?;
        let week = week_ending(date);
        if week < first_week {
            return Err(ForecastError::DateOutOfRange { date, first_week });
        }

        let index = ((week - first_week).num_days() / 7) as usize;
        if index < self.series.len() {
            return Ok(self.prediction(index));
        }

        let steps = index - self.series.len() + 1;
        warn!(
            %date,
            %week,
            steps,
            "Date is past the last modelled week, extrapolating"
        );
        self.forecast(steps)?
            .pop()
            .ok_or_else(|| ForecastError::ModelError("Empty forecast".to_string()))
    }
}

impl TrainedForecastModel for FittedArima {
    fn forecast(&self, horizons: usize) -> Result<Vec<WeekPrediction>> {
        FittedArima::forecast(self, horizons)
    }

    fn predict(&self, series: &WeeklySeries) -> Result<Vec<WeekPrediction>> {
        Ok(self.apply_to(series)?.predictions())
    }

    fn name(&self) -> String {
        self.order.to_string()
    }
}
