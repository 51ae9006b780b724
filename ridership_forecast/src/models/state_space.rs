//! State-space form of a non-seasonal ARIMA model and its Kalman filter
//!
//! The state stacks `d` integrated states in front of a Harvey-form ARMA
//! block of dimension `r = max(p, q + 1)`:
//!
//! ```text
//! y_t     = Z a_t
//! a_{t+1} = T a_t + R e_t,   e_t ~ N(0, sigma2)
//! ```
//!
//! The integrated states start approximately diffuse (variance 1e6) and the
//! ARMA block starts at its stationary covariance. The first `d` periods are
//! left out of the likelihood.

use super::arima::ArimaParams;
use super::ArimaOrder;
use crate::error::{ForecastError, Result};
use ridership_math::linalg::solve_discrete_lyapunov;
use ridership_math::Matrix;

/// Prior variance of the integrated states
pub const DIFFUSE_VARIANCE: f64 = 1e6;

/// System matrices of one parameterisation
#[derive(Debug, Clone)]
pub struct StateSpace {
    order: ArimaOrder,
    design: Vec<f64>,
    transition: Matrix,
    state_cov: Matrix,
    initial_state: Vec<f64>,
    initial_cov: Matrix,
}

impl StateSpace {
    /// Build the system for the given order and parameters
    pub fn new(order: ArimaOrder, params: &ArimaParams) -> Result<Self> {
        if params.ar.len() != order.p || params.ma.len() != order.q {
            return Err(ForecastError::ModelError(format!(
                "{} needs {} AR and {} MA coefficients, got {} and {}",
                order,
                order.p,
                order.q,
                params.ar.len(),
                params.ma.len()
            )));
        }
        if !(params.sigma2 > 0.0) {
            return Err(ForecastError::ModelError(
                "Innovation variance must be positive".to_string(),
            ));
        }

        let d = order.d;
        let r = order.p.max(order.q + 1);
        let m = d + r;

        let mut design = vec![0.0; m];
        design[..=d].iter_mut().for_each(|z| *z = 1.0);

        let mut transition = Matrix::zeros(m, m);
        for i in 0..d {
            for k in i..d {
                transition[(i, k)] = 1.0;
            }
            transition[(i, d)] = 1.0;
        }
        for (i, phi) in params.ar.iter().enumerate() {
            transition[(d + i, d)] = *phi;
        }
        for i in 0..r - 1 {
            transition[(d + i, d + i + 1)] = 1.0;
        }

        let mut selection = vec![0.0; m];
        selection[d] = 1.0;
        for (j, theta) in params.ma.iter().enumerate() {
            selection[d + j + 1] = *theta;
        }
        let mut state_cov = Matrix::zeros(m, m);
        for i in 0..m {
            for j in 0..m {
                state_cov[(i, j)] = selection[i] * selection[j] * params.sigma2;
            }
        }

        let mut arma_t = Matrix::zeros(r, r);
        let mut arma_q = Matrix::zeros(r, r);
        for i in 0..r {
            for j in 0..r {
                arma_t[(i, j)] = transition[(d + i, d + j)];
                arma_q[(i, j)] = state_cov[(d + i, d + j)];
            }
        }
        let stationary = solve_discrete_lyapunov(&arma_t, &arma_q).map_err(|e| {
            ForecastError::ModelError(format!("No stationary initial covariance: {}", e))
        })?;

        let mut initial_cov = Matrix::zeros(m, m);
        for i in 0..d {
            initial_cov[(i, i)] = DIFFUSE_VARIANCE;
        }
        for i in 0..r {
            for j in 0..r {
                initial_cov[(d + i, d + j)] = stationary[(i, j)];
            }
        }

        Ok(Self {
            order,
            design,
            transition,
            state_cov,
            initial_state: vec![0.0; m],
            initial_cov,
        })
    }

    /// Dimension of the state vector
    pub fn dim(&self) -> usize {
        self.design.len()
    }

    pub fn order(&self) -> ArimaOrder {
        self.order
    }

    /// Run the Kalman filter over a series with optional gaps
    ///
    /// Missing observations get a prediction step only.
    pub fn filter(&self, values: &[Option<f64>]) -> Result<FilterOutput> {
        let n = values.len();
        let m = self.dim();
        let burn = self.order.d;
        let transposed = self.transition.transpose();

        let mut a = self.initial_state.clone();
        let mut p = self.initial_cov.clone();
        let mut predicted = Vec::with_capacity(n);
        let mut variance = Vec::with_capacity(n);
        let mut innovations = Vec::with_capacity(n);
        let mut log_likelihood = 0.0;
        let mut nobs = 0;

        for (t, obs) in values.iter().enumerate() {
            let pz = p.mul_vec(&self.design)?;
            let y_hat = dot(&self.design, &a);
            let f = dot(&self.design, &pz);
            predicted.push(y_hat);
            variance.push(f);

            match obs {
                Some(y) if y.is_finite() => {
                    if !(f > 0.0) || !f.is_finite() {
                        return Err(ForecastError::ModelError(format!(
                            "Degenerate prediction variance {} at step {}",
                            f, t
                        )));
                    }
                    let v = y - y_hat;
                    for i in 0..m {
                        a[i] += pz[i] * v / f;
                    }
                    for i in 0..m {
                        for j in 0..m {
                            p[(i, j)] -= pz[i] * pz[j] / f;
                        }
                    }
                    if t >= burn {
                        log_likelihood -= 0.5 * (LN_2PI + f.ln() + v * v / f);
                        nobs += 1;
                    }
                    innovations.push(Some(v));
                }
                _ => innovations.push(None),
            }

            a = self.transition.mul_vec(&a)?;
            p = self
                .transition
                .matmul(&p)?
                .matmul(&transposed)?
                .add(&self.state_cov)?;
            p.symmetrize();
        }

        Ok(FilterOutput {
            predicted,
            variance,
            innovations,
            log_likelihood,
            nobs,
            burn,
            final_state: a,
            final_cov: p,
        })
    }

    /// Multi-step forecasts `(mean, variance)` continuing from a filtered state
    pub fn forecast(&self, output: &FilterOutput, horizons: usize) -> Result<Vec<(f64, f64)>> {
        let transposed = self.transition.transpose();
        let mut a = output.final_state.clone();
        let mut p = output.final_cov.clone();
        let mut result = Vec::with_capacity(horizons);

        for _ in 0..horizons {
            let pz = p.mul_vec(&self.design)?;
            result.push((dot(&self.design, &a), dot(&self.design, &pz)));
            a = self.transition.mul_vec(&a)?;
            p = self
                .transition
                .matmul(&p)?
                .matmul(&transposed)?
                .add(&self.state_cov)?;
        }

        Ok(result)
    }
}

const LN_2PI: f64 = 1.837_877_066_409_345_3;

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Kalman filter output over one series
#[derive(Debug, Clone)]
pub struct FilterOutput {
    /// One-step-ahead predictions, one per period
    pub predicted: Vec<f64>,
    /// One-step-ahead prediction variances
    pub variance: Vec<f64>,
    /// Prediction errors; `None` where the observation is missing
    pub innovations: Vec<Option<f64>>,
    /// Log-likelihood over the non-burned observed periods
    pub log_likelihood: f64,
    /// Observations contributing to the likelihood
    pub nobs: usize,
    /// Periods left out of the likelihood
    pub burn: usize,
    final_state: Vec<f64>,
    final_cov: Matrix,
}
