//! Derivative-free minimization
//!
//! Nelder-Mead simplex search over an unconstrained parameter vector. Callers
//! that need constraints map them away before optimizing (see the parameter
//! transforms in the forecasting crate).

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Result of a Nelder-Mead run
#[derive(Debug, Clone)]
pub struct NelderMeadResult {
    /// Best point found
    pub point: Vec<f64>,
    /// Objective value at `point`
    pub value: f64,
    /// Iterations used across all restarts
    pub iterations: usize,
    /// Whether the last restart met the tolerance
    pub converged: bool,
}

/// Nelder-Mead settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NelderMeadConfig {
    /// Maximum iterations per restart
    pub max_iter: usize,
    /// Stop when the spread of simplex values falls below this
    pub tolerance: f64,
    /// Size of the initial simplex along each axis
    pub initial_step: f64,
    /// Extra runs started from the previous optimum
    pub restarts: usize,
}

impl Default for NelderMeadConfig {
    fn default() -> Self {
        Self {
            max_iter: 2000,
            tolerance: 1e-9,
            initial_step: 0.1,
            restarts: 2,
        }
    }
}

const ALPHA: f64 = 1.0;
const GAMMA: f64 = 2.0;
const RHO: f64 = 0.5;
const SIGMA: f64 = 0.5;

/// Minimize `objective` starting from `initial`
///
/// Non-finite objective values are treated as `+inf`, so the search simply
/// steps away from regions where the objective cannot be evaluated.
pub fn nelder_mead<F>(objective: F, initial: &[f64], config: &NelderMeadConfig) -> NelderMeadResult
where
    F: Fn(&[f64]) -> f64,
{
    let eval = |x: &[f64]| {
        let v = objective(x);
        if v.is_finite() {
            v
        } else {
            f64::INFINITY
        }
    };

    let mut best = initial.to_vec();
    let mut best_value = eval(&best);
    let mut iterations = 0;
    let mut converged = false;

    if initial.is_empty() {
        return NelderMeadResult {
            point: best,
            value: best_value,
            iterations,
            converged: true,
        };
    }

    for _ in 0..=config.restarts {
        let (point, value, used, done) = run_simplex(&eval, &best, config);
        iterations += used;
        converged = done;
        if value <= best_value {
            let improvement = best_value - value;
            best = point;
            best_value = value;
            if improvement < config.tolerance {
                break;
            }
        } else {
            break;
        }
    }

    NelderMeadResult {
        point: best,
        value: best_value,
        iterations,
        converged,
    }
}

fn run_simplex<F>(eval: &F, start: &[f64], config: &NelderMeadConfig) -> (Vec<f64>, f64, usize, bool)
where
    F: Fn(&[f64]) -> f64,
{
    let n = start.len();
    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
    simplex.push(start.to_vec());
    for i in 0..n {
        let mut vertex = start.to_vec();
        vertex[i] += if start[i].abs() > 1e-8 {
            config.initial_step * start[i].abs().max(1.0)
        } else {
            config.initial_step
        };
        simplex.push(vertex);
    }
    let mut values: Vec<f64> = simplex.iter().map(|v| eval(v)).collect();

    let mut iterations = 0;
    let mut converged = false;

    while iterations < config.max_iter {
        iterations += 1;

        let mut order: Vec<usize> = (0..=n).collect();
        order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));
        let best = order[0];
        let worst = order[n];
        let second_worst = order[n - 1];

        if (values[worst] - values[best]).abs() < config.tolerance && values[best].is_finite() {
            converged = true;
            break;
        }

        let centroid = centroid(&simplex, worst);

        let reflected = towards(&centroid, &simplex[worst], -ALPHA);
        let reflected_value = eval(&reflected);

        if reflected_value < values[best] {
            let expanded = towards(&centroid, &reflected, GAMMA);
            let expanded_value = eval(&expanded);
            if expanded_value < reflected_value {
                simplex[worst] = expanded;
                values[worst] = expanded_value;
            } else {
                simplex[worst] = reflected;
                values[worst] = reflected_value;
            }
            continue;
        }

        if reflected_value < values[second_worst] {
            simplex[worst] = reflected;
            values[worst] = reflected_value;
            continue;
        }

        let (contracted, contracted_value) = if reflected_value < values[worst] {
            let c = towards(&centroid, &reflected, RHO);
            let v = eval(&c);
            (c, v)
        } else {
            let c = towards(&centroid, &simplex[worst], RHO);
            let v = eval(&c);
            (c, v)
        };

        if contracted_value < values[worst].min(reflected_value) {
            simplex[worst] = contracted;
            values[worst] = contracted_value;
            continue;
        }

        // shrink towards the best vertex
        let anchor = simplex[best].clone();
        for i in 0..=n {
            if i == best {
                continue;
            }
            simplex[i] = towards(&anchor, &simplex[i], SIGMA);
            values[i] = eval(&simplex[i]);
        }
    }

    let best = values
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0);

    (simplex[best].clone(), values[best], iterations, converged)
}

/// Centroid of all vertices except `exclude`
fn centroid(simplex: &[Vec<f64>], exclude: usize) -> Vec<f64> {
    let n = simplex[0].len();
    let count = (simplex.len() - 1) as f64;
    let mut c = vec![0.0; n];
    for (i, vertex) in simplex.iter().enumerate() {
        if i == exclude {
            continue;
        }
        for (acc, v) in c.iter_mut().zip(vertex) {
            *acc += v;
        }
    }
    c.iter_mut().for_each(|v| *v /= count);
    c
}

/// `origin + factor * (point - origin)`
fn towards(origin: &[f64], point: &[f64], factor: f64) -> Vec<f64> {
    origin
        .iter()
        .zip(point)
        .map(|(o, p)| o + factor * (p - o))
        .collect()
}
