use approx::assert_relative_eq;
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use ridership_forecast::config::DiagnosticsConfig;
use ridership_forecast::diagnostics::{adf_test, correlogram, decompose, run_diagnostics};
use ridership_forecast::error::ForecastError;
use ridership_forecast::series::WeeklySeries;
use ridership_math::PacfMethod;

fn white_noise(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0, 1.0).unwrap();
    (0..n).map(|_| normal.sample(&mut rng)).collect()
}

fn random_walk(n: usize, seed: u64) -> Vec<f64> {
    white_noise(n, seed)
        .into_iter()
        .scan(100.0, |level, e| {
            *level += e;
            Some(*level)
        })
        .collect()
}

#[test]
fn test_decompose_recovers_trend_and_season() {
    let pattern = [3.0, -1.0, -1.0, -1.0];
    let values: Vec<f64> = (0..24)
        .map(|t| 10.0 + 0.5 * t as f64 + pattern[t % 4])
        .collect();

    let d = decompose(&values, 4).unwrap();
    for t in 2..22 {
        assert_relative_eq!(d.trend[t].unwrap(), 10.0 + 0.5 * t as f64, epsilon = 1e-9);
        assert_relative_eq!(d.residual[t].unwrap(), 0.0, epsilon = 1e-9);
    }
    for t in 0..24 {
        assert_relative_eq!(d.seasonal[t], pattern[t % 4], epsilon = 1e-9);
    }
    assert!(d.residual[0].is_none());
    assert!(d.residual[23].is_none());
}

#[test]
fn test_decompose_needs_two_periods() {
    let values = vec![1.0; 103];
    assert!(matches!(
        decompose(&values, 52),
        Err(ForecastError::InsufficientData { needed: 104, got: 103 })
    ));
}

#[test]
fn test_adf_rejects_unit_root_for_white_noise() {
    let result = adf_test(&white_noise(200, 7)).unwrap();
    assert!(result.statistic < result.critical_values.one_percent);
    assert!(result.p_value < 0.01);
    assert!(result.is_stationary(0.05));
}

#[test]
fn test_adf_does_not_reject_for_explosive_series() {
    let values: Vec<f64> = white_noise(150, 21)
        .into_iter()
        .scan(10.0, |level, e| {
            *level = 1.03 * *level + e;
            Some(*level)
        })
        .collect();
    let result = adf_test(&values).unwrap();
    assert!(result.statistic > 0.0);
    assert!(result.p_value > 0.5);
    assert!(!result.is_stationary(0.05));
}

#[test]
fn test_adf_lag_and_sample_size() {
    let values = random_walk(156, 11);
    let result = adf_test(&values).unwrap();
    // ceil(12 * 1.56^0.25) = 14
    assert!(result.used_lag <= 14);
    assert_eq!(result.nobs, 155 - result.used_lag);
    assert!(result.p_value >= 0.0 && result.p_value <= 1.0);
    assert!(result.critical_values.one_percent < result.critical_values.five_percent);
    assert!(result.critical_values.five_percent < result.critical_values.ten_percent);
}

#[test]
fn test_correlogram_shape() {
    let values = white_noise(130, 3);
    let c = correlogram(&values, 60, PacfMethod::YuleWalkerMle).unwrap();
    assert_eq!(c.acf.len(), 61);
    assert_eq!(c.pacf.len(), 61);
    assert_eq!(c.acf[0], 1.0);
    assert_relative_eq!(c.bound, 1.96 / (130f64).sqrt(), epsilon = 1e-12);
    assert_relative_eq!(c.pacf[1], c.acf[1], epsilon = 1e-12);
}

#[test]
fn test_correlogram_too_many_lags() {
    let values = white_noise(100, 3);
    assert!(matches!(
        correlogram(&values, 60, PacfMethod::YuleWalkerMle),
        Err(ForecastError::InsufficientData { .. })
    ));
}

#[test]
fn test_diagnostics_reject_gaps() {
    let start = NaiveDate::from_ymd_opt(2015, 1, 4).unwrap();
    let mut values: Vec<Option<f64>> = random_walk(130, 5).into_iter().map(Some).collect();
    values[40] = None;
    let series = WeeklySeries::new(start, values).unwrap();
    assert!(matches!(
        run_diagnostics(&series, &DiagnosticsConfig::default()),
        Err(ForecastError::MissingValues { count: 1 })
    ));
}

#[test]
fn test_full_diagnostics_on_weekly_length_series() {
    let start = NaiveDate::from_ymd_opt(2015, 1, 4).unwrap();
    let values: Vec<Option<f64>> = random_walk(131, 9).into_iter().map(Some).collect();
    let series = WeeklySeries::new(start, values).unwrap();
    let report = run_diagnostics(&series, &DiagnosticsConfig::default()).unwrap();
    assert_eq!(report.decomposition.period, 52);
    assert_eq!(report.correlogram_differenced.nobs, 130);
    assert_eq!(report.correlogram_levels.pacf.len(), 61);
}
