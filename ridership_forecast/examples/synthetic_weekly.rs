//! Fit and validate the weekly model on a synthetic ridership series.
//!
//! Run with `RUST_LOG=debug` to see the optimizer and stage logs.

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use ridership_forecast::models::ArimaModel;
use ridership_forecast::series::WeeklySeries;
use ridership_forecast::validation::validate;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut rng = StdRng::seed_from_u64(2015);
    let noise = Normal::new(0.0, 40.0)?;
    let start = NaiveDate::from_ymd_opt(2015, 1, 4).ok_or("invalid start date")?;

    let mut level = 800.0;
    let values: Vec<Option<f64>> = (0..130)
        .map(|t| {
            let season = 300.0 * (2.0 * std::f64::consts::PI * t as f64 / 52.0).sin();
            level += noise.sample(&mut rng);
            Some(level + season)
        })
        .collect();
    let weekly = WeeklySeries::new(start, values)?;

    let model = ArimaModel::new(2, 1, 2);
    let train_end = NaiveDate::from_ymd_opt(2017, 1, 1).ok_or("invalid cutoff")?;
    let (report, trained) = validate(&weekly, train_end, &model)?;

    println!("Training-window parameters:");
    for (name, value) in trained.params().names().iter().zip(trained.params().to_vec()) {
        println!("  {:<8} {:>12.4}", name, value);
    }
    print!("{}", report);

    println!("\nFirst held-out weeks:");
    for p in report.held_out.iter().take(5) {
        println!(
            "  {}  observed {:>8.1}  predicted {:>8.1}  [{:>8.1}, {:>8.1}]",
            p.week_ending,
            p.observed.unwrap_or(f64::NAN),
            p.mean,
            p.lower,
            p.upper
        );
    }

    Ok(())
}
