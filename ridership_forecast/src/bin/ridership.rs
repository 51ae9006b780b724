//! Command line entry point for the weekly ridership workflow.
//!
//! `fit` runs the whole pipeline and writes the model file, `diagnose` prints
//! the diagnostics of the weekly series, and `predict` answers date queries
//! from a saved model.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use ridership_forecast::config::PipelineConfig;
use ridership_forecast::diagnostics::run_diagnostics;
use ridership_forecast::error::Result;
use ridership_forecast::inference::WeeklyForecaster;
use ridership_forecast::pipeline::{aggregate, run};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ridership")]
#[command(about = "Weekly bike-share ridership forecasting", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON configuration file; flags override its values
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest trips, fit and validate the model, and save it
    Fit {
        /// Quarterly trip CSV files
        #[arg(value_name = "TRIP_FILE")]
        inputs: Vec<PathBuf>,

        /// Where to write the model file
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// First day outside the training window (YYYY-MM-DD)
        #[arg(long)]
        train_end: Option<NaiveDate>,

        /// Directory for CSV exports of the series and predictions
        #[arg(long)]
        export_dir: Option<PathBuf>,
    },
    /// Print decomposition, unit-root and correlogram results
    Diagnose {
        /// Quarterly trip CSV files
        #[arg(value_name = "TRIP_FILE")]
        inputs: Vec<PathBuf>,
    },
    /// Predict mean daily rides for the weeks of the given dates
    Predict {
        /// Model file written by `fit`
        #[arg(short, long, default_value = "weekly_arima.json")]
        model: PathBuf,

        /// Dates in any common format, e.g. 2017-01-03 or "Jan 3, 2017"
        #[arg(value_name = "DATE", required = true)]
        dates: Vec<String>,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_json_file(path),
        None => Ok(PipelineConfig::default()),
    }
}

fn execute(cli: Cli) -> Result<()> {
    let mut config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Fit {
            inputs,
            model,
            train_end,
            export_dir,
        } => {
            if !inputs.is_empty() {
                config.input_files = inputs;
            }
            if let Some(model) = model {
                config.model_path = model;
            }
            if let Some(train_end) = train_end {
                config.validation.train_end = train_end;
            }
            if export_dir.is_some() {
                config.export_dir = export_dir;
            }

            let report = run(&config)?;
            println!(
                "{}: {} trips kept, {} failed rides removed, {} weeks ({} missing)",
                report.full_fit.order,
                report.trips_retained,
                report.failed_rides_removed,
                report.weeks,
                report.missing_weeks
            );
            for (name, value) in report
                .full_fit
                .params
                .names()
                .iter()
                .zip(report.full_fit.params.to_vec())
            {
                println!("  {:<8} {:>14.6}", name, value);
            }
            println!(
                "  log-likelihood {:.3}  AIC {:.3}  BIC {:.3}",
                report.full_fit.log_likelihood, report.full_fit.aic, report.full_fit.bic
            );
            print!("{}", report.validation);
            info!(path = %report.model_path.display(), "Model written");
        }
        Commands::Diagnose { inputs } => {
            if !inputs.is_empty() {
                config.input_files = inputs;
            }
            config.validate()?;
            let data = aggregate(&config)?;
            let report = run_diagnostics(&data.weekly, &config.diagnostics)?;
            println!("Levels\n{}", report.adf_levels);
            println!("First differences\n{}", report.adf_differenced);
            println!(
                "Significant PACF lags (differenced): {:?}",
                report.correlogram_differenced.significant_pacf_lags()
            );
            println!(
                "Significant ACF lags (differenced): {:?}",
                report.correlogram_differenced.significant_acf_lags()
            );
        }
        Commands::Predict { model, dates } => {
            let forecaster = WeeklyForecaster::from_file(&model)?;
            for date in &dates {
                println!("{}\t{:.2}", date, forecaster.forecast(date)?);
            }
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match execute(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
