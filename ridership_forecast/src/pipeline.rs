//! End-to-end workflow
//!
//! ingest -> clean -> aggregate -> diagnose -> fit -> validate -> save, each
//! stage a function of the previous stage's output and the configuration.

use crate::config::PipelineConfig;
use crate::diagnostics::{run_diagnostics, DiagnosticsReport};
use crate::error::{ForecastError, Result};
use crate::frame::{daily_frame, prediction_frame, weekly_frame, write_csv};
use crate::models::{ArimaModel, ArimaOrder, ArimaParams};
use crate::persistence::save_model;
use crate::series::{DailyCounts, WeeklySeries};
use crate::trips::{clean, IngestReport, TripLoader, TripRecord};
use crate::validation::{validate, ValidationReport};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

/// Cleaned trips and the series built from them
#[derive(Debug, Clone)]
pub struct Aggregates {
    pub trips: Vec<TripRecord>,
    pub ingest: IngestReport,
    pub failed_rides_removed: usize,
    pub daily: DailyCounts,
    pub weekly: WeeklySeries,
}

/// Summary of a model fit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitSummary {
    pub order: ArimaOrder,
    pub params: ArimaParams,
    pub log_likelihood: f64,
    pub aic: f64,
    pub bic: f64,
    pub nobs: usize,
}

/// Everything a pipeline run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub ingest: IngestReport,
    pub trips_retained: usize,
    pub failed_rides_removed: usize,
    pub days: usize,
    pub weeks: usize,
    pub missing_weeks: usize,
    /// `None` when the series has gaps or is too short to diagnose
    pub diagnostics: Option<DiagnosticsReport>,
    pub full_fit: FitSummary,
    pub validation: ValidationReport,
    pub model_path: PathBuf,
}

/// Load, clean and aggregate the configured trip files
pub fn aggregate(config: &PipelineConfig) -> Result<Aggregates> {
    if config.input_files.is_empty() {
        return Err(ForecastError::InvalidParameter(
            "No input files configured".to_string(),
        ));
    }

    let batch = TripLoader::new(config.ingest.row_policy).load_files(config.input_files.as_slice())?;
    let (trips, failed_rides_removed) = clean(batch.trips, config.ingest.failed_ride_max_seconds);
    let daily = DailyCounts::from_trips(&trips);
    let weekly = WeeklySeries::from_daily(&daily);

    info!(
        files = batch.report.files,
        rows = batch.report.rows_read,
        skipped = batch.report.rows_skipped,
        duplicates = batch.report.duplicates,
        retained = trips.len(),
        days = daily.len(),
        weeks = weekly.len(),
        missing_weeks = weekly.missing_count(),
        "Aggregated trips"
    );

    Ok(Aggregates {
        trips,
        ingest: batch.report,
        failed_rides_removed,
        daily,
        weekly,
    })
}

/// Run every stage and write the model file
pub fn run(config: &PipelineConfig) -> Result<PipelineReport> {
    config.validate()?;
    let data = aggregate(config)?;

    let diagnostics = match run_diagnostics(&data.weekly, &config.diagnostics) {
        Ok(report) => Some(report),
        Err(e @ (ForecastError::MissingValues { .. } | ForecastError::InsufficientData { .. })) => {
            warn!(error = %e, "Skipping diagnostics");
            None
        }
        Err(e) => return Err(e),
    };

    let model = ArimaModel::from_config(&config.model);
    let full = model.fit(&data.weekly)?;
    let (validation, trained) = validate(&data.weekly, config.validation.train_end, &model)?;

    save_model(&full, &config.model_path)?;

    if let Some(dir) = &config.export_dir {
        write_csv(&mut daily_frame(&data.daily)?, dir.join("daily_counts.csv"))?;
        write_csv(&mut weekly_frame(&data.weekly)?, dir.join("weekly_means.csv"))?;
        write_csv(
            &mut prediction_frame(&full.predictions())?,
            dir.join("in_sample_predictions.csv"),
        )?;
        write_csv(
            &mut prediction_frame(&trained.apply_to(&data.weekly)?.predictions())?,
            dir.join("validation_predictions.csv"),
        )?;
        info!(dir = %dir.display(), "Exported series");
    }

    Ok(PipelineReport {
        ingest: data.ingest,
        trips_retained: data.trips.len(),
        failed_rides_removed: data.failed_rides_removed,
        days: data.daily.len(),
        weeks: data.weekly.len(),
        missing_weeks: data.weekly.missing_count(),
        diagnostics,
        full_fit: FitSummary {
            order: full.order(),
            params: full.params().clone(),
            log_likelihood: full.log_likelihood(),
            aic: full.aic(),
            bic: full.bic(),
            nobs: full.nobs(),
        },
        validation,
        model_path: config.model_path.clone(),
    })
}
