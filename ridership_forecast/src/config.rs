//! Pipeline configuration
//!
//! Every library default the workflow relies on is spelled out here so that a
//! run is fully described by one JSON file.

use crate::error::{ForecastError, Result};
use crate::models::ArimaOrder;
use chrono::NaiveDate;
use ridership_math::{NelderMeadConfig, PacfMethod};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Trips shorter than this, starting and ending at the same station, are
/// failed rides
pub const DEFAULT_FAILED_RIDE_SECONDS: f64 = 120.0;

/// What to do with a trip row that cannot be ingested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowPolicy {
    /// Log the row, count it in the ingest report and continue
    #[default]
    Skip,
    /// Fail the whole load
    Abort,
}

/// Ingestion and cleaning settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub row_policy: RowPolicy,
    /// Upper bound (exclusive) on the duration of a failed ride, in seconds
    pub failed_ride_max_seconds: f64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            row_policy: RowPolicy::Skip,
            failed_ride_max_seconds: DEFAULT_FAILED_RIDE_SECONDS,
        }
    }
}

/// Diagnostic settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Period of the seasonal decomposition, in weeks
    pub seasonal_period: usize,
    /// Largest lag of the ACF/PACF
    pub max_lag: usize,
    pub pacf_method: PacfMethod,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            seasonal_period: 52,
            max_lag: 60,
            pacf_method: PacfMethod::default(),
        }
    }
}

/// Model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub order: ArimaOrder,
    /// Coverage of prediction intervals
    pub confidence_level: f64,
    pub optimizer: NelderMeadConfig,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            order: ArimaOrder::new(2, 1, 2),
            confidence_level: 0.95,
            optimizer: NelderMeadConfig::default(),
        }
    }
}

/// Hold-out validation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// First day that is not part of the training window
    pub train_end: NaiveDate,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            train_end: NaiveDate::from_ymd_opt(2017, 1, 1).unwrap_or_default(),
        }
    }
}

/// Full configuration of a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Quarterly trip CSV files
    pub input_files: Vec<PathBuf>,
    /// Where the fitted model is written
    pub model_path: PathBuf,
    /// Directory for CSV exports of the intermediate series, if any
    pub export_dir: Option<PathBuf>,
    pub ingest: IngestConfig,
    pub diagnostics: DiagnosticsConfig,
    pub model: ModelConfig,
    pub validation: ValidationConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_files: Vec::new(),
            model_path: PathBuf::from("weekly_arima.json"),
            export_dir: None,
            ingest: IngestConfig::default(),
            diagnostics: DiagnosticsConfig::default(),
            model: ModelConfig::default(),
            validation: ValidationConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file; missing keys take defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading pipeline configuration");
        let reader = BufReader::new(File::open(path)?);
        let config: PipelineConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that all settings are usable
    pub fn validate(&self) -> Result<()> {
        if !(self.ingest.failed_ride_max_seconds > 0.0) {
            return Err(ForecastError::InvalidParameter(
                "failed_ride_max_seconds must be positive".to_string(),
            ));
        }
        if self.diagnostics.seasonal_period < 2 {
            return Err(ForecastError::InvalidParameter(
                "seasonal_period must be at least 2".to_string(),
            ));
        }
        if self.diagnostics.max_lag == 0 {
            return Err(ForecastError::InvalidParameter(
                "max_lag must be positive".to_string(),
            ));
        }
        if !(self.model.confidence_level > 0.0 && self.model.confidence_level < 1.0) {
            return Err(ForecastError::InvalidParameter(
                "confidence_level must be between 0 and 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_describe_the_weekly_workflow() {
        let config = PipelineConfig::default();
        assert_eq!(config.model.order, ArimaOrder::new(2, 1, 2));
        assert_eq!(config.diagnostics.max_lag, 60);
        assert_eq!(config.diagnostics.seasonal_period, 52);
        assert_eq!(config.ingest.failed_ride_max_seconds, 120.0);
        assert_eq!(
            config.validation.train_end,
            NaiveDate::from_ymd_opt(2017, 1, 1).unwrap()
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"ingest": {"row_policy": "abort"}}"#).unwrap();
        assert_eq!(config.ingest.row_policy, RowPolicy::Abort);
        assert_eq!(config.ingest.failed_ride_max_seconds, 120.0);
        assert_eq!(config.model.confidence_level, 0.95);
    }

    #[test]
    fn test_invalid_confidence_level() {
        let mut config = PipelineConfig::default();
        config.model.confidence_level = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ForecastError::InvalidParameter(_))
        ));
    }
}
