//! Model files
//!
//! A fitted model is stored as JSON carrying a format version, the order, the
//! parameters, the interval coverage and the series it was filtered over.
//! Loading re-runs the filter, so predictions after a round trip match the
//! original model.

use crate::error::{ForecastError, Result};
use crate::models::{ArimaOrder, ArimaParams, FittedArima};
use crate::series::WeeklySeries;
use chrono::{Datelike, Weekday};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::Path;
use tracing::info;

/// Version written into new model files
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct ModelFile {
    format_version: u32,
    order: ArimaOrder,
    params: ArimaParams,
    confidence_level: f64,
    series: WeeklySeries,
}

/// Write a fitted model to `path`
pub fn save_model<P: AsRef<Path>>(model: &FittedArima, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let file = ModelFile {
        format_version: FORMAT_VERSION,
        order: model.order(),
        params: model.params().clone(),
        confidence_level: model.confidence_level(),
        series: model.series().clone(),
    };
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &file)?;
    writer.flush()?;

    info!(path = %path.display(), model = %model.order(), "Saved model");
    Ok(())
}

/// Read a model written by [`save_model`]
pub fn load_model<P: AsRef<Path>>(path: P) -> Result<FittedArima> {
    let path = path.as_ref();
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(ForecastError::ModelNotFound(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };

    let file: ModelFile =
        serde_json::from_str(&content).map_err(|e| ForecastError::CorruptModel(e.to_string()))?;
    if file.format_version != FORMAT_VERSION {
        return Err(ForecastError::CorruptModel(format!(
            "Unsupported format version {}",
            file.format_version
        )));
    }
    if let Some(start) = file.series.start() {
        if start.weekday() != Weekday::Sun {
            return Err(ForecastError::CorruptModel(format!(
                "Series starts on {}, which is not a Sunday",
                start
            )));
        }
    }

    let model = FittedArima::from_parts(
        file.order,
        file.params,
        file.series,
        file.confidence_level,
    )
    .map_err(|e| ForecastError::CorruptModel(e.to_string()))?;

    info!(path = %path.display(), model = %model.order(), weeks = model.series().len(), "Loaded model");
    Ok(model)
}
