//! Crisis history store: a JSON array of [`HistoricalRecord`]s.

use crate::crisis::HistoricalRecord;
use crate::error::AppError;
use crate::models::OutputRecord;
use std::io::ErrorKind;
use tokio::fs;
use tracing::{info, instrument, warn};

/// Read the history file. A missing file is an empty history.
#[instrument(level = "info", skip_all, fields(%path))]
pub async fn load_history(path: &str) -> Result<Vec<HistoricalRecord>, AppError> {
    let raw = match fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!("History file not found; starting with empty history");
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(AppError::Io {
                path: path.to_string(),
                source,
            });
        }
    };
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let records: Vec<HistoricalRecord> = serde_json::from_str(&raw)?;
    info!(records = records.len(), "Loaded crisis history");
    Ok(records)
}

/// Append the records of a finished batch to the history file.
#[instrument(level = "info", skip_all, fields(%path, new = records.len()))]
pub async fn append_history(path: &str, records: &[OutputRecord]) -> Result<usize, AppError> {
    let mut history = load_history(path).await?;
    history.extend(records.iter().map(HistoricalRecord::from));

    if let Some(parent) = std::path::Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(|source| AppError::Io {
            path: parent.display().to_string(),
            source,
        })?;
    }
    let json = serde_json::to_string_pretty(&history)?;
    fs::write(path, json).await.map_err(|source| AppError::Io {
        path: path.to_string(),
        source,
    })?;
    info!(total = history.len(), "Crisis history updated");
    Ok(history.len())
}
