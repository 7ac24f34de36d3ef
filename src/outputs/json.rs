//! JSON output of batch responses.
//!
//! Files are organized by date, one file per run:
//! ```text
//! output_dir/
//! └── 2025-05-06/
//!     ├── batch_093012.json
//!     └── batch_141501.json
//! ```

use crate::error::AppError;
use crate::models::BatchResponse;
use chrono::{DateTime, Local};
use tokio::fs;
use tracing::{error, info, instrument};

/// Write `response` under `{output_dir}/{date}/batch_{HHMMSS}.json` and
/// return the file path.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir))]
pub async fn write_response(
    response: &BatchResponse,
    output_dir: &str,
    now: DateTime<Local>,
) -> Result<String, AppError> {
    let json = serde_json::to_string_pretty(response)?;

    let dir = format!(
        "{}/{}",
        output_dir.trim_end_matches('/'),
        now.format("%Y-%m-%d")
    );
    if let Err(source) = fs::create_dir_all(&dir).await {
        error!(%dir, error = %source, "Failed to create output dir");
        return Err(AppError::Io { path: dir, source });
    }

    let path = format!("{dir}/batch_{}.json", now.format("%H%M%S"));
    fs::write(&path, json).await.map_err(|source| AppError::Io {
        path: path.clone(),
        source,
    })?;
    info!(%path, records = response.data.len(), "Wrote batch response");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BatchStatus, UrlError};
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_writes_dated_file() {
        let dir = tempfile::tempdir().unwrap();
        let response = BatchResponse {
            status: BatchStatus::Unprocessable,
            received: 1,
            processed: 0,
            errors: vec![UrlError::new("ftp://x", "Protocolo no permitido")],
            processing_time: "0:00:01".into(),
            data: Vec::new(),
        };
        let now = Local.with_ymd_and_hms(2025, 5, 6, 9, 30, 12).unwrap();

        let path = write_response(&response, dir.path().to_str().unwrap(), now)
            .await
            .unwrap();
        assert!(path.ends_with("2025-05-06/batch_093012.json"));

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["status"], "unprocessable");
        assert_eq!(written["errors"][0]["reason"], "Protocolo no permitido");
    }
}
