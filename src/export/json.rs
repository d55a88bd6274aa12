//! JSON export of analysis reports

use crate::analysis::AnalysisReport;
use crate::error::{GenreError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

/// JSON output schema version
pub const SCHEMA_VERSION: &str = "1.0";

/// Top-level JSON output structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ReportDocument {
    /// Schema version for forward compatibility
    pub version: String,
    pub metadata: ExportMetadata,
    pub reports: Vec<AnalysisReport>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExportMetadata {
    /// genrekit version that generated this file
    pub generator_version: String,
    pub exported_at: DateTime<Utc>,
    pub report_count: usize,
    /// Training run of the genre model, when one was used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_run_id: Option<String>,
}

impl ReportDocument {
    pub fn new(reports: Vec<AnalysisReport>, model_run_id: Option<String>) -> Self {
        Self {
            version: SCHEMA_VERSION.to_string(),
            metadata: ExportMetadata {
                generator_version: env!("CARGO_PKG_VERSION").to_string(),
                exported_at: Utc::now(),
                report_count: reports.len(),
                model_run_id,
            },
            reports,
        }
    }
}

/// Pretty-printed document, for writing to stdout
pub fn render_reports(reports: &[AnalysisReport], model_run_id: Option<String>) -> Result<String> {
    let document = ReportDocument::new(reports.to_vec(), model_run_id);
    serde_json::to_string_pretty(&document).map_err(|e| GenreError::OutputError {
        path: "<stdout>".into(),
        reason: e.to_string(),
    })
}

/// Write reports to a JSON file
///
/// Writes to a temp file next to `output_path`, then renames it over the
/// target, so an interrupted write never leaves a truncated document.
pub fn write_reports(reports: &[AnalysisReport], model_run_id: Option<String>, output_path: &Path) -> Result<()> {
    let temp_path = output_path.with_extension("json.tmp");

    let file = File::create(&temp_path).map_err(|e| GenreError::output_error(output_path, e))?;
    let mut writer = BufWriter::new(file);

    let document = ReportDocument::new(reports.to_vec(), model_run_id);

    let written = serde_json::to_writer_pretty(&mut writer, &document)
        .map_err(|e| e.to_string())
        .and_then(|_| writer.flush().map_err(|e| e.to_string()));
    if let Err(reason) = written {
        let _ = std::fs::remove_file(&temp_path);
        return Err(GenreError::OutputError {
            path: output_path.to_path_buf(),
            reason,
        });
    }
    drop(writer);

    std::fs::rename(&temp_path, output_path).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        GenreError::OutputError {
            path: output_path.to_path_buf(),
            reason: format!("Failed to finalize file: {}", e),
        }
    })?;

    info!("Wrote {} reports to {}", reports.len(), output_path.display());
    Ok(())
}

/// Read a previously written document
pub fn read_reports(path: &Path) -> Result<ReportDocument> {
    if !path.exists() {
        return Err(GenreError::FileNotFound(path.to_path_buf()));
    }
    let file = File::open(path)?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| GenreError::OutputError {
        path: path.to_path_buf(),
        reason: format!("not a report document: {}", e),
    })
}
