//! Export of extracted records to disk

pub mod json;
pub mod text;

pub use json::write_json;
pub use text::{write_delimited, write_plain};

use crate::error::{Result, TagprobeError};
use crate::safety;
use crate::types::Record;
use std::path::{Path, PathBuf};
use tracing::info;

/// Serialization format for saved metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Json,
    Csv,
    Tsv,
    Txt,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Tsv => "tsv",
            OutputFormat::Txt => "txt",
        }
    }
}

/// Save records to a timestamped file in the output directory.
///
/// The output directory runs through the safety gate like every other path
/// and is created on demand. Returns the path written.
pub fn save_records(
    records: &[Record],
    output_dir: &Path,
    format: OutputFormat,
) -> Result<PathBuf> {
    let dir = safety::ensure_safe(&output_dir.to_string_lossy())?;

    std::fs::create_dir_all(&dir).map_err(|e| TagprobeError::OutputError {
        path: dir.clone(),
        reason: e.to_string(),
    })?;

    let timestamp = chrono::Local::now().format("%Y%m%d%H%M%S");
    let output_path = dir.join(format!("metadata_{}.{}", timestamp, format.extension()));

    match format {
        OutputFormat::Json => write_json(records, &output_path)?,
        OutputFormat::Csv => write_delimited(records, &output_path, b',')?,
        OutputFormat::Tsv => write_delimited(records, &output_path, b'\t')?,
        OutputFormat::Txt => write_plain(records, &output_path)?,
    }

    info!("Metadata saved to {}", output_path.display());
    Ok(output_path)
}
