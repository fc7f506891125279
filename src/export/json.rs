//! JSON export for interoperability with other tools

use crate::error::{Result, TagprobeError};
use crate::types::Record;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

/// Write records to a JSON file
///
/// Uses atomic write pattern: writes to a temp file first, then renames.
/// This prevents data corruption if the write is interrupted.
pub fn write_json(records: &[Record], output_path: &Path) -> Result<()> {
    // Write to temp file in same directory (ensures same filesystem for atomic rename)
    let temp_path = output_path.with_extension("json.tmp");

    let file = File::create(&temp_path).map_err(|e| TagprobeError::OutputError {
        path: output_path.to_path_buf(),
        reason: format!("Failed to create temp file: {}", e),
    })?;

    let writer = BufWriter::new(file);

    serde_json::to_writer_pretty(writer, records).map_err(|e| {
        // Clean up temp file on error
        let _ = std::fs::remove_file(&temp_path);
        TagprobeError::OutputError {
            path: output_path.to_path_buf(),
            reason: e.to_string(),
        }
    })?;

    // Atomic rename: either succeeds completely or fails without modifying target
    std::fs::rename(&temp_path, output_path).map_err(|e| {
        // Clean up temp file on error
        let _ = std::fs::remove_file(&temp_path);
        TagprobeError::OutputError {
            path: output_path.to_path_buf(),
            reason: format!("Failed to finalize file: {}", e),
        }
    })?;

    info!("Wrote {} records to {}", records.len(), output_path.display());

    Ok(())
}
