//! Delimited and plain-text export
//!
//! CSV/TSV rows take their headers from the first record's top-level keys;
//! nested groups are serialized into their cells as compact JSON. The plain
//! text writer prints two levels of `key: value` lines, one blank line
//! between records.

use crate::error::{Result, TagprobeError};
use crate::types::{Record, Value};
use std::io::Write;
use std::path::Path;

/// Write records as delimiter-separated values
pub fn write_delimited(records: &[Record], output_path: &Path, delimiter: u8) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(output_path)
        .map_err(|e| TagprobeError::OutputError {
            path: output_path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let Some(first) = records.first() else {
        return Ok(());
    };
    let headers: Vec<&String> = first.iter().map(|(key, _)| key).collect();

    writer
        .write_record(headers.iter().map(|h| h.as_str()))
        .and_then(|_| {
            for record in records {
                let row: Vec<String> = headers
                    .iter()
                    .map(|key| {
                        record
                            .get(key.as_str())
                            .map(Value::display_string)
                            .unwrap_or_default()
                    })
                    .collect();
                writer.write_record(&row)?;
            }
            writer.flush().map_err(csv::Error::from)
        })
        .map_err(|e| TagprobeError::OutputError {
            path: output_path.to_path_buf(),
            reason: e.to_string(),
        })
}

/// Write records as indented plain text
pub fn write_plain(records: &[Record], output_path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(output_path).map_err(|e| TagprobeError::OutputError {
        path: output_path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut render = || -> std::io::Result<()> {
        for record in records {
            for (key, value) in record.iter() {
                match value {
                    Value::Map(map) => {
                        writeln!(file, "{}:", key)?;
                        for (sub_key, sub_value) in map.iter() {
                            writeln!(file, "  {}: {}", sub_key, sub_value.display_string())?;
                        }
                    }
                    other => writeln!(file, "{}: {}", key, other.display_string())?,
                }
            }
            writeln!(file)?;
        }
        Ok(())
    };

    render().map_err(|e| TagprobeError::OutputError {
        path: output_path.to_path_buf(),
        reason: e.to_string(),
    })
}
