//! Container probe backend (ffprobe)
//!
//! Shells out to `ffprobe` for container-level format information: format
//! name, duration, byte size, bit rate, and the container tag map. The raw
//! format section is kept under `Extra`.

use crate::backends::{guard, run_tool, Backend, TOOL_TIMEOUT};
use crate::sanitize::sanitize_record;
use crate::types::{Record, Value};
use std::path::Path;
use tracing::{debug, warn};

pub struct FfprobeBackend;

impl Backend for FfprobeBackend {
    fn name(&self) -> &'static str {
        "FFprobe"
    }

    fn extract(&self, path: &Path) -> Option<Record> {
        let path = guard(self.name(), path)?;

        let binary = match which::which("ffprobe") {
            Ok(binary) => binary,
            Err(_) => {
                debug!("ffprobe not found on PATH, skipping backend");
                return None;
            }
        };

        let output = run_tool(
            &binary,
            &[
                "-v",
                "error",
                "-show_entries",
                "format",
                "-of",
                "json",
                &path.to_string_lossy(),
            ],
            TOOL_TIMEOUT,
        )
        .map_err(|e| warn!("ffprobe failed for {}: {}", path.display(), e))
        .ok()?;

        let json: serde_json::Value = serde_json::from_str(&output)
            .map_err(|e| warn!("ffprobe produced malformed JSON for {}: {}", path.display(), e))
            .ok()?;

        let format = json.get("format")?;

        let mut info = Record::new();
        info.insert("Format", text_field(format, "format_name"));
        info.insert("Duration", Value::Float(float_field(format, "duration")));
        info.insert("Size", Value::Integer(int_field(format, "size")));
        info.insert("Bit Rate", Value::Integer(int_field(format, "bit_rate")));
        info.insert(
            "Extra Info",
            format
                .get("tags")
                .map(Value::from_json)
                .unwrap_or_else(|| Value::Map(Record::new())),
        );

        let mut record = Record::new();
        record.insert("Source", self.name());
        record.insert("Info", Value::Map(info));
        record.insert("Extra", Value::from_json(format));

        sanitize_record(&mut record);
        Some(record)
    }
}

/// ffprobe reports numbers as JSON strings; missing or malformed values
/// default to zero, mirroring the tolerant parse the tool's consumers expect.
fn float_field(section: &serde_json::Value, key: &str) -> f64 {
    section
        .get(key)
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.0)
}

fn int_field(section: &serde_json::Value, key: &str) -> i64 {
    section
        .get(key)
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

fn text_field(section: &serde_json::Value, key: &str) -> Value {
    section
        .get(key)
        .and_then(|v| v.as_str())
        .map(Value::from)
        .unwrap_or_else(Value::unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_number_parsing() {
        let section: serde_json::Value = serde_json::from_str(
            r#"{"format_name": "wav", "duration": "1.500000", "size": "132344", "bit_rate": "705600"}"#,
        )
        .unwrap();

        assert_eq!(float_field(&section, "duration"), 1.5);
        assert_eq!(int_field(&section, "size"), 132344);
        assert_eq!(int_field(&section, "bit_rate"), 705600);
        assert_eq!(text_field(&section, "format_name").as_text(), Some("wav"));
        assert_eq!(int_field(&section, "missing"), 0);
        assert!(text_field(&section, "missing").is_unknown());
    }
}
