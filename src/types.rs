//! Core data types for tagprobe
//!
//! The metadata record is a fixed-shape tree of string keys over a small
//! tagged union of leaf and branch values. Backends produce partial records
//! of the same shape; the aggregator folds them into the skeleton.

use crate::error::{Result, TagprobeError};
use serde::Serialize;
use std::collections::BTreeMap;

/// Sentinel for "not yet determined" field values
pub const UNKNOWN: &str = "Unknown";

/// Key of the per-level catch-all group for keys outside the fixed schema
pub const EXTRA: &str = "Extra";

/// Key of the open group holding level-2 spectral descriptors
pub const ADDITIONAL: &str = "Additional";

/// Key of the stream/format information group
pub const INFO: &str = "Info";

/// Key naming the backend that produced a record
pub const SOURCE: &str = "Source";

// =============================================================================
// Record tree
// =============================================================================

/// A single value in a metadata record: a scalar leaf, a list, or a nested map
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Text(String),
    Integer(i64),
    Float(f64),
    List(Vec<Value>),
    Map(Record),
}

impl Value {
    /// The sentinel value
    pub fn unknown() -> Self {
        Value::Text(UNKNOWN.to_string())
    }

    /// True if this value is the sentinel
    pub fn is_unknown(&self) -> bool {
        matches!(self, Value::Text(s) if s == UNKNOWN)
    }

    pub fn as_map(&self) -> Option<&Record> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Convert an arbitrary JSON tree (external tool output) into a record value
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::unknown(),
            serde_json::Value::Bool(b) => Value::Text(b.to_string()),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::Text(s.clone()),
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(fields) => {
                let mut map = Record::new();
                for (key, value) in fields {
                    map.insert(key.as_str(), Value::from_json(value));
                }
                Value::Map(map)
            }
        }
    }

    /// Flat display form used by the delimited/plain-text exporters
    pub fn display_string(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Integer(n) => n.to_string(),
            Value::Float(f) => f.to_string(),
            other => serde_json::to_string(other).unwrap_or_default(),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Integer(n as i64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Integer(n as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

/// A metadata record: an ordered map of field names to values
///
/// Both the canonical record and the per-backend partial records share this
/// shape; in a partial record absent fields are simply not present.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record(pub BTreeMap<String, Value>);

impl Record {
    pub fn new() -> Self {
        Record(BTreeMap::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.0.get_mut(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Get the nested map at `key`, creating an empty one if the key is absent.
    ///
    /// Returns `None` when the key already holds a non-map value; the caller
    /// drops the conflicting subtree in that case.
    pub fn ensure_map(&mut self, key: &str) -> Option<&mut Record> {
        let entry = self
            .0
            .entry(key.to_string())
            .or_insert_with(|| Value::Map(Record::new()));
        match entry {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Walk a path of nested map keys (convenience for tests and exporters)
    pub fn get_path(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let value = self.get(first)?;
        if rest.is_empty() {
            Some(value)
        } else {
            value.as_map()?.get_path(rest)
        }
    }
}

// =============================================================================
// Processing level and extraction output
// =============================================================================

/// Processing depth: basic metadata, or basic plus signal-derived descriptors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Basic,
    Extended,
}

impl Level {
    /// Coerce a raw level argument to a processing level.
    ///
    /// Anything that parses as an integer is accepted; 2 selects the extended
    /// pipeline, every other integer means basic. Non-numeric input is an
    /// `InvalidInput` error.
    pub fn parse(raw: &str) -> Result<Level> {
        let numeric: i64 = raw
            .trim()
            .parse()
            .map_err(|_| TagprobeError::InvalidInput(format!("level must be an integer, got '{raw}'")))?;
        Ok(Level::from_int(numeric))
    }

    pub fn from_int(level: i64) -> Level {
        if level == 2 {
            Level::Extended
        } else {
            Level::Basic
        }
    }
}

/// Output of one extraction call
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Extraction {
    /// All backends merged into a single canonical record
    Aggregated(Record),
    /// One untouched record per backend, in fixed backend order
    PerBackend(Vec<Record>),
}

impl Extraction {
    /// Flatten into a list of records for the export layer
    pub fn into_records(self) -> Vec<Record> {
        match self {
            Extraction::Aggregated(record) => vec![record],
            Extraction::PerBackend(records) => records,
        }
    }
}

// =============================================================================
// Audio buffer
// =============================================================================

/// Decoded audio samples ready for analysis
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    /// Mono samples normalized to [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Duration in seconds
    pub duration: f64,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        // Guard against division by zero - use 0 duration for invalid sample rate
        let duration = if sample_rate > 0 {
            samples.len() as f64 / sample_rate as f64
        } else {
            0.0
        };
        Self {
            samples,
            sample_rate,
            duration,
        }
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_coercion() {
        assert_eq!(Level::parse("1").unwrap(), Level::Basic);
        assert_eq!(Level::parse("2").unwrap(), Level::Extended);
        assert_eq!(Level::parse(" 2 ").unwrap(), Level::Extended);
        assert_eq!(Level::parse("7").unwrap(), Level::Basic);
        assert!(Level::parse("detailed").is_err());
        assert!(Level::parse("").is_err());
    }

    #[test]
    fn test_sentinel_detection() {
        assert!(Value::unknown().is_unknown());
        assert!(!Value::Text("known".to_string()).is_unknown());
        assert!(!Value::Integer(0).is_unknown());
    }

    #[test]
    fn test_ensure_map_conflict() {
        let mut record = Record::new();
        record.insert("Title", "song");
        assert!(record.ensure_map("Title").is_none());
        assert!(record.ensure_map("Info").is_some());
        assert!(matches!(record.get("Info"), Some(Value::Map(_))));
    }

    #[test]
    fn test_get_path() {
        let mut info = Record::new();
        info.insert("Sample Rate", 44100u32);
        let mut record = Record::new();
        record.insert("Info", Value::Map(info));

        assert_eq!(
            record.get_path(&["Info", "Sample Rate"]).and_then(Value::as_i64),
            Some(44100)
        );
        assert!(record.get_path(&["Info", "Missing"]).is_none());
    }

    #[test]
    fn test_json_conversion() {
        let json: serde_json::Value =
            serde_json::from_str(r#"{"format": "mp3", "duration": 1.5, "size": 42}"#).unwrap();
        let value = Value::from_json(&json);
        let map = value.as_map().unwrap();
        assert_eq!(map.get("format").and_then(Value::as_text), Some("mp3"));
        assert_eq!(map.get("duration").and_then(Value::as_f64), Some(1.5));
        assert_eq!(map.get("size").and_then(Value::as_i64), Some(42));
    }
}
