//! Record aggregation
//!
//! Folds the partial records produced by the backends into the skeleton with
//! a deterministic, order-sensitive policy: the first backend to supply a
//! non-sentinel value for a field wins, and keys outside the fixed schema
//! land in the same nesting level's `Extra` group exactly once.
//!
//! The merge is an explicit recursive walk over the record tree - maps
//! recurse, scalars follow the sentinel rule - with `Extra` and `Additional`
//! treated as open groups whose entries union first-wins.

use crate::backends;
use crate::error::Result;
use crate::features;
use crate::record;
use crate::safety;
use crate::types::{Extraction, Level, Record, Value, ADDITIONAL, EXTRA, SOURCE};
use std::path::Path;
use tracing::debug;

/// Merge a partial record into `base`, in place.
///
/// For each key of `partial`:
/// - a nested map ensures the key exists in `base` as a map and recurses;
/// - a scalar overwrites `base`'s value only when the current value is the
///   sentinel and the new one is not;
/// - a scalar under a key `base` does not have at all is inserted into the
///   `Extra` map of the same nesting level, first source wins;
/// - anything else is dropped silently.
pub fn merge(base: &mut Record, partial: &Record) {
    for (key, value) in partial.iter() {
        match value {
            Value::Map(sub) => {
                let open = key == EXTRA || key == ADDITIONAL;
                if let Some(slot) = base.ensure_map(key) {
                    if open {
                        merge_open(slot, sub);
                    } else {
                        merge(slot, sub);
                    }
                }
                // A scalar already under this key keeps it; the subtree is dropped.
            }
            scalar => {
                if let Some(existing) = base.get_mut(key) {
                    if existing.is_unknown() && !scalar.is_unknown() {
                        *existing = scalar.clone();
                    }
                } else if let Some(extra) = base.ensure_map(EXTRA) {
                    extra
                        .0
                        .entry(key.clone())
                        .or_insert_with(|| scalar.clone());
                }
            }
        }
    }
}

/// Union into an open group: entries are taken wholesale when absent,
/// sentinel entries may still be upgraded, nothing is ever rerouted.
fn merge_open(base: &mut Record, partial: &Record) {
    for (key, value) in partial.iter() {
        match base.get_mut(key) {
            Some(existing) => {
                if existing.is_unknown() && !value.is_unknown() {
                    *existing = value.clone();
                }
            }
            None => base.insert(key.clone(), value.clone()),
        }
    }
}

/// Extract metadata for one file using every backend.
///
/// The path runs through the safety gate, the skeleton is built, and all six
/// backends run in fixed order. With `aggregate` the partials fold into the
/// skeleton and one record is returned; without it the untouched per-backend
/// records are returned and the skeleton is discarded. At `Level::Extended`
/// the signal-derived features are folded in last (or into each per-backend
/// record independently).
pub fn extract(path: &str, level: Level, aggregate: bool) -> Result<Extraction> {
    let safe_path = safety::ensure_safe(path)?;
    let mut base = record::build_skeleton(&safe_path)?;

    let partials = run_backends(&safe_path);

    if aggregate {
        for partial in &partials {
            merge(&mut base, partial);
        }
        if level == Level::Extended {
            features::augment(&safe_path, &mut base, true);
        }
        Ok(Extraction::Aggregated(base))
    } else {
        let mut records = partials;
        if level == Level::Extended {
            for partial in &mut records {
                features::augment(&safe_path, partial, true);
            }
        }
        Ok(Extraction::PerBackend(records))
    }
}

/// Variant of [`extract`] taking the raw level argument; anything that does
/// not coerce to an integer is an `InvalidInput` error.
pub fn extract_raw(path: &str, level: &str, aggregate: bool) -> Result<Extraction> {
    let level = Level::parse(level)?;
    extract(path, level, aggregate)
}

/// Run all backends in fixed order, tagging each result with its source name
fn run_backends(path: &Path) -> Vec<Record> {
    backends::all()
        .iter()
        .filter_map(|backend| {
            let result = backend.extract(path);
            if result.is_none() {
                debug!("Backend {} produced no record for {}", backend.name(), path.display());
            }
            result.map(|mut partial| {
                partial.insert(SOURCE, backend.name());
                partial
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_with(fields: &[(&str, Value)]) -> Record {
        let mut record = Record::new();
        for (key, value) in fields {
            record.insert(*key, value.clone());
        }
        record
    }

    /// Merging an empty partial leaves the record unchanged
    #[test]
    fn test_merge_idempotence() {
        let mut base = base_with(&[
            ("Title", Value::Text("Song".to_string())),
            ("Artist", Value::unknown()),
            ("Extra", Value::Map(Record::new())),
        ]);
        let snapshot = base.clone();

        merge(&mut base, &Record::new());
        assert_eq!(base, snapshot);
    }

    /// First non-sentinel value wins across sources
    #[test]
    fn test_merge_precedence() {
        let mut base = base_with(&[("Artist", Value::unknown())]);

        merge(&mut base, &base_with(&[("Artist", Value::Text("A".to_string()))]));
        merge(&mut base, &base_with(&[("Artist", Value::Text("B".to_string()))]));

        assert_eq!(base.get("Artist").and_then(Value::as_text), Some("A"));
    }

    /// A sentinel from a later source never clobbers a known value
    #[test]
    fn test_merge_sentinel_never_overwrites() {
        let mut base = base_with(&[("Artist", Value::Text("A".to_string()))]);
        merge(&mut base, &base_with(&[("Artist", Value::unknown())]));
        assert_eq!(base.get("Artist").and_then(Value::as_text), Some("A"));
    }

    /// Unknown keys land in the same level's Extra, first source wins, once
    #[test]
    fn test_merge_unknown_key_placement() {
        let mut base = base_with(&[
            ("Title", Value::unknown()),
            ("Extra", Value::Map(Record::new())),
        ]);

        merge(&mut base, &base_with(&[("Mood", Value::Text("X".to_string()))]));
        merge(&mut base, &base_with(&[("Mood", Value::Text("Y".to_string()))]));

        assert!(base.get("Mood").is_none());
        assert_eq!(
            base.get_path(&["Extra", "Mood"]).and_then(Value::as_text),
            Some("X")
        );
    }

    /// Unknown keys at a nested level go to that level's Extra, not the root's
    #[test]
    fn test_merge_unknown_key_nested_level() {
        let mut info = Record::new();
        info.insert("Sample Rate", Value::unknown());
        let mut base = base_with(&[("Info", Value::Map(info))]);

        let mut partial_info = Record::new();
        partial_info.insert("Sample Rate", 44100u32);
        partial_info.insert("Frames", 1000u64);
        let partial = base_with(&[("Info", Value::Map(partial_info))]);

        merge(&mut base, &partial);

        assert_eq!(
            base.get_path(&["Info", "Sample Rate"]).and_then(Value::as_i64),
            Some(44100)
        );
        assert_eq!(
            base.get_path(&["Info", "Extra", "Frames"]).and_then(Value::as_i64),
            Some(1000)
        );
        assert!(base.get_path(&["Extra", "Frames"]).is_none());
    }

    /// A missing nested group is created as a mapping before recursion
    #[test]
    fn test_merge_creates_missing_group() {
        let mut base = Record::new();

        let mut geo = Record::new();
        geo.insert("Latitude", Value::Text("54.68".to_string()));
        let partial = base_with(&[("Geolocation", Value::Map(geo))]);

        merge(&mut base, &partial);

        assert_eq!(
            base.get_path(&["Geolocation", "Latitude"]).and_then(Value::as_text),
            Some("54.68")
        );
    }

    /// Additional is an open group: descriptor keys land directly under it
    #[test]
    fn test_merge_additional_is_open() {
        let mut base = base_with(&[("Additional", Value::Map(Record::new()))]);

        let mut additional = Record::new();
        additional.insert("Spectral Flatness", Value::Float(0.25));
        let partial = base_with(&[("Additional", Value::Map(additional))]);

        merge(&mut base, &partial);

        assert_eq!(
            base.get_path(&["Additional", "Spectral Flatness"]).and_then(Value::as_f64),
            Some(0.25)
        );
        assert!(base.get_path(&["Additional", "Extra"]).is_none());
    }

    /// Extra groups from two sources union first-wins without rerouting
    #[test]
    fn test_merge_extra_union() {
        let mut base = base_with(&[("Extra", Value::Map(Record::new()))]);

        let mut extra1 = Record::new();
        extra1.insert("encoder_version", Value::Text("v1".to_string()));
        merge(&mut base, &base_with(&[("Extra", Value::Map(extra1))]));

        let mut extra2 = Record::new();
        extra2.insert("encoder_version", Value::Text("v2".to_string()));
        extra2.insert("padding", Value::Integer(576));
        merge(&mut base, &base_with(&[("Extra", Value::Map(extra2))]));

        assert_eq!(
            base.get_path(&["Extra", "encoder_version"]).and_then(Value::as_text),
            Some("v1")
        );
        assert_eq!(
            base.get_path(&["Extra", "padding"]).and_then(Value::as_i64),
            Some(576)
        );
    }

    /// A map arriving where base holds a scalar is dropped, not crashed on
    #[test]
    fn test_merge_map_over_scalar_dropped() {
        let mut base = base_with(&[("Title", Value::Text("Song".to_string()))]);

        let mut sub = Record::new();
        sub.insert("nested", Value::Integer(1));
        merge(&mut base, &base_with(&[("Title", Value::Map(sub))]));

        assert_eq!(base.get("Title").and_then(Value::as_text), Some("Song"));
    }

    #[test]
    fn test_extract_raw_rejects_bad_level() {
        let err = extract_raw("whatever.mp3", "detailed", true).unwrap_err();
        assert!(matches!(err, crate::error::TagprobeError::InvalidInput(_)));
    }
}
