//! Extended feature pipeline (level 2)
//!
//! Computes signal-derived descriptors from a decoded sample buffer: RMS
//! loudness, estimated tempo, and six spectral statistics. Every computation
//! is isolated - one failing descriptor degrades to the sentinel and the
//! rest proceed. Only the decode itself is fatal, in which case the record
//! is returned unmodified.

pub mod spectral;

use crate::aggregate;
use crate::audio;
use crate::types::{AudioBuffer, Record, Value, ADDITIONAL, INFO};
use std::path::Path;
use stratum_dsp::{analyze_audio, AnalysisConfig};
use tracing::{info, warn};

/// Fold signal-derived descriptors into `record`, in place.
///
/// `enabled` is the pipeline kill switch; when off the record passes through
/// untouched. A failed decode also leaves the record unmodified.
pub fn augment(path: &Path, record: &mut Record, enabled: bool) {
    if !enabled {
        info!("Extended feature extraction is disabled");
        return;
    }

    let buffer = match audio::decode(path) {
        Ok(buffer) => buffer,
        Err(e) => {
            warn!("Skipping extended features for {}: {}", path.display(), e);
            return;
        }
    };

    let features = compute_features(&buffer);
    ensure_feature_slots(record);
    aggregate::merge(record, &features);
}

/// Compute the level-2 partial record from a decoded buffer
fn compute_features(buffer: &AudioBuffer) -> Record {
    let spectrogram = spectral::magnitude_spectrogram(&buffer.samples, buffer.sample_rate);

    let mut info = Record::new();
    info.insert("RMS Loudness", Value::Float(rms(&buffer.samples)));
    info.insert("Tempo", guarded("tempo", || estimate_tempo(buffer)));

    let mut additional = Record::new();
    additional.insert(
        "Chroma STFT",
        guarded("chroma_stft", || {
            Ok(Value::List(
                borrow(&spectrogram)?.chroma_mean()?.into_iter().map(Value::Float).collect(),
            ))
        }),
    );
    additional.insert(
        "Spectral Centroid",
        guarded("spectral_centroid", || {
            Ok(Value::Float(borrow(&spectrogram)?.centroid_mean()?))
        }),
    );
    additional.insert(
        "Spectral Bandwidth",
        guarded("spectral_bandwidth", || {
            Ok(Value::Float(borrow(&spectrogram)?.bandwidth_mean()?))
        }),
    );
    additional.insert(
        "Spectral Contrast",
        guarded("spectral_contrast", || {
            Ok(Value::List(
                borrow(&spectrogram)?.contrast_mean()?.into_iter().map(Value::Float).collect(),
            ))
        }),
    );
    additional.insert(
        "Spectral Flatness",
        guarded("spectral_flatness", || {
            Ok(Value::Float(borrow(&spectrogram)?.flatness_mean()?))
        }),
    );
    additional.insert(
        "Zero Crossing Rate",
        guarded("zero_crossing_rate", || {
            Ok(Value::Float(spectral::zero_crossing_rate_mean(&buffer.samples)?))
        }),
    );

    let mut features = Record::new();
    features.insert(INFO, Value::Map(info));
    features.insert(ADDITIONAL, Value::Map(additional));
    features
}

/// Root-mean-square amplitude of the normalized signal
fn rms(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_squares / samples.len() as f64).sqrt()
}

/// Tempo estimate in BPM, from onset autocorrelation analysis
fn estimate_tempo(buffer: &AudioBuffer) -> Result<Value, String> {
    let result = analyze_audio(
        &buffer.samples,
        buffer.sample_rate,
        AnalysisConfig::default(),
    )
    .map_err(|e| e.to_string())?;
    Ok(Value::Float(result.bpm as f64))
}

/// One isolated descriptor computation: failure logs and yields the sentinel
fn guarded(name: &str, compute: impl FnOnce() -> Result<Value, String>) -> Value {
    match compute() {
        Ok(value) => value,
        Err(e) => {
            warn!("Error calculating {}: {}", name, e);
            Value::unknown()
        }
    }
}

fn borrow<'a>(
    spectrogram: &'a Result<spectral::Spectrogram, String>,
) -> Result<&'a spectral::Spectrogram, String> {
    spectrogram.as_ref().map_err(|e| e.clone())
}

/// Make sure the feature landing slots exist so the merge places values
/// under `Info` and `Additional` rather than rerouting them, regardless of
/// which record (skeleton or per-backend partial) is being augmented.
fn ensure_feature_slots(record: &mut Record) {
    if let Some(info) = record.ensure_map(INFO) {
        for key in ["RMS Loudness", "Tempo"] {
            if !info.contains_key(key) {
                info.insert(key, Value::unknown());
            }
        }
    }
    record.ensure_map(ADDITIONAL);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_tone_wav(path: &Path, secs: f32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        let n = (secs * 22050.0) as usize;
        for i in 0..n {
            let t = i as f32 / 22050.0;
            let sample = ((2.0 * std::f32::consts::PI * 440.0 * t).sin() * 12000.0) as i16;
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_rms_of_sine() {
        let samples: Vec<f32> = (0..22050)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 22050.0).sin() * 0.5)
            .collect();
        // RMS of a 0.5-amplitude sine is 0.5 / sqrt(2)
        let expected = 0.5 / std::f64::consts::SQRT_2;
        assert!((rms(&samples) - expected).abs() < 0.01);
    }

    #[test]
    fn test_compute_features_isolation() {
        // A buffer too short for spectral analysis: the spectral descriptors
        // degrade to the sentinel, RMS still computes.
        let buffer = AudioBuffer::new(vec![0.5f32; 256], 22050);
        let features = compute_features(&buffer);

        assert!(features
            .get_path(&[INFO, "RMS Loudness"])
            .and_then(Value::as_f64)
            .is_some());
        assert!(features
            .get_path(&[ADDITIONAL, "Spectral Centroid"])
            .unwrap()
            .is_unknown());
        assert!(features
            .get_path(&[ADDITIONAL, "Zero Crossing Rate"])
            .unwrap()
            .is_unknown());
    }

    #[test]
    fn test_augment_disabled_is_noop() {
        let temp = TempDir::new().unwrap();
        let wav = temp.path().join("tone.wav");
        write_tone_wav(&wav, 1.0);

        let mut record = Record::new();
        let snapshot = record.clone();
        augment(&wav, &mut record, false);
        assert_eq!(record, snapshot);
    }

    #[test]
    fn test_augment_decode_failure_is_noop() {
        let temp = TempDir::new().unwrap();
        let bad = temp.path().join("broken.wav");
        std::fs::write(&bad, b"not audio").unwrap();

        let mut record = Record::new();
        record.insert("Title", "untouched");
        let snapshot = record.clone();
        augment(&bad, &mut record, true);
        assert_eq!(record, snapshot);
    }

    #[test]
    fn test_augment_fills_feature_slots() {
        let temp = TempDir::new().unwrap();
        let wav = temp.path().join("tone.wav");
        write_tone_wav(&wav, 2.0);

        let mut record = Record::new();
        augment(&wav, &mut record, true);

        // Descriptors land under Info and Additional, not under any Extra
        let rms = record.get_path(&[INFO, "RMS Loudness"]).unwrap();
        assert!(rms.as_f64().unwrap() > 0.0);
        assert!(record.get_path(&[INFO, "Tempo"]).is_some());

        for key in [
            "Chroma STFT",
            "Spectral Centroid",
            "Spectral Bandwidth",
            "Spectral Contrast",
            "Spectral Flatness",
            "Zero Crossing Rate",
        ] {
            assert!(
                record.get_path(&[ADDITIONAL, key]).is_some(),
                "missing descriptor {key}"
            );
        }

        // A steady tone has real spectral values
        assert!(record
            .get_path(&[ADDITIONAL, "Spectral Centroid"])
            .unwrap()
            .as_f64()
            .unwrap()
            > 0.0);
    }
}
