//! Lightweight container tag backend (symphonia metadata)
//!
//! Format-agnostic reader over the metadata revisions the demuxer collects
//! while probing: ID3 frames, Vorbis comments, RIFF INFO chunks and friends,
//! normalized by symphonia into standard keys. The complete raw tag dump is
//! kept under `Extra`; stream info is a simpler subset of what the decoder
//! backend reports.

use crate::backends::{guard, Backend};
use crate::sanitize::sanitize_record;
use crate::types::{Record, Value};
use std::path::Path;
use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, StandardTagKey, Tag};
use symphonia::core::probe::Hint;
use tracing::warn;

pub struct ContainerBackend;

impl Backend for ContainerBackend {
    fn name(&self) -> &'static str {
        "Container"
    }

    fn extract(&self, path: &Path) -> Option<Record> {
        let path = guard(self.name(), path)?;

        let (tags, stream) = match read_container(&path) {
            Ok(parts) => parts,
            Err(e) => {
                warn!("Container tag read failed for {}: {}", path.display(), e);
                return None;
            }
        };

        let mut record = Record::new();
        record.insert("Source", self.name());

        for tag in &tags {
            if let Some((field, value)) = standard_field(tag) {
                record.insert(field, value);
            }
        }

        let mut info = Record::new();
        if let Some(rate) = stream.sample_rate {
            info.insert("Sample Rate", rate);
        }
        if let Some(channels) = stream.channels {
            info.insert("Channels", Value::Integer(channels as i64));
        }
        if let Some(duration) = stream.duration {
            info.insert("Duration", duration);
        }
        record.insert("Info", Value::Map(info));

        // Raw dump of every tag the demuxer surfaced, schema or not
        let mut extra = Record::new();
        for tag in &tags {
            if !tag.key.is_empty() {
                extra.insert(tag.key.clone(), tag.value.to_string());
            }
        }
        record.insert("Extra", Value::Map(extra));

        sanitize_record(&mut record);
        Some(record)
    }
}

/// Simple stream facts pulled from the first audio track
struct StreamInfo {
    sample_rate: Option<u32>,
    channels: Option<usize>,
    duration: Option<f64>,
}

fn read_container(
    path: &Path,
) -> std::result::Result<(Vec<Tag>, StreamInfo), symphonia::core::errors::Error> {
    let file = std::fs::File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let mut probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let mut tags: Vec<Tag> = Vec::new();
    if let Some(metadata) = probed.metadata.get() {
        if let Some(revision) = metadata.current() {
            tags.extend(revision.tags().iter().cloned());
        }
    }
    if let Some(revision) = probed.format.metadata().current() {
        tags.extend(revision.tags().iter().cloned());
    }

    let stream = probed
        .format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .map(|t| {
            let params = &t.codec_params;
            StreamInfo {
                sample_rate: params.sample_rate,
                channels: params.channels.map(|c| c.count()),
                duration: match (params.n_frames, params.sample_rate) {
                    (Some(frames), Some(rate)) if rate > 0 => {
                        Some(frames as f64 / rate as f64)
                    }
                    _ => None,
                },
            }
        })
        .unwrap_or(StreamInfo {
            sample_rate: None,
            channels: None,
            duration: None,
        });

    Ok((tags, stream))
}

/// Map a standard tag key to its schema field
fn standard_field(tag: &Tag) -> Option<(&'static str, Value)> {
    let field = match tag.std_key? {
        StandardTagKey::TrackTitle => "Title",
        StandardTagKey::Artist => "Artist",
        StandardTagKey::Album => "Album",
        StandardTagKey::Date | StandardTagKey::ReleaseDate => "Year",
        StandardTagKey::Genre => "Genre",
        StandardTagKey::TrackNumber => "Track Number",
        StandardTagKey::DiscNumber => "Disc Number",
        StandardTagKey::Composer => "Composer",
        StandardTagKey::Conductor => "Conductor",
        StandardTagKey::Lyrics => "Lyrics",
        StandardTagKey::Language => "Language",
        _ => return None,
    };
    Some((field, Value::Text(tag.value.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_raw_dump_and_stream_subset() {
        let temp = TempDir::new().unwrap();
        let wav = temp.path().join("dump.wav");

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&wav, spec).unwrap();
        for i in 0..16000i32 {
            writer.write_sample(((i % 80) - 40) as i16 * 100).unwrap();
        }
        writer.finalize().unwrap();

        let record = ContainerBackend.extract(&wav).expect("backend should succeed");

        assert_eq!(record.get("Source").and_then(Value::as_text), Some("Container"));
        assert_eq!(
            record.get_path(&["Info", "Sample Rate"]).and_then(Value::as_i64),
            Some(16000)
        );
        // Extra is always present, even when the container carried no tags
        assert!(matches!(record.get("Extra"), Some(Value::Map(_))));
    }

    #[test]
    fn test_unreadable_yields_absent() {
        let temp = TempDir::new().unwrap();
        let bad = temp.path().join("nope.flac");
        std::fs::write(&bad, b"fLaC but not really").unwrap();

        assert!(ContainerBackend.extract(&bad).is_none());
    }
}
