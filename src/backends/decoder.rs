//! Decoder introspection backend (symphonia)
//!
//! Opens the file with the decoder stack and reports stream-level facts:
//! format, codec subtype, sample rate, channel count, duration, frame count,
//! and endianness. No tag data - that is the tag readers' job.

use crate::backends::{guard, Backend};
use crate::sanitize::sanitize_record;
use crate::types::{Record, Value};
use std::path::Path;
use symphonia::core::codecs::{self, CodecParameters, CodecType};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::warn;

pub struct DecoderBackend;

impl Backend for DecoderBackend {
    fn name(&self) -> &'static str {
        "Decoder"
    }

    fn extract(&self, path: &Path) -> Option<Record> {
        let path = guard(self.name(), path)?;

        let params = match probe_stream(&path) {
            Ok(params) => params,
            Err(e) => {
                warn!("Decoder introspection failed for {}: {}", path.display(), e);
                return None;
            }
        };

        let mut info = Record::new();
        info.insert("Format", container_name(&path));
        info.insert(
            "Subtype",
            codec_name(params.codec).map(Value::from).unwrap_or_else(Value::unknown),
        );
        info.insert(
            "Sample Rate",
            params.sample_rate.map(Value::from).unwrap_or_else(Value::unknown),
        );
        info.insert(
            "Channels",
            params
                .channels
                .map(|c| Value::Integer(c.count() as i64))
                .unwrap_or_else(Value::unknown),
        );
        info.insert(
            "Duration",
            match (params.n_frames, params.sample_rate) {
                (Some(frames), Some(rate)) if rate > 0 => {
                    Value::Float(frames as f64 / rate as f64)
                }
                _ => Value::unknown(),
            },
        );
        info.insert(
            "Frames",
            params.n_frames.map(Value::from).unwrap_or_else(Value::unknown),
        );

        let mut extra = Record::new();
        extra.insert("Endian", endianness(params.codec));

        let mut record = Record::new();
        record.insert("Source", self.name());
        record.insert("Info", Value::Map(info));
        record.insert("Extra", Value::Map(extra));

        sanitize_record(&mut record);
        Some(record)
    }
}

fn probe_stream(path: &Path) -> std::result::Result<CodecParameters, symphonia::core::errors::Error> {
    let file = std::fs::File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    probed
        .format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != codecs::CODEC_TYPE_NULL)
        .map(|t| t.codec_params.clone())
        .ok_or_else(|| {
            symphonia::core::errors::Error::Unsupported("no audio tracks found")
        })
}

/// Container name derived from the probed file's extension
fn container_name(path: &Path) -> Value {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| Value::Text(e.to_uppercase()))
        .unwrap_or_else(Value::unknown)
}

/// Human-readable codec subtype for the well-known codec ids
fn codec_name(codec: CodecType) -> Option<&'static str> {
    let name = match codec {
        codecs::CODEC_TYPE_PCM_S8 => "PCM_S8",
        codecs::CODEC_TYPE_PCM_U8 => "PCM_U8",
        codecs::CODEC_TYPE_PCM_S16LE => "PCM_S16LE",
        codecs::CODEC_TYPE_PCM_S16BE => "PCM_S16BE",
        codecs::CODEC_TYPE_PCM_S24LE => "PCM_S24LE",
        codecs::CODEC_TYPE_PCM_S24BE => "PCM_S24BE",
        codecs::CODEC_TYPE_PCM_S32LE => "PCM_S32LE",
        codecs::CODEC_TYPE_PCM_S32BE => "PCM_S32BE",
        codecs::CODEC_TYPE_PCM_F32LE => "PCM_F32LE",
        codecs::CODEC_TYPE_PCM_F64LE => "PCM_F64LE",
        codecs::CODEC_TYPE_MP3 => "MP3",
        codecs::CODEC_TYPE_AAC => "AAC",
        codecs::CODEC_TYPE_FLAC => "FLAC",
        codecs::CODEC_TYPE_VORBIS => "VORBIS",
        codecs::CODEC_TYPE_OPUS => "OPUS",
        codecs::CODEC_TYPE_ALAC => "ALAC",
        _ => return None,
    };
    Some(name)
}

/// Byte order of the sample encoding, where the codec pins one down
fn endianness(codec: CodecType) -> Value {
    match codec {
        codecs::CODEC_TYPE_PCM_S16LE
        | codecs::CODEC_TYPE_PCM_S24LE
        | codecs::CODEC_TYPE_PCM_S32LE
        | codecs::CODEC_TYPE_PCM_F32LE
        | codecs::CODEC_TYPE_PCM_F64LE => Value::Text("LITTLE".to_string()),
        codecs::CODEC_TYPE_PCM_S16BE
        | codecs::CODEC_TYPE_PCM_S24BE
        | codecs::CODEC_TYPE_PCM_S32BE => Value::Text("BIG".to_string()),
        _ => Value::Text("FILE".to_string()),
    }
}
