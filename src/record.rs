//! Base record construction
//!
//! Builds the fully-keyed skeleton record for one input file: every schema
//! field present, filesystem-derived facts filled in, everything else the
//! sentinel. Each sub-fact is computed best-effort on its own; only failure
//! to stat the file itself is fatal for the file.

use crate::error::Result;
use crate::types::{Record, Value};
use chrono::{DateTime, Local};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;
use std::time::SystemTime;
use tracing::{debug, warn};

/// Chunk size for streaming checksum computation
const CHECKSUM_CHUNK_SIZE: usize = 8192;

/// Build the skeleton record for a file that already passed the safety gate.
///
/// Fails only if the file itself cannot be stat'ed; every derived fact
/// degrades to the sentinel independently.
pub fn build_skeleton(path: &Path) -> Result<Record> {
    let metadata = std::fs::metadata(path)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string());

    let mut geolocation = Record::new();
    geolocation.insert("Latitude", Value::unknown());
    geolocation.insert("Longitude", Value::unknown());

    let mut device = Record::new();
    device.insert("Encoder", Value::unknown());
    device.insert("Software", Value::unknown());

    let mut info = Record::new();
    info.insert("Format", Value::unknown());
    info.insert("Type", "Audio");
    info.insert("Subtype", Value::unknown());
    info.insert("Sample Rate", Value::unknown());
    info.insert("Bit Rate", Value::unknown());
    info.insert("Encoding", Value::unknown());
    info.insert("Channels", Value::unknown());
    info.insert("Bit Depth", bit_depth(path));
    info.insert("File Size", metadata.len());
    info.insert("Duration", Value::unknown());
    info.insert("RMS Loudness", Value::unknown());
    info.insert("Tempo", Value::unknown());

    let mut record = Record::new();
    record.insert("Source", "Aggregated");
    record.insert("File Name", file_name);
    record.insert("Checksum", checksum(path));
    record.insert("Creation Date", timestamp(metadata.created(), path, "creation"));
    record.insert("Modification Date", timestamp(metadata.modified(), path, "modification"));
    record.insert("Access Date", timestamp(metadata.accessed(), path, "access"));
    record.insert("Title", Value::unknown());
    record.insert("Artist", Value::unknown());
    record.insert("Album", Value::unknown());
    record.insert("Year", Value::unknown());
    record.insert("Genre", Value::unknown());
    record.insert("Track Number", Value::unknown());
    record.insert("Disc Number", Value::unknown());
    record.insert("Composer", Value::unknown());
    record.insert("Conductor", Value::unknown());
    record.insert("Lyrics", Value::unknown());
    record.insert("Language", Value::unknown());
    record.insert("Geolocation", Value::Map(geolocation));
    record.insert("Device Information", Value::Map(device));
    record.insert("Info", Value::Map(info));
    record.insert("Additional", Value::Map(Record::new()));
    record.insert("Extra", Value::Map(Record::new()));

    Ok(record)
}

/// Streaming SHA-256 over fixed-size chunks, hex digest.
///
/// Any failure degrades to the sentinel; a missing checksum must never fail
/// the extraction.
fn checksum(path: &Path) -> Value {
    match checksum_inner(path) {
        Ok(digest) => Value::Text(digest),
        Err(e) => {
            warn!("Error calculating checksum for {}: {}", path.display(), e);
            Value::unknown()
        }
    }
}

fn checksum_inner(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; CHECKSUM_CHUNK_SIZE];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Best-effort filesystem timestamp, formatted as local time
fn timestamp(time: std::io::Result<SystemTime>, path: &Path, what: &str) -> Value {
    match time {
        Ok(time) => {
            let local: DateTime<Local> = time.into();
            Value::Text(local.format("%Y-%m-%d %H:%M:%S%.6f").to_string())
        }
        Err(e) => {
            warn!("Error getting {} date for {}: {}", what, path.display(), e);
            Value::unknown()
        }
    }
}

/// Bit depth: generic decode introspection first, raw WAV header as fallback
fn bit_depth(path: &Path) -> Value {
    if let Some(bits) = probe_bit_depth(path) {
        return Value::Integer(bits as i64);
    }

    match hound::WavReader::open(path) {
        Ok(reader) => Value::Integer(reader.spec().bits_per_sample as i64),
        Err(e) => {
            debug!("No bit depth available for {}: {}", path.display(), e);
            Value::unknown()
        }
    }
}

fn probe_bit_depth(path: &Path) -> Option<u32> {
    use symphonia::core::codecs::CODEC_TYPE_NULL;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let file = std::fs::File::open(path).ok()?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .ok()?;

    probed
        .format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .and_then(|t| t.codec_params.bits_per_sample)
}
