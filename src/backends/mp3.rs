//! MP3-specialized backend (id3 + MPEG frame header)
//!
//! ID3 frames supply the descriptive fields; the first valid MPEG audio
//! frame header supplies bit rate, channel mode and sample rate, with
//! Xing/Info/VBRI detection deciding CBR vs VBR and refining the duration
//! estimate. Non-MP3 files are not this backend's business.

use crate::backends::{guard, Backend};
use crate::sanitize::sanitize_record;
use crate::types::{Record, Value};
use id3::TagLike;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

pub struct Mp3Backend;

impl Backend for Mp3Backend {
    fn name(&self) -> &'static str {
        "MP3"
    }

    fn extract(&self, path: &Path) -> Option<Record> {
        let path = guard(self.name(), path)?;

        let is_mp3 = path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| e.eq_ignore_ascii_case("mp3"));
        if !is_mp3 {
            return None;
        }

        let header = match read_mpeg_info(&path) {
            Ok(Some(header)) => header,
            Ok(None) => {
                debug!("No MPEG frame header found in {}", path.display());
                return None;
            }
            Err(e) => {
                warn!("MPEG header read failed for {}: {}", path.display(), e);
                return None;
            }
        };

        // A missing or damaged ID3 tag is fine; the frame header is enough.
        let tag = match id3::Tag::read_from_path(&path) {
            Ok(tag) => Some(tag),
            Err(e) if matches!(e.kind, id3::ErrorKind::NoTag) => None,
            Err(e) => {
                debug!("ID3 tag read failed for {}: {}", path.display(), e);
                None
            }
        };

        let mut record = Record::new();
        record.insert("Source", self.name());

        if let Some(tag) = &tag {
            record.insert("Title", text_or_unknown(tag.title()));
            record.insert("Artist", text_or_unknown(tag.artist()));
            record.insert("Album", text_or_unknown(tag.album()));
            record.insert(
                "Year",
                tag.year()
                    .map(|y| Value::Integer(y as i64))
                    .unwrap_or_else(Value::unknown),
            );
            record.insert("Genre", text_or_unknown(tag.genre_parsed().as_deref()));
            record.insert(
                "Track Number",
                tag.track().map(Value::from).unwrap_or_else(Value::unknown),
            );
            record.insert(
                "Disc Number",
                tag.disc().map(Value::from).unwrap_or_else(Value::unknown),
            );
            record.insert(
                "Composer",
                text_or_unknown(tag.get("TCOM").and_then(|f| f.content().text())),
            );
        }

        let duration = header.duration_secs();
        let bit_rate = header.reported_bitrate();

        let mut info = Record::new();
        info.insert("Format", "MP3");
        info.insert("Bit Rate", Value::Integer(bit_rate as i64));
        info.insert(
            "Encoding",
            if header.vbr { "VBR" } else { "CBR" },
        );
        info.insert("Channels", header.channel_mode);
        info.insert(
            "Duration",
            duration.map(Value::Float).unwrap_or_else(Value::unknown),
        );
        record.insert("Info", Value::Map(info));

        let mut extra = Record::new();
        extra.insert("bit_rate", format!("{} kb/s", bit_rate / 1000));
        extra.insert("sample_rate", header.sample_rate);
        extra.insert("channels", header.channel_mode);
        if let Some(secs) = duration {
            extra.insert("length", Value::Float(secs));
        }
        record.insert("Extra", Value::Map(extra));

        sanitize_record(&mut record);
        Some(record)
    }
}

fn text_or_unknown(value: Option<&str>) -> Value {
    value
        .filter(|s| !s.is_empty())
        .map(Value::from)
        .unwrap_or_else(Value::unknown)
}

// =============================================================================
// MPEG frame header parsing
// =============================================================================

/// How much of the file to scan for the first frame sync
const SCAN_LIMIT: usize = 256 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MpegVersion {
    V1,
    V2,
    V25,
}

#[derive(Debug)]
struct MpegInfo {
    sample_rate: u32,
    /// Nominal bit rate of the first frame, bits per second
    nominal_bitrate: u32,
    channel_mode: &'static str,
    vbr: bool,
    /// Frame count from a Xing/Info header, when present
    frame_count: Option<u32>,
    samples_per_frame: u32,
    /// Bytes of MPEG audio data (file size minus the leading ID3v2 block)
    audio_bytes: u64,
}

impl MpegInfo {
    fn duration_secs(&self) -> Option<f64> {
        if let Some(frames) = self.frame_count {
            if self.sample_rate > 0 {
                return Some(frames as f64 * self.samples_per_frame as f64 / self.sample_rate as f64);
            }
        }
        if self.nominal_bitrate > 0 {
            return Some(self.audio_bytes as f64 * 8.0 / self.nominal_bitrate as f64);
        }
        None
    }

    /// Average bit rate for VBR streams with a known frame count,
    /// nominal first-frame bit rate otherwise
    fn reported_bitrate(&self) -> u32 {
        if self.vbr {
            if let Some(duration) = self.duration_secs() {
                if duration > 0.0 {
                    return (self.audio_bytes as f64 * 8.0 / duration) as u32;
                }
            }
        }
        self.nominal_bitrate
    }
}

fn read_mpeg_info(path: &Path) -> std::io::Result<Option<MpegInfo>> {
    let file_size = std::fs::metadata(path)?.len();
    let file = std::fs::File::open(path)?;
    let mut buffer = Vec::with_capacity(SCAN_LIMIT.min(file_size as usize));
    file.take(SCAN_LIMIT as u64).read_to_end(&mut buffer)?;

    let start = id3v2_size(&buffer);
    let audio_bytes = file_size.saturating_sub(start as u64);

    let mut pos = start;
    while pos + 4 <= buffer.len() {
        if buffer[pos] == 0xFF && buffer[pos + 1] & 0xE0 == 0xE0 {
            if let Some(info) = parse_frame(&buffer, pos, audio_bytes) {
                return Ok(Some(info));
            }
        }
        pos += 1;
    }

    Ok(None)
}

/// Size of a leading ID3v2 block, including header and optional footer
fn id3v2_size(buffer: &[u8]) -> usize {
    if buffer.len() < 10 || &buffer[0..3] != b"ID3" {
        return 0;
    }
    // Tag size is a 28-bit synchsafe integer
    let size = ((buffer[6] as usize & 0x7F) << 21)
        | ((buffer[7] as usize & 0x7F) << 14)
        | ((buffer[8] as usize & 0x7F) << 7)
        | (buffer[9] as usize & 0x7F);
    let footer = if buffer[5] & 0x10 != 0 { 10 } else { 0 };
    10 + size + footer
}

fn parse_frame(buffer: &[u8], pos: usize, audio_bytes: u64) -> Option<MpegInfo> {
    let b1 = buffer[pos + 1];
    let b2 = buffer[pos + 2];
    let b3 = buffer[pos + 3];

    let version = match (b1 >> 3) & 0x3 {
        0 => MpegVersion::V25,
        2 => MpegVersion::V2,
        3 => MpegVersion::V1,
        _ => return None,
    };

    // Layer bits: 1 = Layer III, 2 = Layer II, 3 = Layer I
    let layer = match (b1 >> 1) & 0x3 {
        0 => return None,
        bits => 4 - bits,
    };

    let bitrate_index = (b2 >> 4) & 0xF;
    if bitrate_index == 0 || bitrate_index == 15 {
        return None;
    }
    let bitrate_kbps = bitrate_table(version, layer)[bitrate_index as usize];

    let samplerate_index = (b2 >> 2) & 0x3;
    if samplerate_index == 3 {
        return None;
    }
    let sample_rate = sample_rate_table(version)[samplerate_index as usize];

    let mode_bits = (b3 >> 6) & 0x3;
    let channel_mode = match mode_bits {
        0 => "Stereo",
        1 => "Joint Stereo",
        2 => "Dual Channel",
        _ => "Mono",
    };

    let samples_per_frame = match (version, layer) {
        (_, 1) => 384,
        (_, 2) => 1152,
        (MpegVersion::V1, _) => 1152,
        _ => 576,
    };

    let (vbr, frame_count) = detect_vbr_header(buffer, pos, version, mode_bits == 3);

    Some(MpegInfo {
        sample_rate,
        nominal_bitrate: bitrate_kbps * 1000,
        channel_mode,
        vbr,
        frame_count,
        samples_per_frame,
        audio_bytes,
    })
}

/// Bit rate lookup in kbps, indexed by the header's bitrate field
fn bitrate_table(version: MpegVersion, layer: u8) -> &'static [u32; 16] {
    const V1_L1: [u32; 16] = [0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448, 0];
    const V1_L2: [u32; 16] = [0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384, 0];
    const V1_L3: [u32; 16] = [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 0];
    const V2_L1: [u32; 16] = [0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256, 0];
    const V2_L23: [u32; 16] = [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160, 0];

    match (version, layer) {
        (MpegVersion::V1, 1) => &V1_L1,
        (MpegVersion::V1, 2) => &V1_L2,
        (MpegVersion::V1, _) => &V1_L3,
        (_, 1) => &V2_L1,
        _ => &V2_L23,
    }
}

fn sample_rate_table(version: MpegVersion) -> &'static [u32; 3] {
    match version {
        MpegVersion::V1 => &[44100, 48000, 32000],
        MpegVersion::V2 => &[22050, 24000, 16000],
        MpegVersion::V25 => &[11025, 12000, 8000],
    }
}

/// Look for a Xing/Info/VBRI header inside the first frame.
///
/// "Xing" and "VBRI" mark variable bit rate streams; "Info" is the same
/// structure written by CBR encoders. Both carry an optional frame count.
fn detect_vbr_header(
    buffer: &[u8],
    frame_pos: usize,
    version: MpegVersion,
    mono: bool,
) -> (bool, Option<u32>) {
    let side_info = match (version, mono) {
        (MpegVersion::V1, true) => 17,
        (MpegVersion::V1, false) => 32,
        (_, true) => 9,
        (_, false) => 17,
    };

    let xing_pos = frame_pos + 4 + side_info;
    if xing_pos + 8 <= buffer.len() {
        let marker = &buffer[xing_pos..xing_pos + 4];
        if marker == b"Xing" || marker == b"Info" {
            let vbr = marker == b"Xing";
            let flags = u32_be(&buffer[xing_pos + 4..xing_pos + 8]);
            let frame_count = if flags & 0x1 != 0 && xing_pos + 12 <= buffer.len() {
                Some(u32_be(&buffer[xing_pos + 8..xing_pos + 12]))
            } else {
                None
            };
            return (vbr, frame_count);
        }
    }

    let vbri_pos = frame_pos + 4 + 32;
    if vbri_pos + 18 <= buffer.len() && &buffer[vbri_pos..vbri_pos + 4] == b"VBRI" {
        let frame_count = u32_be(&buffer[vbri_pos + 14..vbri_pos + 18]);
        return (true, Some(frame_count));
    }

    (false, None)
}

fn u32_be(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    /// MPEG1 Layer III, 128 kbps, 44100 Hz, joint stereo
    fn cbr_frame_header() -> [u8; 4] {
        [0xFF, 0xFB, 0x90, 0x40]
    }

    #[test]
    fn test_parse_cbr_frame() {
        let mut buffer = vec![0u8; 512];
        buffer[..4].copy_from_slice(&cbr_frame_header());

        let info = parse_frame(&buffer, 0, 128_000).expect("valid frame");
        assert_eq!(info.sample_rate, 44100);
        assert_eq!(info.nominal_bitrate, 128_000);
        assert_eq!(info.channel_mode, "Joint Stereo");
        assert!(!info.vbr);
        assert_eq!(info.samples_per_frame, 1152);
        // 128000 bytes at 128 kbps is 8 seconds of audio
        assert!((info.duration_secs().unwrap() - 8.0).abs() < 0.01);
    }

    #[test]
    fn test_parse_xing_vbr_frame() {
        let mut buffer = vec![0u8; 512];
        buffer[..4].copy_from_slice(&cbr_frame_header());
        // Xing header at 4 + 32 (MPEG1, non-mono side info)
        let xing = 36;
        buffer[xing..xing + 4].copy_from_slice(b"Xing");
        buffer[xing + 4..xing + 8].copy_from_slice(&1u32.to_be_bytes()); // frames flag
        buffer[xing + 8..xing + 12].copy_from_slice(&3828u32.to_be_bytes());

        let info = parse_frame(&buffer, 0, 4_000_000).expect("valid frame");
        assert!(info.vbr);
        assert_eq!(info.frame_count, Some(3828));
        // 3828 frames * 1152 samples / 44100 Hz = ~100 seconds
        assert!((info.duration_secs().unwrap() - 100.0).abs() < 0.5);
        // Average bitrate: 4 MB over ~100s = ~320 kbps
        let avg = info.reported_bitrate();
        assert!((280_000..=360_000).contains(&avg), "avg was {avg}");
    }

    #[test]
    fn test_reserved_fields_rejected() {
        // Bad bitrate index (0xF)
        assert!(parse_frame(&[0xFF, 0xFB, 0xF0, 0x40], 0, 0).is_none());
        // Reserved sample rate index
        assert!(parse_frame(&[0xFF, 0xFB, 0x9C, 0x40], 0, 0).is_none());
        // Reserved layer
        assert!(parse_frame(&[0xFF, 0xF9, 0x90, 0x40], 0, 0).is_none());
    }

    #[test]
    fn test_id3v2_size_synchsafe() {
        let mut buffer = vec![0u8; 32];
        buffer[..3].copy_from_slice(b"ID3");
        buffer[3] = 4; // version
        buffer[6..10].copy_from_slice(&[0x00, 0x00, 0x02, 0x01]); // 0x101 = 257
        assert_eq!(id3v2_size(&buffer), 10 + 257);

        assert_eq!(id3v2_size(b"not an id3 tag"), 0);
    }

    #[test]
    fn test_scan_finds_offset_frame() {
        let temp = tempfile::TempDir::new().unwrap();
        let mp3 = temp.path().join("offset.mp3");
        let mut data = vec![0u8; 100];
        data.extend_from_slice(&cbr_frame_header());
        data.extend_from_slice(&[0u8; 400]);
        std::fs::write(&mp3, &data).unwrap();

        let info = read_mpeg_info(&mp3).unwrap().expect("frame should be found");
        assert_eq!(info.sample_rate, 44100);
    }

    #[test]
    fn test_non_mp3_extension_skipped() {
        let temp = tempfile::TempDir::new().unwrap();
        let wav = temp.path().join("not.wav");
        std::fs::write(&wav, b"RIFF").unwrap();

        assert!(Mp3Backend.extract(&wav).is_none());
    }
}
