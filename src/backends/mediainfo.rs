//! External media-analysis backend (mediainfo)
//!
//! Shells out to `mediainfo --Output=JSON` and maps the General and Audio
//! track sections into the schema. The binary is located on the search
//! path; its absence just skips this backend. The complete raw JSON is
//! retained under `Extra`.

use crate::backends::{guard, run_tool, Backend, TOOL_TIMEOUT};
use crate::sanitize::sanitize_record;
use crate::types::{Record, Value};
use std::path::Path;
use tracing::{debug, warn};

pub struct MediainfoBackend;

impl Backend for MediainfoBackend {
    fn name(&self) -> &'static str {
        "MediaInfo"
    }

    fn extract(&self, path: &Path) -> Option<Record> {
        let path = guard(self.name(), path)?;

        let binary = match which::which("mediainfo") {
            Ok(binary) => binary,
            Err(_) => {
                debug!("mediainfo not found on PATH, skipping backend");
                return None;
            }
        };

        let output = run_tool(
            &binary,
            &["--Output=JSON", &path.to_string_lossy()],
            TOOL_TIMEOUT,
        )
        .map_err(|e| warn!("mediainfo failed for {}: {}", path.display(), e))
        .ok()?;

        let json: serde_json::Value = serde_json::from_str(&output)
            .map_err(|e| {
                warn!("mediainfo produced malformed JSON for {}: {}", path.display(), e)
            })
            .ok()?;

        let tracks = json.get("media")?.get("track")?.as_array()?;
        let general = find_track(tracks, "General")?;
        let audio = find_track(tracks, "Audio").unwrap_or(general);

        let mut geolocation = Record::new();
        geolocation.insert("Latitude", field(general, "Location_Latitude"));
        geolocation.insert("Longitude", field(general, "Location_Longitude"));

        let mut device = Record::new();
        device.insert("Encoder", field(general, "Encoded_Library/String"));
        device.insert("Software", field(general, "Encoded_Application"));

        let mut info = Record::new();
        info.insert("Format", field(general, "Format"));
        info.insert("Sample Rate", field(audio, "SamplingRate"));
        info.insert("Bit Rate", field(audio, "BitRate"));
        info.insert("Encoding", field(audio, "Format_Settings_Mode"));
        info.insert("Channels", field(audio, "Channels"));
        info.insert("Bit Depth", field(audio, "BitDepth"));
        info.insert("Duration", field(general, "Duration"));

        let mut record = Record::new();
        record.insert("Source", self.name());
        record.insert("Title", field(general, "Title"));
        record.insert("Artist", field(general, "Performer"));
        record.insert("Album", field(general, "Album"));
        record.insert("Year", field(general, "Recorded_Date"));
        record.insert("Genre", field(general, "Genre"));
        record.insert("Track Number", field(general, "Track_Position"));
        record.insert("Disc Number", field(general, "Part"));
        record.insert("Composer", field(general, "Composer"));
        record.insert("Conductor", field(general, "Conductor"));
        record.insert("Lyrics", field(general, "Lyrics"));
        record.insert("Language", field(general, "Language"));
        record.insert("Geolocation", Value::Map(geolocation));
        record.insert("Device Information", Value::Map(device));
        record.insert("Info", Value::Map(info));
        record.insert("Extra", Value::from_json(&json));

        sanitize_record(&mut record);
        Some(record)
    }
}

/// Select a track section by its `@type` tag
fn find_track<'a>(
    tracks: &'a [serde_json::Value],
    kind: &str,
) -> Option<&'a serde_json::Value> {
    tracks
        .iter()
        .find(|t| t.get("@type").and_then(|v| v.as_str()) == Some(kind))
}

/// A section field as a record value, sentinel when absent.
///
/// mediainfo reports most numerics as JSON strings; they are carried through
/// as text, the merge layer treats all scalars alike.
fn field(section: &serde_json::Value, key: &str) -> Value {
    match section.get(key) {
        Some(value) => Value::from_json(value),
        None => Value::unknown(),
    }
}
