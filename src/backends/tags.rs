//! Rich tag reader backend (lofty)
//!
//! Reads ID3v2, Vorbis comments, MP4 atoms and the other tag formats lofty
//! understands, plus stream properties. This is the primary source for
//! descriptive fields: title, artist, album, credits, lyrics, geolocation
//! and encoder tags.

use crate::backends::{guard, Backend};
use crate::sanitize::sanitize_record;
use crate::types::{Record, Value};
use lofty::file::{AudioFile, FileType, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey};
use std::path::Path;
use tracing::{debug, warn};

pub struct TagBackend;

impl Backend for TagBackend {
    fn name(&self) -> &'static str {
        "Tags"
    }

    fn extract(&self, path: &Path) -> Option<Record> {
        let path = guard(self.name(), path)?;

        let tagged_file = Probe::open(&path)
            .and_then(|probe| probe.read())
            .map_err(|e| warn!("Tag read failed for {}: {}", path.display(), e))
            .ok()?;

        let tag = tagged_file.primary_tag().or_else(|| tagged_file.first_tag());

        let mut record = Record::new();
        record.insert("Source", self.name());

        if let Some(tag) = tag {
            record.insert("Title", text_or_unknown(tag.title().as_deref()));
            record.insert("Artist", text_or_unknown(tag.artist().as_deref()));
            record.insert("Album", text_or_unknown(tag.album().as_deref()));
            record.insert(
                "Year",
                tag.year().map(Value::from).unwrap_or_else(Value::unknown),
            );
            record.insert("Genre", text_or_unknown(tag.genre().as_deref()));
            record.insert(
                "Track Number",
                tag.track().map(Value::from).unwrap_or_else(Value::unknown),
            );
            record.insert(
                "Disc Number",
                tag.disk().map(Value::from).unwrap_or_else(Value::unknown),
            );
            record.insert("Composer", item_or_unknown(tag, &ItemKey::Composer));
            record.insert("Conductor", item_or_unknown(tag, &ItemKey::Conductor));
            record.insert("Lyrics", item_or_unknown(tag, &ItemKey::Lyrics));
            record.insert("Language", item_or_unknown(tag, &ItemKey::Language));

            let mut geolocation = Record::new();
            geolocation.insert(
                "Latitude",
                item_or_unknown(tag, &ItemKey::Unknown("GEO_LAT".to_string())),
            );
            geolocation.insert(
                "Longitude",
                item_or_unknown(tag, &ItemKey::Unknown("GEO_LON".to_string())),
            );
            record.insert("Geolocation", Value::Map(geolocation));

            let mut device = Record::new();
            device.insert("Encoder", item_or_unknown(tag, &ItemKey::EncodedBy));
            device.insert("Software", item_or_unknown(tag, &ItemKey::EncoderSoftware));
            record.insert("Device Information", Value::Map(device));
        } else {
            debug!("No tags found in {}", path.display());
        }

        let properties = tagged_file.properties();

        let mut info = Record::new();
        info.insert("Format", format_name(tagged_file.file_type()));
        info.insert(
            "Sample Rate",
            properties.sample_rate().map(Value::from).unwrap_or_else(Value::unknown),
        );
        info.insert(
            "Bit Rate",
            // lofty reports kbps; the record uses bits per second throughout
            properties
                .audio_bitrate()
                .map(|kbps| Value::Integer(kbps as i64 * 1000))
                .unwrap_or_else(Value::unknown),
        );
        info.insert(
            "Channels",
            properties
                .channels()
                .map(|c| Value::Integer(c as i64))
                .unwrap_or_else(Value::unknown),
        );
        info.insert(
            "Bit Depth",
            properties
                .bit_depth()
                .map(|b| Value::Integer(b as i64))
                .unwrap_or_else(Value::unknown),
        );
        info.insert("Duration", Value::Float(properties.duration().as_secs_f64()));
        record.insert("Info", Value::Map(info));

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

fn item_or_unknown(tag: &lofty::tag::Tag, key: &ItemKey) -> Value {
    text_or_unknown(tag.get_string(key))
}

fn format_name(file_type: FileType) -> Value {
    let name = match file_type {
        FileType::Mpeg => "MP3",
        FileType::Wav => "WAV",
        FileType::Flac => "FLAC",
        FileType::Aiff => "AIFF",
        FileType::Mp4 => "MP4",
        FileType::Vorbis => "OGG",
        FileType::Opus => "OPUS",
        FileType::Speex => "SPEEX",
        FileType::Ape => "APE",
        FileType::WavPack => "WAVPACK",
        _ => return Value::unknown(),
    };
    Value::Text(name.to_string())
}
