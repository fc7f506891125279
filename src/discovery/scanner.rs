//! File discovery and scanning
//!
//! Walks a directory (or accepts a single file) and keeps only entries that
//! pass the safety gate and the audio-type check. A rejected entry is logged
//! and skipped; it never aborts the walk.

use crate::error::{Result, TagprobeError};
use crate::safety;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Scan a path (file or directory) for audio files
pub fn scan(input: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let input = safety::ensure_safe(&input.to_string_lossy())?;

    if !input.exists() {
        return Err(TagprobeError::FileNotFound(input));
    }

    let mut files = Vec::new();

    if input.is_file() {
        // Single file mode
        if safety::is_audio_file(&input) {
            files.push(input.clone());
        } else {
            return Err(TagprobeError::UnsupportedFormat { path: input });
        }
    } else if input.is_dir() {
        // Directory mode
        let walker = if recursive {
            WalkDir::new(&input)
        } else {
            WalkDir::new(&input).max_depth(1)
        };

        for entry in walker.into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            match safety::ensure_safe(&path.to_string_lossy()) {
                Ok(safe) => {
                    if safety::is_audio_file(&safe) {
                        debug!("Discovered: {}", safe.display());
                        files.push(safe);
                    } else {
                        warn!("Incorrect file format: {}", safe.display());
                    }
                }
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                }
            }
        }
    }

    info!("Discovered {} audio files", files.len());

    if files.is_empty() {
        warn!("No supported audio files found in {}", input.display());
    }

    Ok(files)
}
