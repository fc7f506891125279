//! Path and file-type safety gate
//!
//! Every filesystem- or subprocess-touching operation goes through this
//! module first: paths are canonicalized and checked for traversal, length,
//! and containment; candidate files are checked against a fixed audio
//! MIME allow-list (extension guess, settled by magic-byte sniffing).
//!
//! Containment is a component-prefix comparison, never a string-prefix
//! comparison, so `/safe/basedir2` can never pass for base `/safe/base`.

use crate::error::{Result, TagprobeError};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Allowed audio MIME types, including vendor-prefixed variants
pub const SUPPORTED_MIME_TYPES: &[&str] = &[
    "audio/mpeg",   // .mp3
    "audio/x-mpeg", // .mp3
    "audio/wav",    // .wav
    "audio/x-wav",  // .wav
    "audio/aac",    // .aac
    "audio/x-aac",  // .aac
    "audio/ogg",    // .ogg
    "audio/vorbis", // .ogg
    "audio/flac",   // .flac
    "audio/x-flac", // .flac
    "audio/aiff",   // .aiff
    "audio/x-aiff", // .aiff
    "audio/m4a",    // .m4a
    "audio/x-m4a",  // .m4a
];

/// Maximum canonical path length, in characters
const MAX_PATH_LENGTH: usize = 4096;

/// Environment variable naming the secondary allowed root (temp directory)
const TEMP_DIR_ENV: &str = "TMP";

/// Canonicalize and validate an untrusted path string.
///
/// Fails with `InvalidInput` on an empty argument, `PathTraversal` if any
/// component is literally `..` (checked on the raw input and, as a
/// defense-in-depth measure, again after resolution), and `PathTooLong` if
/// the canonical form exceeds 4096 characters.
pub fn sanitize_path(path: &str) -> Result<PathBuf> {
    if path.is_empty() {
        return Err(TagprobeError::InvalidInput(
            "path must be a non-empty string".to_string(),
        ));
    }

    if contains_traversal(Path::new(path)) {
        return Err(TagprobeError::PathTraversal {
            path: path.to_string(),
        });
    }

    let resolved = resolve(Path::new(path))?;

    let length = resolved.to_string_lossy().chars().count();
    if length > MAX_PATH_LENGTH {
        return Err(TagprobeError::PathTooLong { length });
    }

    // Impossible after resolution; kept as a defense-in-depth check.
    if contains_traversal(&resolved) {
        return Err(TagprobeError::PathTraversal {
            path: resolved.to_string_lossy().to_string(),
        });
    }

    Ok(resolved)
}

/// Check whether `path` lies within `base_dir` or the system temp root,
/// following symlinks on both sides.
pub fn is_safe_path(base_dir: &Path, path: &Path) -> Result<bool> {
    is_safe_path_opts(base_dir, path, true)
}

/// Containment check with explicit symlink behavior.
///
/// With `follow_symlinks` the fully resolved forms are compared; without it
/// the pre-resolution absolute forms are compared instead.
pub fn is_safe_path_opts(base_dir: &Path, path: &Path, follow_symlinks: bool) -> Result<bool> {
    let (base, target) = if follow_symlinks {
        (resolve(base_dir)?, resolve(path)?)
    } else {
        (absolute(base_dir)?, absolute(path)?)
    };

    // Path::starts_with compares whole components, not string prefixes.
    if target.starts_with(&base) {
        return Ok(true);
    }

    if let Ok(temp_root) = temp_root() {
        if target.starts_with(&temp_root) {
            return Ok(true);
        }
    }

    Ok(false)
}

/// Sanitize a path and require it to be inside the process working directory
/// (or the temp root). This is the combined check every component runs
/// before touching the filesystem.
pub fn ensure_safe(path: &str) -> Result<PathBuf> {
    let sanitized = sanitize_path(path)?;
    let cwd = std::env::current_dir()?;
    if !is_safe_path(&cwd, &sanitized)? {
        return Err(TagprobeError::UnsafePath { path: sanitized });
    }
    Ok(sanitized)
}

/// Check whether a file is an allowed audio type.
///
/// The extension-derived MIME type is consulted first. When it is absent or
/// not an `audio/*` type, the file's magic bytes decide alone; when the
/// extension does claim audio, the magic bytes must confirm it, so a
/// renamed non-audio file cannot ride in on its extension. The resolved
/// type must be on the fixed allow-list either way.
pub fn is_audio_file(path: &Path) -> bool {
    let guessed = mime_from_extension(path).filter(|m| m.starts_with("audio"));
    let sniffed = sniff_mime(path);

    let mime = match (guessed, sniffed) {
        (Some(_), confirmed) => confirmed,
        (None, sniffed) => sniffed,
    };

    mime.map_or(false, |m| SUPPORTED_MIME_TYPES.contains(&m))
}

/// MIME type detected from the file's magic bytes
fn sniff_mime(path: &Path) -> Option<&'static str> {
    match infer::get_from_path(path) {
        Ok(Some(kind)) => Some(kind.mime_type()),
        Ok(None) => None,
        Err(e) => {
            debug!("Content sniffing failed for {}: {}", path.display(), e);
            None
        }
    }
}

/// MIME type guessed from the file extension alone
fn mime_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "mp3" => Some("audio/mpeg"),
        "wav" => Some("audio/x-wav"),
        "aac" => Some("audio/aac"),
        "ogg" | "oga" => Some("audio/ogg"),
        "flac" => Some("audio/flac"),
        "aiff" | "aif" => Some("audio/x-aiff"),
        "m4a" => Some("audio/m4a"),
        _ => None,
    }
}

fn contains_traversal(path: &Path) -> bool {
    path.components()
        .any(|c| matches!(c, Component::ParentDir))
}

/// Resolve to an absolute, symlink-free path.
///
/// `std::fs::canonicalize` requires the full path to exist; for paths that
/// do not exist yet (output directories, rejected siblings in tests) the
/// deepest existing ancestor is canonicalized and the remaining components
/// are appended unchanged.
fn resolve(path: &Path) -> Result<PathBuf> {
    if let Ok(canonical) = std::fs::canonicalize(path) {
        return Ok(canonical);
    }

    let absolute = absolute(path)?;
    let mut base = absolute.clone();
    let mut tail: Vec<std::ffi::OsString> = Vec::new();

    loop {
        if let Ok(canonical) = std::fs::canonicalize(&base) {
            let mut resolved = canonical;
            for part in tail.iter().rev() {
                resolved.push(part);
            }
            return Ok(resolved);
        }
        match (base.parent(), base.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                base = parent.to_path_buf();
            }
            _ => return Ok(absolute),
        }
    }
}

/// Absolute form without symlink resolution
fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// The process-wide secondary allowed root, from the environment.
/// Defaults to the system temp directory (`/tmp` on a stock Linux setup).
fn temp_root() -> Result<PathBuf> {
    let raw = std::env::var(TEMP_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::temp_dir());
    resolve(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_path_rejected() {
        assert!(matches!(
            sanitize_path(""),
            Err(TagprobeError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_traversal_rejected() {
        assert!(matches!(
            sanitize_path("../../etc/passwd"),
            Err(TagprobeError::PathTraversal { .. })
        ));
        assert!(matches!(
            sanitize_path("/safe/base/../../etc/passwd"),
            Err(TagprobeError::PathTraversal { .. })
        ));
    }

    #[test]
    fn test_overlong_path_rejected() {
        let long = format!("/{}", "a/".repeat(3000));
        assert!(matches!(
            sanitize_path(&long),
            Err(TagprobeError::PathTooLong { .. })
        ));
    }

    #[test]
    fn test_sanitize_resolves_existing_path() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("track.mp3");
        std::fs::write(&file, b"x").unwrap();

        let resolved = sanitize_path(&file.to_string_lossy()).unwrap();
        assert!(resolved.is_absolute());
        assert_eq!(resolved, file.canonicalize().unwrap());
    }

    #[test]
    fn test_sibling_directory_rejected() {
        // A component-prefix comparison must not treat /safe/base2 as being
        // inside /safe/base.
        assert!(!is_safe_path(Path::new("/safe/base"), Path::new("/safe/base2/x")).unwrap());
        assert!(is_safe_path(Path::new("/safe/base"), Path::new("/safe/base/x")).unwrap());
    }

    #[test]
    fn test_temp_root_allowed() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("inside.wav");
        std::fs::write(&file, b"x").unwrap();

        // TempDir lives under the system temp root, which is the secondary
        // allowed prefix even when the base directory does not contain it.
        assert!(is_safe_path(Path::new("/nonexistent/base"), &file).unwrap());
    }

    #[test]
    fn test_no_follow_compares_unresolved_forms() {
        let temp = TempDir::new().unwrap();
        let sub = temp.path().join("sub");
        std::fs::create_dir(&sub).unwrap();

        let ok = is_safe_path_opts(temp.path(), &sub.join("file"), false).unwrap();
        assert!(ok);
        let outside = is_safe_path_opts(&sub, Path::new("/outside/elsewhere"), false).unwrap();
        assert!(!outside);
    }

    #[test]
    fn test_mp3_with_correct_magic_passes() {
        let temp = TempDir::new().unwrap();
        let mp3 = temp.path().join("track.mp3");
        std::fs::write(&mp3, b"ID3\x04\x00\x00\x00\x00\x00\x00").unwrap();
        assert!(is_audio_file(&mp3));
    }

    #[test]
    fn test_renamed_text_file_rejected() {
        let temp = TempDir::new().unwrap();
        // Text content behind an .mp3 extension: the magic bytes do not
        // confirm the extension's claim, so the gate rejects it.
        let fake = temp.path().join("notes.mp3");
        std::fs::write(&fake, b"just some plain text, no audio magic").unwrap();
        assert!(!is_audio_file(&fake));
    }

    #[test]
    fn test_wav_magic_sniffed() {
        let temp = TempDir::new().unwrap();
        // Unknown extension, real RIFF/WAVE magic: sniffing should accept it.
        let wav = temp.path().join("capture.dat");
        let mut header = Vec::new();
        header.extend_from_slice(b"RIFF");
        header.extend_from_slice(&36u32.to_le_bytes());
        header.extend_from_slice(b"WAVE");
        header.extend_from_slice(b"fmt ");
        std::fs::write(&wav, &header).unwrap();
        assert!(is_audio_file(&wav));
    }
}
