//! Unified error types for tagprobe
//!
//! Error strategy:
//! - Per-file errors (unsafe path, unsupported format, decode): Recoverable,
//!   skip the file and continue the batch.
//! - System errors (output, configuration): Fatal, abort the batch.
//!
//! Individual backend failures never surface here at all: a failing backend
//! simply contributes nothing to the merged record.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for tagprobe operations
#[derive(Debug, Error)]
pub enum TagprobeError {
    // =========================================================================
    // Recoverable errors - skip file, continue batch
    // =========================================================================
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Path traversal detected in '{path}'")]
    PathTraversal { path: String },

    #[error("Path is too long ({length} characters, maximum 4096)")]
    PathTooLong { length: usize },

    #[error("Unsafe file path: '{path}' is outside the working directory and the temp root")]
    UnsafePath { path: PathBuf },

    #[error("Unsupported file format for '{path}': not a recognized audio type")]
    UnsupportedFormat { path: PathBuf },

    #[error("Failed to decode audio file '{path}': {reason}")]
    DecodeError { path: PathBuf, reason: String },

    #[error("File not found: '{0}'")]
    FileNotFound(PathBuf),

    // =========================================================================
    // Fatal errors - abort entire batch
    // =========================================================================
    #[error("Cannot write output to '{path}': {reason}")]
    OutputError { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for tagprobe operations
pub type Result<T> = std::result::Result<T, TagprobeError>;

impl TagprobeError {
    /// Returns true if this error is recoverable (should skip file, continue batch)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TagprobeError::InvalidInput(_)
                | TagprobeError::PathTraversal { .. }
                | TagprobeError::PathTooLong { .. }
                | TagprobeError::UnsafePath { .. }
                | TagprobeError::UnsupportedFormat { .. }
                | TagprobeError::DecodeError { .. }
                | TagprobeError::FileNotFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        let err = TagprobeError::UnsafePath {
            path: PathBuf::from("/etc/passwd"),
        };
        assert!(err.is_recoverable());

        let err = TagprobeError::OutputError {
            path: PathBuf::from("/out"),
            reason: "disk full".to_string(),
        };
        assert!(!err.is_recoverable());
    }
}
