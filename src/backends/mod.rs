//! Metadata extraction backends
//!
//! Six independent extractors behind one capability interface. Each backend
//! consumes a validated path and returns a partial record, or nothing at all:
//! a backend failure is logged at the failure site and never surfaces to the
//! caller or affects a sibling backend.
//!
//! The registry order is fixed and meaningful - during aggregation the first
//! backend to supply a non-sentinel value for a field wins.

pub mod container;
pub mod decoder;
pub mod ffprobe;
pub mod mediainfo;
pub mod mp3;
pub mod tags;

use crate::safety;
use crate::types::Record;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::warn;

/// One metadata extraction backend
pub trait Backend: Send + Sync {
    /// Backend name, used for the record's `Source` field and logging
    fn name(&self) -> &'static str;

    /// Extract a partial record from the file, or `None` on any failure.
    ///
    /// Implementations re-run the safety gate defensively, sanitize their own
    /// output, and swallow (but log) every internal error.
    fn extract(&self, path: &Path) -> Option<Record>;
}

/// All backends, in fixed precedence order
pub fn all() -> Vec<Box<dyn Backend>> {
    vec![
        Box::new(ffprobe::FfprobeBackend),
        Box::new(decoder::DecoderBackend),
        Box::new(tags::TagBackend),
        Box::new(container::ContainerBackend),
        Box::new(mp3::Mp3Backend),
        Box::new(mediainfo::MediainfoBackend),
    ]
}

/// Defensive safety re-check run by every backend before touching the file.
///
/// Returns the re-validated path, or `None` (logged) when the gate rejects it.
pub(crate) fn guard(backend: &str, path: &Path) -> Option<PathBuf> {
    match safety::ensure_safe(&path.to_string_lossy()) {
        Ok(safe) => Some(safe),
        Err(e) => {
            warn!("{} refused unsafe path {}: {}", backend, path.display(), e);
            None
        }
    }
}

/// Upper bound on a single external tool invocation
pub(crate) const TOOL_TIMEOUT: Duration = Duration::from_secs(10);

/// Run an external tool and capture stdout, killing it past the deadline.
///
/// External probes have bounded expected latency; the timeout keeps a hung
/// tool from stalling the whole backend chain.
pub(crate) fn run_tool(binary: &Path, args: &[&str], timeout: Duration) -> std::io::Result<String> {
    let mut child = Command::new(binary)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait()? {
            Some(status) => {
                let output = child.wait_with_output()?;
                if !status.success() {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    return Err(std::io::Error::other(format!(
                        "{} exited with {}: {}",
                        binary.display(),
                        status,
                        stderr.trim()
                    )));
                }
                return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
            }
            None => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        format!("{} timed out after {:?}", binary.display(), timeout),
                    ));
                }
                std::thread::sleep(Duration::from_millis(20));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_order_is_fixed() {
        let names: Vec<&str> = all().iter().map(|b| b.name()).collect();
        assert_eq!(
            names,
            vec!["FFprobe", "Decoder", "Tags", "Container", "MP3", "MediaInfo"]
        );
    }

    #[test]
    fn test_guard_rejects_outside_path() {
        // /etc is outside both the working directory and the temp root
        assert!(guard("test", Path::new("/etc/hostname")).is_none());
    }

    #[test]
    fn test_run_tool_captures_output() {
        let echo = which::which("echo").unwrap();
        let out = run_tool(&echo, &["hello"], TOOL_TIMEOUT).unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[test]
    fn test_run_tool_times_out() {
        let sleep = which::which("sleep").unwrap();
        let started = Instant::now();
        let result = run_tool(&sleep, &["5"], Duration::from_millis(200));
        assert!(result.is_err());
        assert!(started.elapsed() < Duration::from_secs(3));
    }
}
