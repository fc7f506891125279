//! tagprobe - Multi-Backend Audio Metadata Extraction & Reconciliation
//!
//! A command-line utility that queries several independent extraction
//! backends for each audio file and reconciles their partial, possibly
//! conflicting outputs into one canonical record.
//!
//! # Architecture
//!
//! The library is organized into several key modules:
//!
//! - `safety`: path canonicalization, containment, and audio-type gate
//! - `record`: skeleton record with filesystem-derived facts
//! - `backends`: six extraction backends behind one capability interface
//! - `aggregate`: order-sensitive first-known-value-wins merge
//! - `features`: level-2 signal-derived descriptors (with failure isolation)
//! - `sanitize`: string neutralization applied to every backend's output
//! - `discovery`, `pipeline`, `export`, `config`: batch processing plumbing
//!
//! # Example
//!
//! ```no_run
//! use tagprobe::{aggregate, types::Level};
//!
//! let extraction = aggregate::extract("track.mp3", Level::Basic, true)
//!     .expect("Extraction failed");
//! for record in extraction.into_records() {
//!     println!("{}", serde_json::to_string_pretty(&record).unwrap());
//! }
//! ```

pub mod aggregate;
pub mod audio;
pub mod backends;
pub mod config;
pub mod discovery;
pub mod error;
pub mod export;
pub mod features;
pub mod pipeline;
pub mod record;
pub mod safety;
pub mod sanitize;
pub mod types;

// Re-export key types at crate root
pub use error::{Result, TagprobeError};
pub use types::{Extraction, Level, Record, Value};
