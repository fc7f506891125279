//! CLI argument parsing and configuration

use crate::export::OutputFormat;
use clap::Parser;
use std::path::PathBuf;

/// tagprobe - Multi-backend audio metadata extraction
///
/// Queries several independent extraction backends for each audio file and
/// reconciles their output into one canonical record (or keeps them
/// per-backend). Outputs JSON, CSV/TSV, or plain text.
#[derive(Parser, Debug)]
#[command(name = "tagprobe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Audio files to process
    #[arg(long, value_name = "FILE", num_args = 1..)]
    pub files: Vec<PathBuf>,

    /// Directory containing audio files to process
    #[arg(short, long, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Output directory for metadata files
    #[arg(short, long, value_name = "DIR", default_value = "./output")]
    pub output: PathBuf,

    /// Processing level: 1 (basic), 2 (adds signal-derived descriptors)
    #[arg(short, long, default_value = "1")]
    #[arg(value_parser = clap::value_parser!(i64).range(1..=2))]
    pub level: i64,

    /// Output file format
    #[arg(short, long, value_enum, default_value = "json")]
    pub format: OutputFormat,

    /// Merge every backend's output into a single record per file
    #[arg(long, default_value = "false")]
    pub aggregate: bool,

    /// Scan subdirectories recursively
    #[arg(short, long, default_value = "true")]
    pub recursive: bool,

    /// Number of worker threads (defaults to CPU count - 1)
    #[arg(short = 'j', long, value_name = "N")]
    pub threads: Option<usize>,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress progress bars)
    #[arg(short, long, default_value = "false")]
    pub quiet: bool,
}
