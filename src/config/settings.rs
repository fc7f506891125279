//! Runtime configuration settings

use crate::export::OutputFormat;
use crate::types::Level;
use std::path::PathBuf;

/// Runtime settings for the extraction pipeline
#[derive(Debug, Clone)]
pub struct Settings {
    /// Explicit input files
    pub files: Vec<PathBuf>,
    /// Input directory to scan
    pub directory: Option<PathBuf>,
    /// Output directory
    pub output: PathBuf,
    /// Processing level
    pub level: Level,
    /// Output serialization format
    pub format: OutputFormat,
    /// Merge backend outputs into one record per file
    pub aggregate: bool,
    /// Scan recursively
    pub recursive: bool,
    /// Number of extraction worker threads
    pub analysis_threads: usize,
    /// Show progress bars
    pub show_progress: bool,
}

impl Settings {
    /// Create settings from CLI arguments
    pub fn from_cli(cli: &super::cli::Cli) -> Self {
        let total_cores = num_cpus::get();
        let default_threads = total_cores.saturating_sub(1).max(1);

        Self {
            files: cli.files.clone(),
            directory: cli.directory.clone(),
            output: cli.output.clone(),
            level: Level::from_int(cli.level),
            format: cli.format,
            aggregate: cli.aggregate,
            recursive: cli.recursive,
            analysis_threads: cli.threads.unwrap_or(default_threads),
            show_progress: !cli.quiet,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            directory: None,
            output: PathBuf::from("./output"),
            level: Level::Basic,
            format: OutputFormat::Json,
            aggregate: true,
            recursive: true,
            analysis_threads: num_cpus::get().saturating_sub(1).max(1),
            show_progress: true,
        }
    }
}
