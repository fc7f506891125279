//! Pipeline orchestration
//!
//! Coordinates input validation, parallel per-file extraction, and export.
//! Files are independent of one another: a rejected path or a failing
//! extraction is counted and logged, and the rest of the batch proceeds.

use crate::aggregate;
use crate::config::Settings;
use crate::discovery;
use crate::error::{Result, TagprobeError};
use crate::export;
use crate::safety;
use crate::types::Record;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, error, info, warn};

/// Pipeline result summary
#[derive(Debug)]
pub struct PipelineResult {
    pub total_files: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Path of the written output file, when any record was produced
    pub output_path: Option<PathBuf>,
}

/// Run the full extraction pipeline
pub fn run(settings: &Settings) -> Result<PipelineResult> {
    use std::time::Instant;

    let pipeline_start = Instant::now();

    configure_thread_pool(settings.analysis_threads)?;

    // Phase 1: collect and validate inputs
    let mut skipped_inputs = 0usize;
    let mut files: Vec<PathBuf> = Vec::new();

    for file in &settings.files {
        match safety::ensure_safe(&file.to_string_lossy()) {
            Ok(safe) if safety::is_audio_file(&safe) => files.push(safe),
            Ok(safe) => {
                warn!("Incorrect file format: {}", safe.display());
                skipped_inputs += 1;
            }
            Err(e) => {
                warn!("Skipping {}: {}", file.display(), e);
                skipped_inputs += 1;
            }
        }
    }

    if let Some(directory) = &settings.directory {
        files.extend(discovery::scan(directory, settings.recursive)?);
    }

    let total_files = files.len() + skipped_inputs;

    if files.is_empty() {
        warn!("Nothing to process");
        return Ok(PipelineResult {
            total_files,
            successful: 0,
            failed: 0,
            skipped: skipped_inputs,
            output_path: None,
        });
    }

    info!("Extracting metadata from {} files", files.len());

    // Phase 2: extraction
    let extraction_start = Instant::now();

    let progress_bar = if settings.show_progress {
        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        Some(pb)
    } else {
        None
    };

    let successful = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let skipped = AtomicUsize::new(skipped_inputs);

    let records: Vec<Record> = files
        .par_iter()
        .filter_map(|path| {
            let result = aggregate::extract(
                &path.to_string_lossy(),
                settings.level,
                settings.aggregate,
            );

            if let Some(ref pb) = progress_bar {
                pb.inc(1);
                pb.set_message(
                    path.file_name()
                        .unwrap_or_default()
                        .to_string_lossy()
                        .to_string(),
                );
            }

            match result {
                Ok(extraction) => {
                    successful.fetch_add(1, Ordering::Relaxed);
                    Some(extraction.into_records())
                }
                Err(e) if e.is_recoverable() => {
                    warn!("Skipping {}: {}", path.display(), e);
                    skipped.fetch_add(1, Ordering::Relaxed);
                    None
                }
                Err(e) => {
                    error!("Failed {}: {}", path.display(), e);
                    failed.fetch_add(1, Ordering::Relaxed);
                    None
                }
            }
        })
        .flatten()
        .collect();

    if let Some(pb) = progress_bar {
        pb.finish_with_message("Extraction complete");
    }

    info!(
        "Extraction completed in {:.2}s",
        extraction_start.elapsed().as_secs_f64()
    );

    // Phase 3: export
    let output_path = if records.is_empty() {
        None
    } else {
        Some(export::save_records(&records, &settings.output, settings.format)?)
    };

    info!(
        "Total pipeline time: {:.2}s",
        pipeline_start.elapsed().as_secs_f64()
    );

    Ok(PipelineResult {
        total_files,
        successful: successful.load(Ordering::Relaxed),
        failed: failed.load(Ordering::Relaxed),
        skipped: skipped.load(Ordering::Relaxed),
        output_path,
    })
}

/// Configure the Rayon thread pool
fn configure_thread_pool(num_threads: usize) -> Result<()> {
    match rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()
    {
        Ok(()) => {
            debug!("Configured thread pool with {} threads", num_threads);
        }
        Err(e) => {
            // If the pool is already initialized (e.g., in tests), that's OK
            if e.to_string().contains("already been initialized") {
                debug!("Thread pool already initialized, using existing pool");
            } else {
                return Err(TagprobeError::ConfigError(format!(
                    "Failed to configure thread pool: {}",
                    e
                )));
            }
        }
    }
    Ok(())
}
