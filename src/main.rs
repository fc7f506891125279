//! tagprobe CLI entry point

use clap::Parser;
use std::process::ExitCode;
use tagprobe::config::{Cli, Settings};
use tagprobe::pipeline;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    init_logging(&cli);

    // Validate inputs
    if let Err(e) = validate_inputs(&cli) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    // Build settings from CLI
    let settings = Settings::from_cli(&cli);

    // Run the pipeline
    match pipeline::run(&settings) {
        Ok(result) => {
            println!();
            println!(
                "Summary: {} successful, {} failed, {} skipped (of {} total)",
                result.successful, result.failed, result.skipped, result.total_files
            );
            if let Some(path) = result.output_path {
                println!("Metadata saved to {}", path.display());
            }

            if result.failed > 0 {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("Fatal error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli) {
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = if cli.quiet { "error" } else { filter };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();
}

fn validate_inputs(cli: &Cli) -> Result<(), String> {
    if cli.files.is_empty() && cli.directory.is_none() {
        return Err(
            "No files or directory specified.\n\n  Examples:\n    tagprobe --files track.mp3 -o ./output\n    tagprobe -d ~/Music -o ./output --aggregate --level 2"
                .to_string(),
        );
    }

    if let Some(directory) = &cli.directory {
        if !directory.is_dir() {
            return Err(format!(
                "Invalid directory path: {}\n\n  Tip: Check the path exists and is accessible.",
                directory.display()
            ));
        }
    }

    for file in &cli.files {
        if !file.is_file() {
            return Err(format!(
                "Invalid file path: {}\n\n  Tip: Check the path exists and is accessible.",
                file.display()
            ));
        }
    }

    Ok(())
}
