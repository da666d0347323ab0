//! forensic-metadata - evidence hashing and metadata consolidation
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use forensic_metadata::config::{CliArgs, PipelineConfig};
use forensic_metadata::content::StreamingHasher;
use forensic_metadata::pipeline::{NoopObserver, Pipeline, RunSummary};
use forensic_metadata::probe::ExifToolProbe;
use forensic_metadata::progress::{print_header, print_summary, ProgressReporter};
use std::fs::OpenOptions;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Mutex;
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Validate and create config
    let config = PipelineConfig::from_args(args).context("Invalid configuration")?;

    // The log file lives in the output folder by default
    std::fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("Failed to create output directory '{}'", config.output_dir.display()))?;

    setup_logging(&config)?;

    // Fatal precondition: no tool, no run
    let probe = ExifToolProbe::locate(&config.tool_path, config.kind.probe_mode(), config.tool_timeout)
        .context("Metadata tool unavailable")?;
    info!(tool = %probe.tool_path().display(), "Using metadata tool");

    if config.show_progress {
        print_header(config.kind, &config.input_dir, probe.tool_path(), &config.output_dir);
    }

    let hasher = StreamingHasher::new();
    let pipeline = Pipeline::new(&config, &hasher, &probe);

    // Setup signal handler for graceful shutdown
    let shutdown_flag = pipeline.shutdown_flag();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, finishing current file...");
        shutdown_flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    // Create progress reporter
    let progress = if config.show_progress {
        Some(ProgressReporter::new())
    } else {
        None
    };

    if let Some(ref p) = progress {
        p.set_status("Enumerating files...");
    }

    let result = match progress {
        Some(ref p) => pipeline.run(p),
        None => pipeline.run(&NoopObserver),
    };

    // Finish progress before anything else hits the terminal
    let summary = match result {
        Ok(summary) => {
            if let Some(ref p) = progress {
                if summary.completed {
                    p.finish("Run completed");
                } else {
                    p.finish("Run interrupted");
                }
            }
            summary
        }
        Err(e) => {
            if let Some(ref p) = progress {
                p.finish_and_clear();
            }
            return Err(e).context("Pipeline failed");
        }
    };

    if config.show_progress {
        print_summary(&summary);
    }
    log_summary(&summary);

    Ok(())
}

fn log_summary(summary: &RunSummary) {
    if !summary.completed {
        warn!("Run was interrupted before completion");
    }

    info!(
        pipeline = summary.kind.name(),
        attempted = summary.files_attempted,
        produced = summary.records_produced,
        failed = summary.failure_count(),
        excluded = summary.excluded.len(),
        export_failures = summary.export_failures(),
        duration_secs = summary.duration.as_secs_f64(),
        "Run finished"
    );
}

fn setup_logging(config: &PipelineConfig) -> Result<()> {
    let level = if config.verbose {
        "forensic_metadata=debug,warn"
    } else {
        "forensic_metadata=info,warn"
    };

    // Keep the console quiet while the progress bar owns the terminal
    let console_filter = if config.show_progress {
        EnvFilter::new("warn")
    } else {
        EnvFilter::new(level)
    };

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)
        .with_context(|| format!("Failed to open log file '{}'", config.log_file.display()))?;

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact()
                .with_filter(console_filter),
        )
        .with(
            fmt::layer()
                .with_writer(Mutex::new(log_file))
                .with_ansi(false)
                .with_target(false)
                .with_filter(EnvFilter::new(level)),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(())
}
