//! Progress reporting for pipeline runs
//!
//! Provides a per-file progress bar using indicatif, plus the header and
//! summary printed around a run.

use crate::config::PipelineKind;
use crate::pipeline::{BatchObserver, RunSummary};
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

/// Progress reporter that advances once per attempted file
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);

        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .progress_chars("=> ");
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Set a status message
    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    /// Finish the progress display with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    /// Finish and clear the progress display
    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchObserver for ProgressReporter {
    fn batch_started(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_message("Processing files...");
    }

    fn file_finished(&self, file: &str, _built: bool) {
        self.bar.inc(1);
        self.bar.set_message(file.to_string());
    }
}

/// Format a number with thousands separators
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| chunk.iter().rev().map(|&b| b as char).collect::<String>())
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Print a header at the start of a run
pub fn print_header(kind: PipelineKind, input: &Path, tool: &Path, output: &Path) {
    println!();
    println!(
        "{} {} ({})",
        style("forensic-metadata").cyan().bold(),
        env!("CARGO_PKG_VERSION"),
        kind.name()
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Input:").bold(), input.display());
    println!("  {} {}", style("ExifTool:").bold(), tool.display());
    println!("  {} {}", style("Output:").bold(), output.display());
    println!();
}

/// Print a summary of the run
pub fn print_summary(summary: &RunSummary) {
    let duration_secs = summary.duration.as_secs_f64();
    let rate = if duration_secs > 0.0 {
        summary.files_attempted as f64 / duration_secs
    } else {
        0.0
    };

    println!();
    if summary.completed {
        println!("{}", style("Run Complete").green().bold());
    } else {
        println!("{}", style("Run Interrupted").yellow().bold());
    }
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "  {} {}",
        style("Files attempted:").bold(),
        format_number(summary.files_attempted as u64)
    );
    println!(
        "  {} {}",
        style("Records produced:").bold(),
        format_number(summary.records_produced as u64)
    );
    println!(
        "  {} {}",
        style("Total Size:").bold(),
        format_size(summary.bytes_attempted, BINARY)
    );
    println!(
        "  {} {:.1}s ({:.1} files/sec)",
        style("Duration:").bold(),
        duration_secs,
        rate
    );
    if !summary.excluded.is_empty() {
        println!(
            "  {} {}",
            style("Without geolocation:").bold(),
            format_number(summary.excluded.len() as u64)
        );
    }
    if summary.failure_count() > 0 {
        println!(
            "  {} {} (see log)",
            style("Failed files:").yellow().bold(),
            format_number(summary.failure_count() as u64)
        );
    }
    if summary.export_failures() > 0 {
        println!(
            "  {} {} (see log)",
            style("Failed exports:").red().bold(),
            summary.export_failures()
        );
    }
    println!("  {} {}", style("Output:").bold(), summary.output_dir.display());
    for path in summary.written_paths() {
        let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        println!("    {} ({})", name, format_size(size, BINARY));
    }
    println!();
}
