//! Configuration types for forensic-metadata
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation
//! - Output format selection

use crate::error::ConfigError;
use crate::probe::ProbeMode;
use clap::{Args, Parser, Subcommand, ValueEnum};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default per-file timeout for the metadata tool, in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Host label used when the host name cannot be determined
const UNKNOWN_HOST: &str = "unknown-host";

/// Default log file name inside the output directory
pub const LOG_FILE_NAME: &str = "forensic_metadata.log";

/// Forensic metadata extraction with hashing and multi-format export
#[derive(Parser, Debug, Clone)]
#[command(
    name = "forensic-metadata",
    version,
    about = "Hash evidence files, consolidate ExifTool metadata and export it",
    long_about = "Processes every regular file directly inside a folder: computes MD5, SHA-1 and SHA-256,\n\
                  extracts metadata with ExifTool, and exports the consolidated records as JSON, CSV,\n\
                  a text report and SQLite.\n\n\
                  The 'geo' command keeps only ExifTool's Geolocation* fields.",
    after_help = "EXAMPLES:\n    \
        forensic-metadata metadata ./Jpg_folder\n    \
        forensic-metadata metadata ./Jpg_folder --exiftool /opt/exiftool/exiftool -f document -f relational\n    \
        forensic-metadata geo ./Jpg_folder -o ./case_42/geo --source-device workstation-7"
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Hash every file and export full consolidated metadata plus a hash database
    Metadata(RunArgs),

    /// Export the geolocation fields of every file that has them
    Geo(RunArgs),
}

/// Options shared by every pipeline
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Folder containing the evidence files (not searched recursively)
    #[arg(value_name = "INPUT_DIR")]
    pub input_dir: PathBuf,

    /// ExifTool executable (a bare name is looked up on PATH)
    #[arg(long, env = "EXIFTOOL_PATH", default_value = "exiftool", value_name = "PATH")]
    pub exiftool: PathBuf,

    /// Output folder (default: a subfolder of INPUT_DIR)
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output formats to produce (can be repeated; default: all)
    #[arg(short = 'f', long = "format", value_enum, value_name = "FORMAT", action = clap::ArgAction::Append)]
    pub formats: Vec<OutputFormat>,

    /// Label recorded as the source device (default: host name)
    #[arg(long, value_name = "LABEL")]
    pub source_device: Option<String>,

    /// Seconds to wait for ExifTool per file, 0 to wait forever
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS, value_name = "SECS")]
    pub timeout: u64,

    /// Skip file names matching pattern (can be repeated)
    #[arg(long = "exclude", value_name = "PATTERN", action = clap::ArgAction::Append)]
    pub exclude_patterns: Vec<String>,

    /// Log file (default: forensic_metadata.log in the output folder)
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose logging
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Persistent output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum)]
pub enum OutputFormat {
    /// JSON document (.json)
    Document,
    /// CSV table (.csv)
    Tabular,
    /// Human-readable text report (.txt)
    FlatText,
    /// SQLite database (.db)
    Relational,
}

impl OutputFormat {
    /// Every format, in export order
    pub const ALL: [OutputFormat; 4] = [
        OutputFormat::Document,
        OutputFormat::Tabular,
        OutputFormat::FlatText,
        OutputFormat::Relational,
    ];

    /// File extension without the dot
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Document => "json",
            OutputFormat::Tabular => "csv",
            OutputFormat::FlatText => "txt",
            OutputFormat::Relational => "db",
        }
    }

    /// Display name
    pub fn name(self) -> &'static str {
        match self {
            OutputFormat::Document => "JSON",
            OutputFormat::Tabular => "CSV",
            OutputFormat::FlatText => "text",
            OutputFormat::Relational => "SQLite",
        }
    }
}

/// Which pipeline to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineKind {
    /// Full metadata consolidation plus hash database
    Metadata,
    /// Geolocation fields only
    Geo,
}

impl PipelineKind {
    /// Output subfolder created inside the input folder by default
    pub fn default_output_subdir(self) -> &'static str {
        match self {
            PipelineKind::Metadata => "Forensic_metadata_output",
            PipelineKind::Geo => "Geolocation_data_output",
        }
    }

    /// Tag set requested from the metadata tool
    pub fn probe_mode(self) -> ProbeMode {
        match self {
            PipelineKind::Metadata => ProbeMode::Full,
            PipelineKind::Geo => ProbeMode::Geolocation,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PipelineKind::Metadata => "metadata",
            PipelineKind::Geo => "geolocation",
        }
    }
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Pipeline to run
    pub kind: PipelineKind,

    /// Folder whose direct children are processed
    pub input_dir: PathBuf,

    /// Metadata tool executable as configured
    pub tool_path: PathBuf,

    /// Output folder
    pub output_dir: PathBuf,

    /// Requested formats, sorted and deduplicated
    pub formats: Vec<OutputFormat>,

    /// Source device label stamped on every record
    pub source_device: String,

    /// Per-file tool deadline
    pub tool_timeout: Option<Duration>,

    /// Compiled exclude patterns (matched against file names)
    pub exclude_patterns: Vec<Regex>,

    /// Log file path
    pub log_file: PathBuf,

    /// Show progress bar, header and summary
    pub show_progress: bool,

    /// Verbose logging
    pub verbose: bool,
}

impl PipelineConfig {
    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        let (kind, args) = match args.command {
            Command::Metadata(args) => (PipelineKind::Metadata, args),
            Command::Geo(args) => (PipelineKind::Geo, args),
        };
        Self::from_run_args(kind, args)
    }

    /// Create and validate configuration for one pipeline
    pub fn from_run_args(kind: PipelineKind, args: RunArgs) -> Result<Self, ConfigError> {
        if !args.input_dir.is_dir() {
            return Err(ConfigError::InvalidInputDir {
                path: args.input_dir.clone(),
                reason: if args.input_dir.exists() {
                    "not a directory".to_string()
                } else {
                    "does not exist".to_string()
                },
            });
        }

        let output_dir = args
            .output_dir
            .unwrap_or_else(|| args.input_dir.join(kind.default_output_subdir()));
        if output_dir.exists() && !output_dir.is_dir() {
            return Err(ConfigError::InvalidOutputDir {
                path: output_dir,
                reason: "exists and is not a directory".to_string(),
            });
        }
        // Outputs written straight into the input folder would be picked up
        // as evidence on the next run
        if is_same_dir(&output_dir, &args.input_dir) {
            return Err(ConfigError::InvalidOutputDir {
                path: output_dir,
                reason: "must not be the input directory".to_string(),
            });
        }

        let mut formats = if args.formats.is_empty() {
            OutputFormat::ALL.to_vec()
        } else {
            args.formats
        };
        formats.sort();
        formats.dedup();
        if formats.is_empty() {
            return Err(ConfigError::NoFormats);
        }

        let exclude_patterns = args
            .exclude_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| ConfigError::InvalidExcludePattern {
                    pattern: p.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let source_device = args
            .source_device
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(default_source_device);

        let log_file = args
            .log_file
            .unwrap_or_else(|| output_dir.join(LOG_FILE_NAME));
        if is_same_dir(parent_dir(&log_file), &args.input_dir) {
            return Err(ConfigError::InvalidLogFile {
                path: log_file,
                reason: "must not be inside the input directory".to_string(),
            });
        }

        Ok(Self {
            kind,
            input_dir: args.input_dir,
            tool_path: args.exiftool,
            output_dir,
            formats,
            source_device,
            tool_timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
            exclude_patterns,
            log_file,
            show_progress: !args.quiet,
            verbose: args.verbose,
        })
    }
}

/// Check whether two paths name the same existing directory
fn is_same_dir(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// Host name of this machine, used as the default source device
pub fn default_source_device() -> String {
    sysinfo::System::host_name()
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| UNKNOWN_HOST.to_string())
}
