//! Error types for forensic-metadata
//!
//! This module defines the error hierarchy for the pipeline:
//! - Per-file errors (hashing, probing, record consolidation)
//! - Per-format export errors
//! - Configuration errors
//! - Fatal pipeline errors (tool unavailable, unreadable input)
//!
//! Only [`PipelineError`] ever aborts a run. Per-file and per-format errors
//! are logged and collected into the run summary instead of propagating.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Top-level error type: the only errors that abort a run
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The metadata tool could not be located (fatal precondition)
    #[error("Metadata tool unavailable: {0}")]
    ToolUnavailable(ProbeError),

    /// The input directory could not be listed
    #[error("Failed to read input directory '{path}': {source}")]
    InputDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The output directory could not be created
    #[error("Failed to create output directory '{path}': {source}")]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Failure while streaming a file through the digest set
#[derive(Error, Debug)]
pub enum HashError {
    #[error("Failed to hash '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl HashError {
    /// Path of the file that could not be hashed
    pub fn path(&self) -> &std::path::Path {
        match self {
            HashError::Io { path, .. } => path,
        }
    }
}

/// Errors from the external metadata tool
#[derive(Error, Debug)]
pub enum ProbeError {
    /// Tool is not present at the configured location
    #[error("Metadata tool not found at '{path}'")]
    ToolNotFound { path: PathBuf },

    /// Tool could not be started
    #[error("Failed to start '{tool}': {source}")]
    Spawn {
        tool: PathBuf,
        source: std::io::Error,
    },

    /// Tool exited with a failure status
    #[error("Metadata tool failed on '{file}' ({status}): {stderr}")]
    ToolFailed {
        file: PathBuf,
        status: String,
        stderr: String,
    },

    /// Tool did not finish within the configured timeout
    #[error("Metadata tool timed out after {}s on '{file}'", .timeout.as_secs_f64())]
    Timeout { file: PathBuf, timeout: Duration },

    /// Tool output could not be interpreted
    #[error("Malformed metadata for '{file}': {reason}")]
    MalformedOutput { file: PathBuf, reason: String },

    /// I/O error while talking to the tool
    #[error("I/O error while probing '{file}': {source}")]
    Io {
        file: PathBuf,
        source: std::io::Error,
    },
}

impl ProbeError {
    /// Check if this error must abort the whole batch
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProbeError::ToolNotFound { .. })
    }
}

/// Errors while building a record from hash and probe output
#[derive(Error, Debug)]
pub enum RecordError {
    /// File metadata could not be read
    #[error("Failed to stat '{path}': {source}")]
    Stat {
        path: PathBuf,
        source: std::io::Error,
    },

    /// No geolocation-prefixed field in the probe output
    #[error("No geolocation data for '{path}'")]
    NoGeolocation { path: PathBuf },
}

impl RecordError {
    /// Check if this error excludes the file rather than failing it
    pub fn is_exclusion(&self) -> bool {
        matches!(self, RecordError::NoGeolocation { .. })
    }
}

/// Anything that can go wrong while processing one file
#[derive(Error, Debug)]
pub enum FileError {
    #[error(transparent)]
    Hash(#[from] HashError),

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error(transparent)]
    Record(#[from] RecordError),
}

impl FileError {
    /// Short name of the step that failed
    pub fn stage(&self) -> &'static str {
        match self {
            FileError::Hash(_) => "hash",
            FileError::Probe(_) => "probe",
            FileError::Record(_) => "record",
        }
    }
}

/// Errors while writing one output format
#[derive(Error, Debug)]
pub enum ExportError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV writer error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Temporary file could not be moved into place
    #[error("Failed to persist '{path}': {reason}")]
    Persist { path: PathBuf, reason: String },
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Input path is missing or not a directory
    #[error("Invalid input directory '{path}': {reason}")]
    InvalidInputDir { path: PathBuf, reason: String },

    /// Output path cannot be used as a directory
    #[error("Invalid output directory '{path}': {reason}")]
    InvalidOutputDir { path: PathBuf, reason: String },

    /// Log file cannot be used
    #[error("Invalid log file '{path}': {reason}")]
    InvalidLogFile { path: PathBuf, reason: String },

    /// No output formats selected
    #[error("At least one output format must be selected")]
    NoFormats,

    /// Invalid exclude pattern
    #[error("Invalid exclude pattern '{pattern}': {reason}")]
    InvalidExcludePattern { pattern: String, reason: String },
}

/// Result type alias for PipelineError
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Result type alias for HashError
pub type HashResult<T> = std::result::Result<T, HashError>;

/// Result type alias for ProbeError
pub type ProbeResult<T> = std::result::Result<T, ProbeError>;

/// Result type alias for RecordError
pub type RecordResult<T> = std::result::Result<T, RecordError>;

/// Result type alias for ExportError
pub type ExportResult<T> = std::result::Result<T, ExportError>;

/// Represents the outcome of processing a single file
#[derive(Debug)]
pub enum FileOutcome<R> {
    /// Record built
    Built(R),

    /// Deliberately left out of the export (not an error)
    Excluded { file: String, reason: String },

    /// Failed with error
    Failed { file: String, error: FileError },
}
