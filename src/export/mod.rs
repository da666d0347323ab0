//! Multi-format export of consolidated records
//!
//! A batch of records is written to up to four formats in the output
//! directory, all sharing one base name:
//!
//! ```text
//!                 ┌──────────────────────────┐
//!                 │   records (one batch)    │
//!                 └────────────┬─────────────┘
//!                              │ SchemaStrategy::columns (once)
//!        ┌──────────────┬──────┴───────┬───────────────┐
//!        ▼              ▼              ▼               ▼
//!   ┌─────────┐   ┌──────────┐   ┌───────────┐   ┌────────────┐
//!   │  .json  │   │   .csv   │   │   .txt    │   │    .db     │
//!   │document │   │ tabular  │   │ flat text │   │ relational │
//!   └─────────┘   └──────────┘   └───────────┘   └────────────┘
//! ```
//!
//! Each format is written independently: a failure is logged, recorded in
//! the [`ExportReport`], and the remaining formats are still attempted.
//! Files are written to a temporary name in the output directory and
//! renamed into place, so re-runs replace earlier output wholesale.

pub mod document;
pub mod flat;
pub mod relational;
pub mod schema;
pub mod tabular;

use crate::config::OutputFormat;
use crate::error::{ExportError, ExportResult};
use crate::probe::Metadata;
use rusqlite::Connection;
use serde::Serialize;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{error, info};

pub use schema::{DiscoveredSchema, FixedSchema, SchemaStrategy};

/// A record that can be written to every export format
pub trait ExportRecord: Serialize {
    /// Table name used by the relational export
    const TABLE_NAME: &'static str;

    /// Columns every record of this kind carries, in declared order
    fn declared_columns() -> &'static [&'static str];

    /// SQL type affinity for a column
    fn column_type(_column: &str) -> &'static str {
        "TEXT"
    }

    /// Identity used in logs
    fn label(&self) -> &str;

    /// Flat key/value view used by the tabular, text and relational formats
    fn fields(&self) -> Metadata;
}

/// A named set of output files sharing one base name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Artifact {
    /// Base file name without extension
    pub base_name: &'static str,

    /// Formats this artifact is produced in
    pub formats: &'static [OutputFormat],

    /// File name override for the flat-text report
    pub flat_text_name: Option<&'static str>,
}

impl Artifact {
    /// Full consolidated records (general pipeline)
    pub const CONSOLIDATED: Artifact = Artifact {
        base_name: "forensic_metadata_consolidated",
        formats: &OutputFormat::ALL,
        flat_text_name: None,
    };

    /// Hash-only projection (general pipeline)
    pub const HASH_DATABASE: Artifact = Artifact {
        base_name: "hash_database",
        formats: &[OutputFormat::Document, OutputFormat::Tabular, OutputFormat::Relational],
        flat_text_name: None,
    };

    /// Geolocation records (geo pipeline)
    pub const GEO_LOCATION: Artifact = Artifact {
        base_name: "geo_location",
        formats: &OutputFormat::ALL,
        flat_text_name: Some("geo_location_report.txt"),
    };

    /// File name for one format
    pub fn file_name(&self, format: OutputFormat) -> String {
        match (format, self.flat_text_name) {
            (OutputFormat::FlatText, Some(name)) => name.to_string(),
            _ => format!("{}.{}", self.base_name, format.extension()),
        }
    }
}

/// Result of exporting one artifact
#[derive(Debug, Default)]
pub struct ExportReport {
    /// Artifact base name
    pub artifact: String,

    /// Records in the batch
    pub records: usize,

    /// Formats written, with their paths
    pub written: Vec<(OutputFormat, PathBuf)>,

    /// Formats that failed, with the cause
    pub failed: Vec<(OutputFormat, ExportError)>,

    /// True when the batch was empty and nothing was written
    pub skipped_empty: bool,
}

impl ExportReport {
    /// Path written for a format, if it succeeded
    pub fn path_for(&self, format: OutputFormat) -> Option<&Path> {
        self.written
            .iter()
            .find(|(f, _)| *f == format)
            .map(|(_, p)| p.as_path())
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Writes record batches to the output directory
#[derive(Debug, Clone)]
pub struct MultiFormatExporter {
    output_dir: PathBuf,
}

impl MultiFormatExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Create the output directory if needed
    pub fn prepare(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.output_dir)?;
        info!(dir = %self.output_dir.display(), "Output folder prepared");
        Ok(())
    }

    /// Export one artifact in every requested format it supports
    pub fn export<R, S>(&self, artifact: &Artifact, records: &[R], schema: &S, requested: &[OutputFormat]) -> ExportReport
    where
        R: ExportRecord,
        S: SchemaStrategy,
    {
        let mut report = ExportReport {
            artifact: artifact.base_name.to_string(),
            records: records.len(),
            ..Default::default()
        };

        if records.is_empty() {
            info!(artifact = artifact.base_name, "No records, skipping export");
            report.skipped_empty = true;
            return report;
        }

        let columns = schema.columns(records);

        for &format in artifact.formats.iter().filter(|f| requested.contains(f)) {
            let path = self.output_dir.join(artifact.file_name(format));
            let result = match format {
                OutputFormat::Document => write_atomic(&path, |w| document::write_document(records, w)),
                OutputFormat::Tabular => write_atomic(&path, |w| tabular::write_tabular(records, &columns, w)),
                OutputFormat::FlatText => write_atomic(&path, |w| flat::write_flat_text(records, &columns, w)),
                OutputFormat::Relational => write_database(&path, |conn| {
                    relational::write_relational(conn, records, &columns).map(|_| ())
                }),
            };

            match result {
                Ok(()) => {
                    info!(
                        format = format.name(),
                        schema = schema.name(),
                        records = records.len(),
                        path = %path.display(),
                        "Export saved"
                    );
                    report.written.push((format, path));
                }
                Err(e) => {
                    error!(
                        format = format.name(),
                        path = %path.display(),
                        error = %e,
                        "Export failed"
                    );
                    report.failed.push((format, e));
                }
            }
        }

        report
    }
}

/// Write a file through a temporary sibling and rename it into place
fn write_atomic<F>(path: &Path, write: F) -> ExportResult<()>
where
    F: FnOnce(&mut BufWriter<&mut NamedTempFile>) -> ExportResult<()>,
{
    let mut tmp = NamedTempFile::new_in(parent_dir(path))?;
    {
        let mut writer = BufWriter::new(&mut tmp);
        write(&mut writer)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    persist(tmp, path)
}

/// Build a SQLite database in a temporary sibling and rename it into place
fn write_database<F>(path: &Path, write: F) -> ExportResult<()>
where
    F: FnOnce(&mut Connection) -> ExportResult<()>,
{
    let tmp = NamedTempFile::new_in(parent_dir(path))?;
    {
        let mut conn = Connection::open(tmp.path())?;
        write(&mut conn)?;
        conn.close().map_err(|(_, e)| e)?;
    }
    // Writes ran with synchronous = OFF
    tmp.as_file().sync_all()?;
    persist(tmp, path)
}

fn persist(tmp: NamedTempFile, path: &Path) -> ExportResult<()> {
    tmp.persist(path).map_err(|e| ExportError::Persist {
        path: path.to_path_buf(),
        reason: e.error.to_string(),
    })?;
    Ok(())
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}
