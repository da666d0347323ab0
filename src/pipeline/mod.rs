//! End-to-end pipelines
//!
//! Wires the [`BatchRunner`] to the [`MultiFormatExporter`]:
//!
//! - **metadata**: every file becomes a [`FileRecord`]; the batch is exported
//!   in full as `forensic_metadata_consolidated.*` and as the hash-only
//!   `hash_database.*` projection, both with a fixed schema.
//! - **geo**: only files carrying geolocation fields become [`GeoRecord`]s;
//!   the batch is exported as `geo_location.*` with a discovered schema.

pub mod runner;

use crate::config::{PipelineConfig, PipelineKind};
use crate::content::FileHasher;
use crate::error::{PipelineError, Result};
use crate::export::{Artifact, DiscoveredSchema, ExportReport, FixedSchema, MultiFormatExporter};
use crate::probe::MetadataProbe;
use crate::record::{Consolidate, GeoConsolidator, HashRecord, RecordConsolidator};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

pub use runner::{
    enumerate_files, BatchObserver, BatchResult, BatchRunner, CandidateFile, FileFailure, NoopObserver,
};

/// Result of a full pipeline run
#[derive(Debug)]
pub struct RunSummary {
    /// Pipeline that ran
    pub kind: PipelineKind,

    /// Files attempted
    pub files_attempted: usize,

    /// Records built
    pub records_produced: usize,

    /// Per-file failures
    pub failures: Vec<FileFailure>,

    /// Files left out of the export without error
    pub excluded: Vec<String>,

    /// Bytes in attempted files
    pub bytes_attempted: u64,

    /// One report per exported artifact
    pub exports: Vec<ExportReport>,

    /// Wall time including export
    pub duration: Duration,

    /// Whether the batch ran to the end
    pub completed: bool,

    /// Where the outputs were written
    pub output_dir: PathBuf,
}

impl RunSummary {
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Number of formats that failed to write, across all artifacts
    pub fn export_failures(&self) -> usize {
        self.exports.iter().map(|r| r.failed.len()).sum()
    }

    /// Every path written, across all artifacts
    pub fn written_paths(&self) -> Vec<&std::path::Path> {
        self.exports
            .iter()
            .flat_map(|r| r.written.iter().map(|(_, p)| p.as_path()))
            .collect()
    }
}

/// A configured pipeline ready to run
pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
    hasher: &'a dyn FileHasher,
    probe: &'a dyn MetadataProbe,
    shutdown: Arc<AtomicBool>,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a PipelineConfig, hasher: &'a dyn FileHasher, probe: &'a dyn MetadataProbe) -> Self {
        Self {
            config,
            hasher,
            probe,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get a clone of the shutdown flag (for signal handlers)
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Run the batch and export the results
    ///
    /// Fails only when the metadata tool is unavailable or a folder cannot be
    /// used; per-file and per-format failures are reported in the summary.
    pub fn run(&self, observer: &dyn BatchObserver) -> Result<RunSummary> {
        let start = Instant::now();

        self.probe
            .ensure_available()
            .map_err(PipelineError::ToolUnavailable)?;

        let exporter = MultiFormatExporter::new(&self.config.output_dir);
        exporter.prepare().map_err(|source| PipelineError::OutputDir {
            path: self.config.output_dir.clone(),
            source,
        })?;

        info!(
            pipeline = self.config.kind.name(),
            input = %self.config.input_dir.display(),
            output = %self.config.output_dir.display(),
            source_device = %self.config.source_device,
            "Pipeline starting"
        );

        let (batch, exports) = match self.config.kind {
            PipelineKind::Metadata => {
                let batch = self.run_batch(RecordConsolidator::new(&self.config.source_device), observer)?;
                let hashes: Vec<HashRecord> = batch.records.iter().map(HashRecord::from).collect();
                let exports = vec![
                    exporter.export(&Artifact::CONSOLIDATED, &batch.records, &FixedSchema, &self.config.formats),
                    exporter.export(&Artifact::HASH_DATABASE, &hashes, &FixedSchema, &self.config.formats),
                ];
                (batch.counts(), exports)
            }
            PipelineKind::Geo => {
                let batch = self.run_batch(GeoConsolidator::new(&self.config.source_device), observer)?;
                if batch.records.is_empty() {
                    info!("No geolocation data found in any file");
                }
                let exports = vec![exporter.export(
                    &Artifact::GEO_LOCATION,
                    &batch.records,
                    &DiscoveredSchema,
                    &self.config.formats,
                )];
                (batch.counts(), exports)
            }
        };

        Ok(RunSummary {
            kind: self.config.kind,
            files_attempted: batch.files_attempted,
            records_produced: batch.records_produced,
            failures: batch.failures,
            excluded: batch.excluded,
            bytes_attempted: batch.bytes_attempted,
            exports,
            duration: start.elapsed(),
            completed: batch.completed,
            output_dir: self.config.output_dir.clone(),
        })
    }

    fn run_batch<C: Consolidate>(&self, consolidator: C, observer: &dyn BatchObserver) -> Result<BatchResult<C::Record>> {
        BatchRunner::new(self.hasher, self.probe, consolidator)
            .with_exclude_patterns(self.config.exclude_patterns.clone())
            .with_shutdown_flag(self.shutdown_flag())
            .run(&self.config.input_dir, observer)
    }
}

/// Batch counters with the records moved out
struct BatchCounts {
    files_attempted: usize,
    records_produced: usize,
    failures: Vec<FileFailure>,
    excluded: Vec<String>,
    bytes_attempted: u64,
    completed: bool,
}

impl<R> BatchResult<R> {
    fn counts(self) -> BatchCounts {
        BatchCounts {
            files_attempted: self.files_attempted,
            records_produced: self.records.len(),
            failures: self.failures,
            excluded: self.excluded,
            bytes_attempted: self.bytes_attempted,
            completed: self.completed,
        }
    }
}
