//! Sequential batch runner
//!
//! Enumerates the regular files directly inside the input folder and runs
//! each one through hash → probe → consolidate. A failure in any step is
//! logged and the file is skipped; the batch itself only fails when the
//! metadata tool is unavailable or the folder cannot be listed.

use crate::content::FileHasher;
use crate::error::{FileError, FileOutcome, PipelineError, Result};
use crate::probe::MetadataProbe;
use crate::record::{file_name, Consolidate};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Receives progress signals while a batch runs
pub trait BatchObserver {
    /// Called once with the number of files about to be attempted
    fn batch_started(&self, _total: usize) {}

    /// Called once per attempted file, whatever the outcome
    fn file_finished(&self, _file: &str, _built: bool) {}
}

/// Observer that ignores every signal
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl BatchObserver for NoopObserver {}

/// A regular file selected for processing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
}

/// A file that could not be processed
#[derive(Debug)]
pub struct FileFailure {
    pub file: String,
    pub error: FileError,
}

/// Result of a completed batch
#[derive(Debug)]
pub struct BatchResult<R> {
    /// Records built, in file name order
    pub records: Vec<R>,

    /// Files attempted
    pub files_attempted: usize,

    /// Files that failed, with the cause
    pub failures: Vec<FileFailure>,

    /// Files deliberately left out (e.g. no geolocation)
    pub excluded: Vec<String>,

    /// Bytes in attempted files
    pub bytes_attempted: u64,

    /// Time taken for the batch
    pub duration: Duration,

    /// Whether every candidate was attempted (vs interrupted)
    pub completed: bool,
}

impl<R> BatchResult<R> {
    pub fn records_produced(&self) -> usize {
        self.records.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }
}

/// Runs hash, probe and consolidation over a folder, one file at a time
pub struct BatchRunner<'a, C> {
    hasher: &'a dyn FileHasher,
    probe: &'a dyn MetadataProbe,
    consolidator: C,
    exclude_patterns: Vec<Regex>,
    shutdown: Arc<AtomicBool>,
}

impl<'a, C: Consolidate> BatchRunner<'a, C> {
    pub fn new(hasher: &'a dyn FileHasher, probe: &'a dyn MetadataProbe, consolidator: C) -> Self {
        Self {
            hasher,
            probe,
            consolidator,
            exclude_patterns: Vec::new(),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Skip file names matching any of these patterns
    pub fn with_exclude_patterns(mut self, patterns: Vec<Regex>) -> Self {
        self.exclude_patterns = patterns;
        self
    }

    /// Share an externally owned shutdown flag
    pub fn with_shutdown_flag(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Get a clone of the shutdown flag (for signal handlers)
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Process every candidate file in the folder
    pub fn run(&self, input_dir: &Path, observer: &dyn BatchObserver) -> Result<BatchResult<C::Record>> {
        self.probe
            .ensure_available()
            .map_err(PipelineError::ToolUnavailable)?;

        let start = Instant::now();
        let candidates: Vec<CandidateFile> = enumerate_files(input_dir)?
            .into_iter()
            .filter(|c| {
                let excluded = self.exclude_patterns.iter().any(|re| re.is_match(&c.name));
                if excluded {
                    debug!(file = %c.name, "Excluded by pattern");
                }
                !excluded
            })
            .collect();

        info!(
            dir = %input_dir.display(),
            files = candidates.len(),
            "Starting batch"
        );
        observer.batch_started(candidates.len());

        let mut records = Vec::with_capacity(candidates.len());
        let mut failures = Vec::new();
        let mut excluded = Vec::new();
        let mut files_attempted = 0;
        let mut bytes_attempted = 0;
        let mut completed = true;

        for candidate in &candidates {
            if self.shutdown.load(Ordering::SeqCst) {
                warn!(remaining = candidates.len() - files_attempted, "Shutdown requested, stopping batch");
                completed = false;
                break;
            }

            files_attempted += 1;
            bytes_attempted += candidate.size;

            let built = match self.process_file(&candidate.path) {
                FileOutcome::Built(record) => {
                    info!(file = %candidate.name, "Processed");
                    records.push(record);
                    true
                }
                FileOutcome::Excluded { file, reason } => {
                    warn!(file = %file, reason = %reason, "Excluded from export");
                    excluded.push(file);
                    false
                }
                FileOutcome::Failed { file, error } => {
                    error!(file = %file, stage = error.stage(), error = %error, "Failed to process file");
                    failures.push(FileFailure { file, error });
                    false
                }
            };
            observer.file_finished(&candidate.name, built);
        }

        let result = BatchResult {
            records,
            files_attempted,
            failures,
            excluded,
            bytes_attempted,
            duration: start.elapsed(),
            completed,
        };

        info!(
            attempted = result.files_attempted,
            produced = result.records_produced(),
            failed = result.failure_count(),
            excluded = result.excluded.len(),
            "Batch finished"
        );

        Ok(result)
    }

    /// Hash, probe and consolidate a single file
    pub fn process_file(&self, path: &Path) -> FileOutcome<C::Record> {
        let file = file_name(path);
        match self.try_process(path) {
            Ok(record) => FileOutcome::Built(record),
            Err(FileError::Record(e)) if e.is_exclusion() => FileOutcome::Excluded {
                file,
                reason: e.to_string(),
            },
            Err(error) => FileOutcome::Failed { file, error },
        }
    }

    fn try_process(&self, path: &Path) -> std::result::Result<C::Record, FileError> {
        let hashes = self.hasher.hash_file(path)?;
        let metadata = self.probe.extract(path)?;
        Ok(self.consolidator.consolidate(path, hashes, metadata)?)
    }
}

/// List the regular files directly inside a folder, sorted by name
///
/// Symlinks are followed; directories and other file types are skipped.
pub fn enumerate_files(dir: &Path) -> Result<Vec<CandidateFile>> {
    let to_err = |source| PipelineError::InputDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(to_err)? {
        let entry = entry.map_err(to_err)?;
        let path = entry.path();
        match std::fs::metadata(&path) {
            Ok(meta) if meta.is_file() => files.push(CandidateFile {
                name: file_name(&path),
                size: meta.len(),
                path,
            }),
            Ok(_) => {}
            Err(e) => debug!(path = %path.display(), error = %e, "Skipping unreadable entry"),
        }
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}
