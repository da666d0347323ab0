//! forensic-metadata - evidence hashing and metadata consolidation
//!
//! Processes every regular file directly inside a folder: computes MD5,
//! SHA-1 and SHA-256 in one streaming pass, extracts metadata with ExifTool,
//! merges both into one canonical record per file, and exports the batch to
//! JSON, CSV, a text report and SQLite.
//!
//! # Pipelines
//!
//! - **metadata**: full consolidated records plus a hash-only projection for
//!   chain-of-custody use.
//! - **geo**: only files whose metadata carries `Geolocation*` fields, with
//!   the relational schema discovered from the whole batch.
//!
//! # Architecture
//!
//! ```text
//!   input folder (flat, sorted by name)
//!          │
//!          ▼
//!   ┌──────────────────────────────────────────────┐
//!   │                 BatchRunner                  │
//!   │   per file:  hash ──► probe ──► consolidate  │
//!   │   failures logged and skipped, never fatal   │
//!   └──────────────────────┬───────────────────────┘
//!                          │ Vec<Record>
//!                          ▼
//!   ┌──────────────────────────────────────────────┐
//!   │             MultiFormatExporter              │
//!   │   columns derived once (fixed / discovered)  │
//!   │   .json   .csv   .txt   .db   (independent)  │
//!   └──────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```bash
//! # Hash and consolidate everything in a folder
//! forensic-metadata metadata ./Jpg_folder
//!
//! # Geolocation only, SQLite and JSON
//! forensic-metadata geo ./Jpg_folder -f relational -f document
//!
//! # Query results
//! sqlite3 ./Jpg_folder/Forensic_metadata_output/hash_database.db "SELECT filename, sha256 FROM file_hashes"
//! ```

pub mod config;
pub mod content;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod probe;
pub mod progress;
pub mod record;

pub use config::{CliArgs, OutputFormat, PipelineConfig, PipelineKind};
pub use error::{PipelineError, Result};
pub use pipeline::{BatchRunner, Pipeline, RunSummary};
