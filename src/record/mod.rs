//! Canonical per-file records
//!
//! A [`FileRecord`] merges three sources into one value: the file's identity
//! (name, path, size), its digests, and the opaque metadata map returned by
//! the probe. Field order is fixed and is what the flat exports use as
//! column order:
//!
//! 1. identity: `filename`, `full_path`, `size_bytes`
//! 2. digests: `md5`, `sha1`, `sha256`
//! 3. provenance: `captured_at`, `source_device`
//! 4. the metadata blob: `extra_metadata`
//!
//! [`HashRecord`] is the hash-only projection used for chain-of-custody
//! exports, and [`geo::GeoRecord`] is the geolocation specialization.

pub mod geo;

use crate::content::Digests;
use crate::error::{RecordError, RecordResult};
use crate::export::ExportRecord;
use crate::probe::Metadata;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::path::Path;

pub use geo::{extract_geo_fields, GeoConsolidator, GeoRecord, GEOLOCATION_PREFIX};

/// Builds one record per successfully hashed and probed file
pub trait Consolidate {
    type Record: ExportRecord;

    fn consolidate(&self, path: &Path, hashes: Digests, metadata: Metadata) -> RecordResult<Self::Record>;
}

/// Consolidated record for one evidence file
#[derive(Debug, Clone, Serialize)]
pub struct FileRecord {
    pub filename: String,
    pub full_path: String,
    pub size_bytes: u64,
    pub hashes: Digests,
    #[serde(serialize_with = "serialize_timestamp")]
    pub captured_at: DateTime<Utc>,
    pub source_device: String,
    pub extra_metadata: Metadata,
}

impl ExportRecord for FileRecord {
    const TABLE_NAME: &'static str = "file_records";

    fn declared_columns() -> &'static [&'static str] {
        &[
            "filename",
            "full_path",
            "size_bytes",
            "md5",
            "sha1",
            "sha256",
            "captured_at",
            "source_device",
            "extra_metadata",
        ]
    }

    fn column_type(column: &str) -> &'static str {
        match column {
            "size_bytes" => "INTEGER",
            _ => "TEXT",
        }
    }

    fn label(&self) -> &str {
        &self.filename
    }

    fn fields(&self) -> Metadata {
        let mut fields = Metadata::new();
        fields.insert("filename".into(), Value::from(self.filename.as_str()));
        fields.insert("full_path".into(), Value::from(self.full_path.as_str()));
        fields.insert("size_bytes".into(), Value::from(self.size_bytes));
        fields.insert("md5".into(), Value::from(self.hashes.md5.as_str()));
        fields.insert("sha1".into(), Value::from(self.hashes.sha1.as_str()));
        fields.insert("sha256".into(), Value::from(self.hashes.sha256.as_str()));
        fields.insert("captured_at".into(), Value::from(format_timestamp(&self.captured_at)));
        fields.insert("source_device".into(), Value::from(self.source_device.as_str()));
        fields.insert("extra_metadata".into(), Value::Object(self.extra_metadata.clone()));
        fields
    }
}

/// Hash-only projection of a [`FileRecord`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HashRecord {
    pub filename: String,
    pub md5: String,
    pub sha1: String,
    pub sha256: String,
}

impl From<&FileRecord> for HashRecord {
    fn from(record: &FileRecord) -> Self {
        Self {
            filename: record.filename.clone(),
            md5: record.hashes.md5.clone(),
            sha1: record.hashes.sha1.clone(),
            sha256: record.hashes.sha256.clone(),
        }
    }
}

impl ExportRecord for HashRecord {
    const TABLE_NAME: &'static str = "file_hashes";

    fn declared_columns() -> &'static [&'static str] {
        &["filename", "md5", "sha1", "sha256"]
    }

    fn label(&self) -> &str {
        &self.filename
    }

    fn fields(&self) -> Metadata {
        let mut fields = Metadata::new();
        fields.insert("filename".into(), Value::from(self.filename.as_str()));
        fields.insert("md5".into(), Value::from(self.md5.as_str()));
        fields.insert("sha1".into(), Value::from(self.sha1.as_str()));
        fields.insert("sha256".into(), Value::from(self.sha256.as_str()));
        fields
    }
}

/// Builds [`FileRecord`]s for the general pipeline
#[derive(Debug, Clone)]
pub struct RecordConsolidator {
    source_device: String,
}

impl RecordConsolidator {
    pub fn new(source_device: impl Into<String>) -> Self {
        Self {
            source_device: source_device.into(),
        }
    }

    /// Build a record stamped with an explicit capture time
    pub fn consolidate_at(
        &self,
        path: &Path,
        hashes: Digests,
        metadata: Metadata,
        captured_at: DateTime<Utc>,
    ) -> RecordResult<FileRecord> {
        let size_bytes = std::fs::metadata(path)
            .map_err(|source| RecordError::Stat {
                path: path.to_path_buf(),
                source,
            })?
            .len();

        Ok(FileRecord {
            filename: file_name(path),
            full_path: path.display().to_string(),
            size_bytes,
            hashes,
            captured_at,
            source_device: self.source_device.clone(),
            extra_metadata: metadata,
        })
    }
}

impl Consolidate for RecordConsolidator {
    type Record = FileRecord;

    fn consolidate(&self, path: &Path, hashes: Digests, metadata: Metadata) -> RecordResult<FileRecord> {
        self.consolidate_at(path, hashes, metadata, Utc::now())
    }
}

/// Base name of a path, lossily converted to UTF-8
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// RFC 3339 UTC timestamp with microsecond precision
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_timestamp(ts))
}
