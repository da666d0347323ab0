//! Geolocation records
//!
//! The geo pipeline keeps only the probe fields whose key starts with
//! `Geolocation` (position, city, country and whatever else the tool's
//! geocoder emits). The set of keys varies per file, so the export schema
//! is discovered from the whole batch rather than declared up front.

use super::{file_name, format_timestamp, Consolidate};
use crate::content::Digests;
use crate::error::{RecordError, RecordResult};
use crate::export::ExportRecord;
use crate::probe::Metadata;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

/// Key prefix marking geolocation fields in probe output
pub const GEOLOCATION_PREFIX: &str = "Geolocation";

/// Geolocation view of one evidence file
#[derive(Debug, Clone, Serialize)]
pub struct GeoRecord {
    pub filename: String,
    pub full_path: String,
    pub md5: String,
    #[serde(serialize_with = "super::serialize_timestamp")]
    pub captured_at: DateTime<Utc>,
    pub source_device: String,
    /// Geolocation fields, flattened into the document next to the identity fields
    #[serde(flatten)]
    pub geo_fields: Metadata,
}

impl ExportRecord for GeoRecord {
    const TABLE_NAME: &'static str = "geolocation_data";

    fn declared_columns() -> &'static [&'static str] {
        &["filename", "full_path", "md5", "captured_at", "source_device"]
    }

    fn label(&self) -> &str {
        &self.filename
    }

    fn fields(&self) -> Metadata {
        let mut fields = Metadata::new();
        fields.insert("filename".into(), Value::from(self.filename.as_str()));
        fields.insert("full_path".into(), Value::from(self.full_path.as_str()));
        fields.insert("md5".into(), Value::from(self.md5.as_str()));
        fields.insert("captured_at".into(), Value::from(format_timestamp(&self.captured_at)));
        fields.insert("source_device".into(), Value::from(self.source_device.as_str()));
        for (key, value) in &self.geo_fields {
            fields.insert(key.clone(), value.clone());
        }
        fields
    }
}

/// Keep only non-null geolocation fields, in probe order
///
/// Returns `None` when the probe output carries no usable geolocation.
pub fn extract_geo_fields(metadata: Metadata) -> Option<Metadata> {
    let geo: Metadata = metadata
        .into_iter()
        .filter(|(key, value)| key.starts_with(GEOLOCATION_PREFIX) && !value.is_null())
        .collect();

    if geo.is_empty() {
        None
    } else {
        Some(geo)
    }
}

/// Builds [`GeoRecord`]s for the geo pipeline
#[derive(Debug, Clone)]
pub struct GeoConsolidator {
    source_device: String,
}

impl GeoConsolidator {
    pub fn new(source_device: impl Into<String>) -> Self {
        Self {
            source_device: source_device.into(),
        }
    }

    /// Build a record stamped with an explicit capture time
    pub fn consolidate_at(
        &self,
        path: &Path,
        hashes: &Digests,
        metadata: Metadata,
        captured_at: DateTime<Utc>,
    ) -> RecordResult<GeoRecord> {
        let geo_fields = extract_geo_fields(metadata).ok_or_else(|| RecordError::NoGeolocation {
            path: path.to_path_buf(),
        })?;

        Ok(GeoRecord {
            filename: file_name(path),
            full_path: path.display().to_string(),
            md5: hashes.md5.clone(),
            captured_at,
            source_device: self.source_device.clone(),
            geo_fields,
        })
    }
}

impl Consolidate for GeoConsolidator {
    type Record = GeoRecord;

    fn consolidate(&self, path: &Path, hashes: Digests, metadata: Metadata) -> RecordResult<GeoRecord> {
        self.consolidate_at(path, &hashes, metadata, Utc::now())
    }
}
