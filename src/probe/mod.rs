//! Metadata probing through an external extraction tool
//!
//! The pipeline core only sees the [`MetadataProbe`] capability: give it a
//! file path, get back the tool's key/value map for that file. How the tool
//! is located, invoked and parsed lives in the implementations.

pub mod exiftool;

use crate::error::{ProbeError, ProbeResult};
use serde_json::{Map, Value};
use std::path::Path;

pub use exiftool::{ExifToolProbe, ProbeMode};

/// Tool-defined metadata for one file, in the tool's key order
pub type Metadata = Map<String, Value>;

/// Capability to extract structured metadata for a single file
pub trait MetadataProbe {
    /// Verify the tool can be used at all
    ///
    /// Called once before a batch starts; an error here aborts the batch.
    fn ensure_available(&self) -> ProbeResult<()> {
        Ok(())
    }

    /// Extract metadata for one file
    fn extract(&self, path: &Path) -> ProbeResult<Metadata>;
}

impl<P: MetadataProbe + ?Sized> MetadataProbe for &P {
    fn ensure_available(&self) -> ProbeResult<()> {
        (**self).ensure_available()
    }

    fn extract(&self, path: &Path) -> ProbeResult<Metadata> {
        (**self).extract(path)
    }
}

/// Parse the tool's JSON document output
///
/// The output must be an array whose first element is an object; that
/// object is the metadata for the probed file.
pub fn parse_tool_output(file: &Path, output: &str) -> ProbeResult<Metadata> {
    let malformed = |reason: String| ProbeError::MalformedOutput {
        file: file.to_path_buf(),
        reason,
    };

    let document: Value =
        serde_json::from_str(output).map_err(|e| malformed(format!("invalid JSON: {}", e)))?;

    let first = match document {
        Value::Array(items) => items
            .into_iter()
            .next()
            .ok_or_else(|| malformed("empty result array".to_string()))?,
        other => return Err(malformed(format!("expected an array, got {}", json_kind(&other)))),
    };

    match first {
        Value::Object(map) => Ok(map),
        other => Err(malformed(format!(
            "expected an object in the result array, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
