//! JSON document export
//!
//! Records are written as one pretty-printed array with four-space
//! indentation. Non-ASCII text is kept as UTF-8, never `\u` escaped.

use crate::error::ExportResult;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::io::Write;

/// Indentation used for document exports
const INDENT: &[u8] = b"    ";

/// Write records as a JSON array
pub fn write_document<R: Serialize, W: Write>(records: &[R], mut writer: W) -> ExportResult<()> {
    let mut ser = Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(INDENT));
    records.serialize(&mut ser)?;
    writer.write_all(b"\n")?;
    Ok(())
}
