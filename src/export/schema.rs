//! Column derivation for flat exports
//!
//! The tabular, flat-text and relational writers of one export all share a
//! single column list, derived once over the whole record set by one of two
//! strategies:
//!
//! - [`FixedSchema`]: the columns of the first record. Suitable when every
//!   record of the kind carries the same keys (general pipeline).
//! - [`DiscoveredSchema`]: the declared identity columns followed by the
//!   sorted union of every other key observed in the batch (geo pipeline,
//!   where keys vary per file).

use crate::export::ExportRecord;
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use tracing::warn;

/// Strategy deciding the column set of an export
pub trait SchemaStrategy {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Derive the ordered column list for a batch of records
    fn columns<R: ExportRecord>(&self, records: &[R]) -> Vec<String>;
}

/// Column set taken from the first record
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedSchema;

impl SchemaStrategy for FixedSchema {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn columns<R: ExportRecord>(&self, records: &[R]) -> Vec<String> {
        let Some(first) = records.first() else {
            return Vec::new();
        };
        let columns: Vec<String> = first.fields().keys().cloned().collect();

        let known: HashSet<&str> = columns.iter().map(String::as_str).collect();
        for record in &records[1..] {
            let extra: Vec<String> = record
                .fields()
                .keys()
                .filter(|k| !known.contains(k.as_str()))
                .cloned()
                .collect();
            if !extra.is_empty() {
                warn!(
                    file = record.label(),
                    ?extra,
                    "Record carries keys outside the fixed schema; they are not exported to flat formats"
                );
            }
        }

        columns
    }
}

/// Column set discovered from the union of all records
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscoveredSchema;

impl SchemaStrategy for DiscoveredSchema {
    fn name(&self) -> &'static str {
        "discovered"
    }

    fn columns<R: ExportRecord>(&self, records: &[R]) -> Vec<String> {
        let declared = R::declared_columns();
        let observed: BTreeSet<String> = records
            .iter()
            .flat_map(|r| r.fields().into_iter().map(|(k, _)| k))
            .filter(|k| !declared.contains(&k.as_str()))
            .collect();

        declared
            .iter()
            .map(|c| c.to_string())
            .chain(observed)
            .collect()
    }
}

/// Render one field value as a flat cell
///
/// Absent and null values become the empty string; strings are written
/// unquoted; anything else is written as compact JSON.
pub fn render_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// SQL column name for a record key: lower-cased, spaces to underscores
pub fn sql_column_name(key: &str) -> String {
    key.replace(' ', "_").to_lowercase()
}

/// Quote an SQL identifier
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Map record keys to unique SQL column names
///
/// Keys that normalize to an already-taken name (or to `id`) get a numeric
/// suffix so that no observed key is dropped.
pub fn sql_columns(keys: &[String]) -> Vec<(String, String)> {
    let mut taken: HashSet<String> = HashSet::from(["id".to_string()]);
    keys.iter()
        .map(|key| {
            let base = sql_column_name(key);
            let mut name = base.clone();
            let mut n = 2;
            while !taken.insert(name.clone()) {
                name = format!("{}_{}", base, n);
                n += 1;
            }
            (key.clone(), name)
        })
        .collect()
}
