//! SQLite export
//!
//! Builds one table per export in two passes: the column list is derived
//! first (by the export's schema strategy, over the whole batch), then the
//! table is created once and filled row by row inside a single transaction.
//!
//! Every database also carries a `run_info` key/value table describing the
//! export.

use crate::error::ExportResult;
use crate::export::schema::{quote_ident, render_cell, sql_columns};
use crate::export::ExportRecord;
use chrono::Utc;
use rusqlite::{params_from_iter, Connection};

/// Current schema version of exported databases
pub const SCHEMA_VERSION: u32 = 1;

/// SQL to create the export metadata table
const CREATE_RUN_INFO_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS run_info (
    key TEXT PRIMARY KEY,
    value TEXT
)
"#;

/// Pragmas for a one-shot bulk load into a fresh file
const WRITE_PRAGMAS: &str = r#"
PRAGMA journal_mode = MEMORY;
PRAGMA synchronous = OFF;
PRAGMA temp_store = MEMORY;
"#;

/// Build the CREATE TABLE statement for a record kind and column list
pub fn create_table_sql<R: ExportRecord>(columns: &[String]) -> String {
    let mut sql = format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    id INTEGER PRIMARY KEY AUTOINCREMENT",
        quote_ident(R::TABLE_NAME)
    );
    for (key, name) in sql_columns(columns) {
        sql.push_str(&format!(",\n    {} {} NOT NULL", quote_ident(&name), R::column_type(&key)));
    }
    sql.push_str("\n)");
    sql
}

/// Create the table and insert every record
///
/// Returns the number of rows inserted.
pub fn write_relational<R: ExportRecord>(conn: &mut Connection, records: &[R], columns: &[String]) -> ExportResult<usize> {
    conn.execute_batch(WRITE_PRAGMAS)?;
    conn.execute(CREATE_RUN_INFO_TABLE, [])?;
    conn.execute(&create_table_sql::<R>(columns), [])?;

    let names: Vec<String> = sql_columns(columns)
        .into_iter()
        .map(|(_, name)| quote_ident(&name))
        .collect();
    let placeholders = vec!["?"; names.len()].join(", ");
    let insert = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(R::TABLE_NAME),
        names.join(", "),
        placeholders
    );

    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(&insert)?;
        for record in records {
            let fields = record.fields();
            let values: Vec<String> = columns.iter().map(|c| render_cell(fields.get(c))).collect();
            stmt.execute(params_from_iter(values.iter()))?;
        }
    }

    set_run_info(&tx, keys::SCHEMA_VERSION, &SCHEMA_VERSION.to_string())?;
    set_run_info(&tx, keys::TOOL_VERSION, env!("CARGO_PKG_VERSION"))?;
    set_run_info(&tx, keys::CREATED_AT, &Utc::now().to_rfc3339())?;
    set_run_info(&tx, keys::TABLE, R::TABLE_NAME)?;
    set_run_info(&tx, keys::ROW_COUNT, &records.len().to_string())?;
    tx.commit()?;

    Ok(records.len())
}

/// Store export metadata
pub fn set_run_info(conn: &Connection, key: &str, value: &str) -> ExportResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO run_info (key, value) VALUES (?1, ?2)",
        [key, value],
    )?;
    Ok(())
}

/// Get export metadata
pub fn get_run_info(conn: &Connection, key: &str) -> ExportResult<Option<String>> {
    let result = conn.query_row(
        "SELECT value FROM run_info WHERE key = ?1",
        [key],
        |row| row.get(0),
    );

    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Metadata keys written to `run_info`
pub mod keys {
    /// Schema version
    pub const SCHEMA_VERSION: &str = "schema_version";

    /// Version of this tool
    pub const TOOL_VERSION: &str = "tool_version";

    /// Timestamp the database was written (RFC 3339)
    pub const CREATED_AT: &str = "created_at";

    /// Name of the data table
    pub const TABLE: &str = "table";

    /// Rows inserted into the data table
    pub const ROW_COUNT: &str = "row_count";
}
