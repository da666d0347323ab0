//! CSV export
//!
//! One header row, then one row per record. Cells for keys a record does
//! not carry are left empty.

use crate::error::ExportResult;
use crate::export::schema::render_cell;
use crate::export::ExportRecord;
use std::io::Write;

/// Write records as CSV using the given column list
pub fn write_tabular<R: ExportRecord, W: Write>(records: &[R], columns: &[String], writer: W) -> ExportResult<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(columns)?;

    for record in records {
        let fields = record.fields();
        csv.write_record(columns.iter().map(|c| render_cell(fields.get(c))))?;
    }

    csv.flush()?;
    Ok(())
}
