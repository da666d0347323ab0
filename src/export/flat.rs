//! Human-readable text report
//!
//! One block per record, framed by separator lines, one `key: value` line
//! per column.

use crate::error::ExportResult;
use crate::export::schema::render_cell;
use crate::export::ExportRecord;
use std::io::Write;

/// Width of the separator line between blocks
pub const SEPARATOR_WIDTH: usize = 50;

/// Write records as a flat text report using the given column list
pub fn write_flat_text<R: ExportRecord, W: Write>(records: &[R], columns: &[String], mut writer: W) -> ExportResult<()> {
    let separator = "=".repeat(SEPARATOR_WIDTH);

    for record in records {
        let fields = record.fields();
        writeln!(writer, "{}", separator)?;
        for column in columns {
            writeln!(writer, "{}: {}", column, render_cell(fields.get(column)))?;
        }
        writeln!(writer, "{}", separator)?;
        writeln!(writer)?;
    }

    writer.flush()?;
    Ok(())
}
