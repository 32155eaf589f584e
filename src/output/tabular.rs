//! Tabular export of extracted records
//!
//! Rows are records, columns are `url` followed by the configured field
//! names. Cells containing the separator, a quote or a line break are
//! quoted, with embedded quotes doubled.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::extract::{ExtractedRecord, ExtractedValue};
use crate::output::{OutputError, OutputResult};

/// Separator between list items inside one cell
pub const LIST_SEPARATOR: &str = "; ";

/// Row-column text format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Tsv,
}

impl TableFormat {
    /// Picks the format from a file extension; anything but `.tsv`/`.tab` is CSV
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("tsv") | Some("tab") => Self::Tsv,
            _ => Self::Csv,
        }
    }

    pub fn separator(&self) -> char {
        match self {
            Self::Csv => ',',
            Self::Tsv => '\t',
        }
    }
}

fn cell(value: Option<&ExtractedValue>) -> String {
    match value {
        Some(ExtractedValue::Text(text)) => text.clone(),
        Some(ExtractedValue::Number(n)) => n.to_string(),
        Some(ExtractedValue::List(items)) => items.join(LIST_SEPARATOR),
        Some(ExtractedValue::Absent) | None => String::new(),
    }
}

/// Builds a header row followed by one row per record
///
/// # Arguments
///
/// * `records` - Extracted records, in crawl order
/// * `columns` - Field names; the `url` column is always first
pub fn to_table(records: &[ExtractedRecord], columns: &[String]) -> Vec<Vec<String>> {
    let mut header = Vec::with_capacity(columns.len() + 1);
    header.push("url".to_string());
    header.extend(columns.iter().cloned());

    let mut rows = Vec::with_capacity(records.len() + 1);
    rows.push(header);

    for record in records {
        let mut row = Vec::with_capacity(columns.len() + 1);
        row.push(record.url.clone());
        row.extend(columns.iter().map(|c| cell(record.get(c))));
        rows.push(row);
    }

    rows
}

fn needs_quotes(field: &str, sep: char) -> bool {
    field.contains(sep) || field.contains('"') || field.contains('\n') || field.contains('\r')
}

/// Writes a single row to any writer
pub fn write_row<W: Write>(mut w: W, row: &[String], sep: char) -> io::Result<()> {
    let mut first = true;
    for cell in row {
        if !first {
            write!(w, "{}", sep)?;
        } else {
            first = false;
        }
        if needs_quotes(cell, sep) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            write!(w, "{}", cell)?;
        }
    }
    writeln!(w)
}

/// Writes all rows
pub fn write_table<W: Write>(mut w: W, rows: &[Vec<String>], sep: char) -> io::Result<()> {
    for row in rows {
        write_row(&mut w, row, sep)?;
    }
    w.flush()
}

/// Exports records to `path`, choosing CSV or TSV from the extension
///
/// # Returns
///
/// * `Ok(usize)` - Number of data rows written
/// * `Err(OutputError)` - The file could not be written
pub fn write_export(
    path: &Path,
    records: &[ExtractedRecord],
    columns: &[String],
) -> OutputResult<usize> {
    let sep = TableFormat::from_path(path).separator();
    let rows = to_table(records, columns);

    let write = || -> io::Result<()> {
        let file = File::create(path)?;
        write_table(BufWriter::new(file), &rows, sep)
    };
    write().map_err(|source| OutputError::Write {
        path: path.display().to_string(),
        source,
    })?;

    tracing::info!("Exported {} records to {}", records.len(), path.display());
    Ok(records.len())
}
