//! `;`-delimited report serialization
//!
//! The report targets spreadsheet imports in locales that use `;` as list
//! separator and `,` as decimal mark, so cells follow their own quoting rules
//! rather than RFC 4180:
//!
//! - phone-number columns (`to`, `from`) are written as `="value"` formulas so
//!   leading `+` and zeros survive the import
//! - `price` uses a decimal comma
//! - any other value containing `;` or `"` is wrapped in double quotes
//!
//! Lines are joined with `\n` and the file has no trailing newline.

use indexmap::IndexSet;
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::{OutputError, OutputResult};
use crate::Record;

/// Field delimiter
pub const DELIMITER: &str = ";";

/// First cell of a row that could not be assembled
pub const ROW_ERROR_PLACEHOLDER: &str = "ERROR_PROCESSING_ROW";

/// Columns rendered as `="value"` formulas
const FORMULA_COLUMNS: [&str; 2] = ["to", "from"];

/// Column rendered with a decimal comma
const PRICE_COLUMN: &str = "price";

/// Render one cell
pub fn format_cell(column: &str, value: Option<&Value>) -> Result<String, serde_json::Error> {
    let raw = match value {
        None | Some(Value::Null) => return Ok(String::new()),
        Some(Value::String(s)) => s.clone(),
        Some(nested @ (Value::Array(_) | Value::Object(_))) => serde_json::to_string(nested)?,
        Some(scalar) => scalar.to_string(),
    };

    let escaped = raw
        .replace("\r\n", " ")
        .replace(['\n', '\r'], " ")
        .replace('"', "\"\"");

    let mut cell = if FORMULA_COLUMNS.contains(&column) {
        format!("=\"{escaped}\"")
    } else if escaped.contains(';') || escaped.contains('"') {
        format!("\"{escaped}\"")
    } else {
        escaped
    };

    if column == PRICE_COLUMN {
        cell = cell.replacen('.', ",", 1);
    }
    Ok(cell)
}

/// Union of record keys in first-seen order
pub fn collect_columns(records: &[Record]) -> Vec<String> {
    let mut columns: IndexSet<&str> = IndexSet::new();
    for record in records {
        for key in record.keys() {
            columns.insert(key.as_str());
        }
    }
    columns.into_iter().map(str::to_string).collect()
}

fn render_row(columns: &[String], record: &Record) -> Result<String, serde_json::Error> {
    let cells = columns
        .iter()
        .map(|column| format_cell(column, record.get(column)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(cells.join(DELIMITER))
}

fn placeholder_row(width: usize) -> String {
    let mut cells = vec![String::new(); width.max(1)];
    cells[0] = ROW_ERROR_PLACEHOLDER.to_string();
    cells.join(DELIMITER)
}

/// Serialized report text and what went into it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedReport {
    /// Header plus one line per record, joined with `\n`
    pub text: String,
    /// Column names in output order
    pub columns: Vec<String>,
    /// Data rows written
    pub rows: usize,
    /// Rows replaced by the placeholder
    pub failed_rows: usize,
}

/// Serialize records into report text
pub fn render_report(records: &[Record]) -> RenderedReport {
    let columns = collect_columns(records);
    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(columns.join(DELIMITER));

    let mut failed_rows = 0;
    for (index, record) in records.iter().enumerate() {
        match render_row(&columns, record) {
            Ok(line) => lines.push(line),
            Err(e) => {
                warn!(row = index, error = %e, "Failed to render row, writing placeholder");
                failed_rows += 1;
                lines.push(placeholder_row(columns.len()));
            }
        }
    }

    RenderedReport {
        text: lines.join("\n"),
        columns,
        rows: records.len(),
        failed_rows,
    }
}

/// Write `contents` to `path` through a temporary file in the same directory.
///
/// Readers see either the previous file or the complete new one.
pub fn write_atomic(path: &Path, contents: &str) -> OutputResult<PathBuf> {
    let parent = path
        .parent()
        .ok_or_else(|| OutputError::NoParent(path.to_path_buf()))?;
    std::fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;

    let mut temp = NamedTempFile::new_in(parent).map_err(|e| io_error(parent, e))?;
    temp.write_all(contents.as_bytes())
        .map_err(|e| io_error(temp.path(), e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| io_error(temp.path(), e))?;
    temp.persist(path).map_err(|e| io_error(path, e.error))?;

    debug!(path = %path.display(), bytes = contents.len(), "Report written");
    Ok(path.to_path_buf())
}

fn io_error(path: &Path, source: std::io::Error) -> OutputError {
    OutputError::Io {
        path: path.to_path_buf(),
        source,
    }
}
