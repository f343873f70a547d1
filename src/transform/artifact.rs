//! Reading one day artifact: gzip-compressed, newline-delimited JSON objects

use flate2::read::GzDecoder;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::TransformError;
use crate::job::reconcile::parse_day;
use crate::output::path::{DAY_FILE_PREFIX, DAY_FILE_SUFFIX};
use crate::Record;

/// Parse errors tolerated per file before the rest of it is skipped
pub const MAX_PARSE_ERRORS_PER_FILE: usize = 100;

/// Day encoded in an artifact file name (`export_<YYYY-MM-DD>.json.gz`)
pub fn day_from_filename(file_name: &str) -> Option<String> {
    let day = file_name
        .strip_prefix(DAY_FILE_PREFIX)?
        .strip_suffix(DAY_FILE_SUFFIX)?;
    parse_day(day).ok()?;
    Some(day.to_string())
}

/// Records read from one artifact
#[derive(Debug, Clone, Default)]
pub struct ParsedArtifact {
    /// Day the artifact belongs to
    pub day: String,
    /// Source file
    pub path: PathBuf,
    /// Parsed records in file order
    pub records: Vec<Record>,
    /// Non-blank lines seen
    pub lines_read: usize,
    /// Lines that were not JSON objects
    pub skipped_lines: usize,
    /// Whether reading stopped at the parse error cap
    pub truncated: bool,
}

/// Decompress and parse one artifact.
///
/// Blank lines are ignored. Lines that are not JSON objects are logged and
/// skipped until `max_parse_errors` is reached, after which the remainder of
/// the file is ignored. Read failures (corrupt gzip, truncated file) fail the
/// whole file.
pub fn parse_artifact(
    path: &Path,
    day: &str,
    max_parse_errors: usize,
) -> Result<ParsedArtifact, TransformError> {
    let file = File::open(path).map_err(|e| TransformError::io(path, e))?;
    let reader = BufReader::new(GzDecoder::new(file));

    let mut parsed = ParsedArtifact {
        day: day.to_string(),
        path: path.to_path_buf(),
        ..ParsedArtifact::default()
    };

    for (index, line) in reader.split(b'\n').enumerate() {
        let line = line.map_err(|e| TransformError::io(path, e))?;
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        parsed.lines_read += 1;

        match serde_json::from_slice::<Value>(&line) {
            Ok(Value::Object(record)) => parsed.records.push(record),
            Ok(other) => {
                parsed.skipped_lines += 1;
                warn!(
                    file = %path.display(),
                    line = index + 1,
                    kind = json_kind(&other),
                    "Skipping line that is not a JSON object"
                );
            }
            Err(e) => {
                parsed.skipped_lines += 1;
                warn!(file = %path.display(), line = index + 1, error = %e, "Skipping invalid JSON line");
            }
        }

        if parsed.skipped_lines >= max_parse_errors {
            parsed.truncated = true;
            warn!(
                file = %path.display(),
                errors = parsed.skipped_lines,
                "Too many parse errors, ignoring the rest of the file"
            );
            break;
        }
    }

    debug!(
        file = %path.display(),
        records = parsed.records.len(),
        skipped = parsed.skipped_lines,
        "Artifact parsed"
    );
    Ok(parsed)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
