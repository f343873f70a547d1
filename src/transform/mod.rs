//! Record transform pipeline
//!
//! Turns a directory of day artifacts into the final report:
//!
//! 1. list `export_<day>.json.gz` files, in file name order
//! 2. decompress and parse each on the blocking pool ([`artifact`])
//! 3. merge in file name order, then stable-sort by day
//! 4. render and atomically write the report ([`crate::output::csv`])

use futures::future::join_all;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{info, info_span, warn, Instrument};

use crate::metrics;
use crate::output::csv::{render_report, write_atomic};
use crate::output::OutputError;
use crate::Record;

pub mod artifact;

pub use artifact::{day_from_filename, parse_artifact, ParsedArtifact, MAX_PARSE_ERRORS_PER_FILE};

/// Transform errors
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    /// Reading an artifact or the artifact directory failed
    #[error("IO error on {path}: {source}")]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Writing the report failed
    #[error("output error: {0}")]
    Output(#[from] OutputError),

    /// A blocking worker panicked or was cancelled
    #[error("worker task failed: {0}")]
    Worker(String),
}

impl TransformError {
    /// Wrap an IO error with the path it concerns
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Counters describing one transform run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformStats {
    /// Artifacts parsed successfully
    pub files_parsed: usize,
    /// Artifacts that could not be read
    pub files_failed: usize,
    /// Files ignored because their name is not an artifact name
    pub files_ignored: usize,
    /// Artifacts left out because their day is not part of this run
    pub files_outside_days: usize,
    /// Records in the report
    pub records: usize,
    /// Lines skipped as invalid
    pub skipped_lines: usize,
    /// Report columns
    pub columns: usize,
    /// Rows replaced by the placeholder
    pub failed_rows: usize,
}

/// What a transform run produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    /// No records survived; nothing was written
    NoData(TransformStats),
    /// Report written to `path`
    Written {
        /// Report location
        path: PathBuf,
        /// Run counters
        stats: TransformStats,
    },
}

impl ReportOutcome {
    /// Counters of the run
    pub fn stats(&self) -> &TransformStats {
        match self {
            Self::NoData(stats) => stats,
            Self::Written { stats, .. } => stats,
        }
    }

    /// Report path, when one was written
    pub fn report_path(&self) -> Option<&Path> {
        match self {
            Self::NoData(_) => None,
            Self::Written { path, .. } => Some(path),
        }
    }
}

/// Merge parsed artifacts (already in file name order) and stable-sort by day
pub fn merge_by_day(artifacts: Vec<ParsedArtifact>) -> Vec<Record> {
    let mut tagged: Vec<(String, Record)> = artifacts
        .into_iter()
        .flat_map(|artifact| {
            let day = artifact.day;
            artifact
                .records
                .into_iter()
                .map(move |record| (day.clone(), record))
        })
        .collect();

    tagged.sort_by(|a, b| a.0.cmp(&b.0));
    tagged.into_iter().map(|(_, record)| record).collect()
}

/// Artifacts in `files_dir` as `(day, path)`, sorted by file name
async fn list_artifacts(
    files_dir: &Path,
    days: Option<&BTreeSet<String>>,
    stats: &mut TransformStats,
) -> Result<Vec<(String, PathBuf)>, TransformError> {
    let mut entries = tokio::fs::read_dir(files_dir)
        .await
        .map_err(|e| TransformError::io(files_dir, e))?;

    let mut found = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| TransformError::io(files_dir, e))?
    {
        let path = entry.path();
        let is_file = entry
            .file_type()
            .await
            .map(|t| t.is_file())
            .unwrap_or(false);
        if !is_file {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy().into_owned();
        match day_from_filename(&file_name) {
            Some(day) if days.is_some_and(|wanted| !wanted.contains(&day)) => {
                stats.files_outside_days += 1;
                warn!(file = %path.display(), "Ignoring artifact for a day outside this run");
            }
            Some(day) => found.push((file_name, day, path)),
            None => {
                stats.files_ignored += 1;
                warn!(file = %path.display(), "Ignoring file that is not a day artifact");
            }
        }
    }

    found.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(found.into_iter().map(|(_, day, path)| (day, path)).collect())
}

/// Builds the report from a directory of artifacts
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    max_parse_errors: usize,
    days: Option<BTreeSet<String>>,
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self {
            max_parse_errors: MAX_PARSE_ERRORS_PER_FILE,
            days: None,
        }
    }
}

impl ReportBuilder {
    /// Builder with the default parse error cap
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the per-file parse error cap
    pub fn with_max_parse_errors(mut self, max: usize) -> Self {
        self.max_parse_errors = max.max(1);
        self
    }

    /// Only merge artifacts for these days; others in the directory are skipped
    pub fn with_days<I, S>(mut self, days: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.days = Some(days.into_iter().map(Into::into).collect());
        self
    }

    /// Parse every artifact in `files_dir` and write the report to `report_path`
    pub async fn build(
        &self,
        files_dir: &Path,
        report_path: &Path,
    ) -> Result<ReportOutcome, TransformError> {
        let span = info_span!("transform", dir = %files_dir.display());
        self.build_inner(files_dir, report_path).instrument(span).await
    }

    async fn build_inner(
        &self,
        files_dir: &Path,
        report_path: &Path,
    ) -> Result<ReportOutcome, TransformError> {
        let mut stats = TransformStats::default();
        let artifacts = list_artifacts(files_dir, self.days.as_ref(), &mut stats).await?;
        info!(files = artifacts.len(), "Parsing day artifacts");

        let handles = artifacts.into_iter().map(|(day, path)| {
            let max_errors = self.max_parse_errors;
            tokio::task::spawn_blocking(move || parse_artifact(&path, &day, max_errors))
        });

        let mut parsed = Vec::new();
        for joined in join_all(handles).await {
            match joined {
                Ok(Ok(artifact)) => {
                    stats.files_parsed += 1;
                    stats.skipped_lines += artifact.skipped_lines;
                    parsed.push(artifact);
                }
                Ok(Err(e)) => {
                    stats.files_failed += 1;
                    warn!(error = %e, "Skipping unreadable artifact");
                }
                Err(e) => return Err(TransformError::Worker(e.to_string())),
            }
        }

        let records = merge_by_day(parsed);
        stats.records = records.len();
        metrics::record_transform(stats.records as u64, stats.skipped_lines as u64);

        if records.is_empty() {
            info!("No records found, report not written");
            return Ok(ReportOutcome::NoData(stats));
        }

        let path = report_path.to_path_buf();
        let (rendered, written) = tokio::task::spawn_blocking(move || {
            let rendered = render_report(&records);
            let written = write_atomic(&path, &rendered.text);
            (rendered, written)
        })
        .await
        .map_err(|e| TransformError::Worker(e.to_string()))?;
        let path = written?;

        stats.columns = rendered.columns.len();
        stats.failed_rows = rendered.failed_rows;
        info!(
            path = %path.display(),
            records = stats.records,
            columns = stats.columns,
            "Report written"
        );
        Ok(ReportOutcome::Written { path, stats })
    }
}

/// Build the report with default settings
pub async fn build_report(
    files_dir: &Path,
    report_path: &Path,
) -> Result<ReportOutcome, TransformError> {
    ReportBuilder::new().build(files_dir, report_path).await
}
