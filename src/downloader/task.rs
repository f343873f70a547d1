//! Day download tasks and the batch summary

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::config::{MAX_FAILED_DAYS_DISPLAYED, PARTIAL_SUFFIX};
use super::DownloadError;
use crate::output::path::day_file_name;

/// Terminal result of one day
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayOutcome {
    /// Artifact written; size in bytes
    Downloaded {
        /// Bytes written
        bytes: u64,
    },
    /// Every attempt failed, or the day was interrupted
    Failed {
        /// Last error message
        error: String,
        /// Metrics label of the last error
        reason: &'static str,
    },
}

/// One day pending retrieval
#[derive(Debug, Clone)]
pub struct DownloadTask {
    /// Day string (`YYYY-MM-DD`)
    pub day: String,
    /// Final artifact path
    pub target: PathBuf,
    /// Attempts made so far
    pub attempts: u32,
    /// Set once the day is finished
    pub outcome: Option<DayOutcome>,
}

impl DownloadTask {
    /// Task for `day` writing into `files_dir`
    pub fn new(day: impl Into<String>, files_dir: &Path) -> Self {
        let day = day.into();
        let target = files_dir.join(day_file_name(&day));
        Self {
            day,
            target,
            attempts: 0,
            outcome: None,
        }
    }

    /// Path the artifact is streamed to before the final rename
    pub fn partial_path(&self) -> PathBuf {
        let mut name = self.target.clone().into_os_string();
        name.push(PARTIAL_SUFFIX);
        PathBuf::from(name)
    }

    /// Mark the task as downloaded
    pub fn succeed(&mut self, bytes: u64) {
        self.outcome = Some(DayOutcome::Downloaded { bytes });
    }

    /// Mark the task as failed with its last error
    pub fn fail(&mut self, error: &DownloadError) {
        self.outcome = Some(DayOutcome::Failed {
            error: error.to_string(),
            reason: error.reason(),
        });
    }
}

/// A day that was downloaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedDay {
    /// Day string
    pub day: String,
    /// Artifact path
    pub path: PathBuf,
    /// Bytes written
    pub bytes: u64,
    /// Attempts it took
    pub attempts: u32,
}

/// A day that could not be downloaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedDay {
    /// Day string
    pub day: String,
    /// Last error message
    pub error: String,
    /// Attempts made
    pub attempts: u32,
}

/// Result of a download batch
#[derive(Debug, Clone, Default)]
pub struct DownloadSummary {
    /// Downloaded days, ascending by day
    pub succeeded: Vec<DownloadedDay>,
    /// Failed days, ascending by day
    pub failed: Vec<FailedDay>,
    /// Bytes written across all days
    pub total_bytes: u64,
    /// Wall time of the batch
    pub elapsed: Duration,
}

impl DownloadSummary {
    /// Build a summary from finished tasks
    pub fn from_tasks(tasks: Vec<DownloadTask>, elapsed: Duration) -> Self {
        let mut summary = Self {
            elapsed,
            ..Self::default()
        };

        for task in tasks {
            match task.outcome {
                Some(DayOutcome::Downloaded { bytes }) => {
                    summary.total_bytes += bytes;
                    summary.succeeded.push(DownloadedDay {
                        day: task.day,
                        path: task.target,
                        bytes,
                        attempts: task.attempts,
                    });
                }
                Some(DayOutcome::Failed { error, .. }) => summary.failed.push(FailedDay {
                    day: task.day,
                    error,
                    attempts: task.attempts,
                }),
                None => summary.failed.push(FailedDay {
                    day: task.day,
                    error: "download did not finish".to_string(),
                    attempts: task.attempts,
                }),
            }
        }

        summary.succeeded.sort_by(|a, b| a.day.cmp(&b.day));
        summary.failed.sort_by(|a, b| a.day.cmp(&b.day));
        summary
    }

    /// Days attempted
    pub fn total_days(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// Whether no day failed
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    /// Average throughput in bytes per second
    pub fn throughput_bytes_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.total_bytes as f64 / secs
        } else {
            0.0
        }
    }

    /// Failure lines for display, capped, with a trailing "... and N more"
    pub fn failure_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .failed
            .iter()
            .take(MAX_FAILED_DAYS_DISPLAYED)
            .map(|f| format!("{} ({} attempt(s)): {}", f.day, f.attempts, f.error))
            .collect();
        if self.failed.len() > MAX_FAILED_DAYS_DISPLAYED {
            lines.push(format!(
                "... and {} more",
                self.failed.len() - MAX_FAILED_DAYS_DISPLAYED
            ));
        }
        lines
    }
}
