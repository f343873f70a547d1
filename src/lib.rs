//! # Bulk Export Report Library
//!
//! Acquires the per-day artifacts of a remote bulk-export job and merges them
//! into a single `;`-delimited CSV report.
//!
//! ## Features
//!
//! - **Job Resolution**: Reuses an existing export job for a date range or submits a new one
//! - **Completion Polling**: Waits for the remote service to finish every requested day
//! - **Concurrent Downloads**: Bounded worker pool with per-day retries and exponential backoff
//! - **Deterministic Transform**: Streaming gzip decode, NDJSON parse, stable day ordering
//! - **Spreadsheet-Friendly Output**: Formula-quoted phone columns and decimal-comma prices
//!
//! ## Quick Start
//!
//! ```no_run
//! use bulk_export_report::config::ExportConfig;
//! use bulk_export_report::job::{reconcile_days, DateWindow, JobResolver};
//! use bulk_export_report::remote::HttpExportClient;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ExportConfig::from_env()?;
//! let service = Arc::new(HttpExportClient::from_config(&config)?);
//! let window = DateWindow::parse("2025-04-01", "2025-04-07")?;
//!
//! let resolver = JobResolver::new(service);
//! if let Some(found) = resolver
//!     .find_existing_job("Messages", &window.start_str(), &window.end_str(), window.len())
//!     .await?
//! {
//!     let days = reconcile_days(&found.job.details, Some(&window));
//!     println!("{} days to download", days.days_to_download.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`remote`] - Export service contract and its HTTP implementation
//! - [`job`] - Day set reconciliation, job resolution and completion polling
//! - [`downloader`] - Concurrent per-day artifact downloads
//! - [`transform`] - Decompress, parse, merge and sort records
//! - [`output`] - Filesystem layout and report serialization
//! - [`cli`] - Command line surface and run orchestration

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};

/// CLI command implementations
pub mod cli;

/// Runtime configuration
pub mod config;

/// Concurrent day downloads
pub mod downloader;

/// Job resolution, polling and day reconciliation
pub mod job;

/// Metrics collection
pub mod metrics;

/// Report layout and serialization
pub mod output;

/// Remote export service client
pub mod remote;

/// Graceful shutdown coordination shared across stages
pub mod shutdown;

/// Record transform pipeline
pub mod transform;

/// One exported record: field name to JSON value, in source order
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Processing status the export service reports for a bucket of days
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DayStatus {
    /// Day exported and has data
    Completed,
    /// Day exported but contained no records
    CompletedEmptyRecords,
    /// Day export failed on the remote side
    Failed,
    /// Day queued but not started
    Pending,
    /// Day currently being exported
    InProgress,
    /// Any status this crate does not know about (raw tag kept)
    Unknown(String),
}

impl DayStatus {
    /// Whether the service is done with days in this bucket (with or without data)
    pub fn is_completed(&self) -> bool {
        matches!(self, DayStatus::Completed | DayStatus::CompletedEmptyRecords)
    }
}

impl From<String> for DayStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Completed" => DayStatus::Completed,
            "CompletedEmptyRecords" => DayStatus::CompletedEmptyRecords,
            "Failed" => DayStatus::Failed,
            "Pending" => DayStatus::Pending,
            "InProgress" => DayStatus::InProgress,
            _ => DayStatus::Unknown(s),
        }
    }
}

impl From<DayStatus> for String {
    fn from(status: DayStatus) -> Self {
        status.to_string()
    }
}

impl std::fmt::Display for DayStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DayStatus::Completed => "Completed",
            DayStatus::CompletedEmptyRecords => "CompletedEmptyRecords",
            DayStatus::Failed => "Failed",
            DayStatus::Pending => "Pending",
            DayStatus::InProgress => "InProgress",
            DayStatus::Unknown(raw) => raw.as_str(),
        };
        write!(f, "{s}")
    }
}

/// One status bucket reported for a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayDetail {
    /// Bucket status
    pub status: DayStatus,
    /// Number of days in this bucket
    #[serde(default)]
    pub count: u32,
    /// Explicit day strings (`YYYY-MM-DD`), when the service lists them
    #[serde(default)]
    pub days: Option<Vec<String>>,
}

impl DayDetail {
    /// Build a bucket with an explicit day list; count follows the list length
    pub fn with_days(status: DayStatus, days: &[&str]) -> Self {
        Self {
            status,
            count: days.len() as u32,
            days: Some(days.iter().map(|d| d.to_string()).collect()),
        }
    }

    /// Days listed in this bucket, empty when the service only sent a count
    pub fn day_list(&self) -> &[String] {
        self.days.as_deref().unwrap_or(&[])
    }
}

/// Export job snapshot as reported by the remote service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportJob {
    /// Unique job identifier
    #[serde(rename = "job_sid")]
    pub id: String,
    /// Human-readable job name
    #[serde(default)]
    pub friendly_name: String,
    /// Resource type the job exports (e.g. "Messages")
    #[serde(default)]
    pub resource_type: String,
    /// First requested day, inclusive (`YYYY-MM-DD`)
    pub start_day: String,
    /// Last requested day, inclusive (`YYYY-MM-DD`)
    pub end_day: String,
    /// Per-status day buckets
    #[serde(default)]
    pub details: Vec<DayDetail>,
    /// Position in the service's job queue, if reported
    #[serde(default)]
    pub job_queue_position: Option<String>,
    /// Service estimate of completion time, if reported
    #[serde(default)]
    pub estimated_completion_time: Option<String>,
}

impl ExportJob {
    /// Tally the day buckets into completion counts
    pub fn completion(&self) -> CompletionCounts {
        CompletionCounts::from_details(&self.details)
    }

    /// Name used for the local job folder; falls back to the job id
    pub fn display_name(&self) -> &str {
        if self.friendly_name.trim().is_empty() {
            &self.id
        } else {
            &self.friendly_name
        }
    }
}

/// Day counts derived from a job's status buckets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompletionCounts {
    /// Days done, with or without data
    pub completed_days: u32,
    /// Days done with data
    pub days_with_data: u32,
    /// Days done without records
    pub empty_days: u32,
    /// Days the service failed to export
    pub failed_days: u32,
}

impl CompletionCounts {
    /// Sum bucket counts by status
    pub fn from_details(details: &[DayDetail]) -> Self {
        let mut counts = Self::default();
        for detail in details {
            match detail.status {
                DayStatus::Completed => {
                    counts.days_with_data += detail.count;
                    counts.completed_days += detail.count;
                }
                DayStatus::CompletedEmptyRecords => {
                    counts.empty_days += detail.count;
                    counts.completed_days += detail.count;
                }
                DayStatus::Failed => counts.failed_days += detail.count,
                _ => {}
            }
        }
        counts
    }

    /// All expected days are done
    pub fn is_complete(&self, expected_days: u32) -> bool {
        self.completed_days >= expected_days
    }

    /// Every expected day is either done or failed, and at least one failed
    pub fn is_settled_with_failures(&self, expected_days: u32) -> bool {
        self.failed_days > 0 && self.completed_days + self.failed_days >= expected_days
    }
}
