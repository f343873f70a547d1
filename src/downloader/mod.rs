//! Concurrent day downloads
//!
//! Fetches one compressed artifact per day with bounded retries and fans the
//! days out over a bounded worker pool.
//!
//! # Overview
//!
//! 1. **Tasks**: one [`task::DownloadTask`] per day, owning its target path
//! 2. **Execution**: [`executor::DayDownloader`] resolves each day's content
//!    location, streams it to a `.part` file and renames it into place
//! 3. **Summary**: [`task::DownloadSummary`] aggregates successes and failures
//!
//! # Quick Start
//!
//! ```no_run
//! use bulk_export_report::downloader::DayDownloader;
//! use bulk_export_report::remote::HttpExportClient;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = Arc::new(HttpExportClient::new(
//!     "https://bulkexports.example.com",
//!     std::time::Duration::from_secs(30),
//!     None,
//! )?);
//! let downloader = DayDownloader::new(service, "Messages")?.with_concurrency(4);
//! let days = vec!["2025-04-01".to_string(), "2025-04-02".to_string()];
//! let summary = downloader.download_days(&days, Path::new("downloads/april/files")).await?;
//! println!("{} of {} days downloaded", summary.succeeded.len(), days.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! A failing day never aborts its siblings. Per-day errors are collected in
//! the summary; only failing to create the target directory is fatal for the
//! whole batch.

pub mod config;
pub mod executor;
pub mod task;

pub use executor::DayDownloader;
pub use task::{DayOutcome, DownloadSummary, DownloadTask, DownloadedDay, FailedDay};

use crate::remote::retry_formatter::RetryErrorType;
use crate::remote::RemoteServiceError;
use std::path::PathBuf;

/// Download errors
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// Content location could not be resolved
    #[error("{0}")]
    Remote(#[from] RemoteServiceError),

    /// Content request answered with a non-success status
    #[error("content request to {url} returned HTTP {status}")]
    HttpStatus {
        /// Response status
        status: u16,
        /// Content URL without its query string
        url: String,
    },

    /// Transport failure while requesting or streaming content
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Local filesystem failure
    #[error("IO error on {path}: {source}")]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Overall download deadline passed before the day finished
    #[error("download deadline exceeded")]
    DeadlineExceeded,

    /// Shutdown requested before the day finished
    #[error("cancelled by shutdown request")]
    Cancelled,
}

impl DownloadError {
    /// Wrap an IO error with the path it concerns
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Classification used for retry messages
    pub fn error_type(&self) -> RetryErrorType {
        match self {
            Self::Remote(err) => RetryErrorType::from_remote(err),
            Self::HttpStatus { status, .. } => RetryErrorType::from_status(*status),
            Self::Network(err) => RetryErrorType::from_reqwest(err),
            Self::Io { .. } => RetryErrorType::LocalIo,
            Self::DeadlineExceeded | Self::Cancelled => RetryErrorType::NetworkGeneric,
        }
    }

    /// Whether another attempt at the same day can succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::DeadlineExceeded | Self::Cancelled => false,
            _ => self.error_type().is_retryable(),
        }
    }

    /// Short label for metrics
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Remote(_) => "remote",
            Self::HttpStatus { .. } => "http_status",
            Self::Network(_) => "network",
            Self::Io { .. } => "io",
            Self::DeadlineExceeded => "deadline",
            Self::Cancelled => "cancelled",
        }
    }
}
