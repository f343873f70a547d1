//! CLI error types and conversions

use crate::config::ConfigError;
use crate::downloader::DownloadError;
use crate::job::JobError;
use crate::remote::RemoteServiceError;
use crate::transform::TransformError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Export service error outside the job lifecycle
    #[error("remote service error: {0}")]
    Remote(#[from] RemoteServiceError),

    /// Job resolution, polling or validation error
    #[error("{0}")]
    Job(#[from] JobError),

    /// Download setup error
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// Report build error
    #[error("transform error: {0}")]
    Transform(#[from] TransformError),

    /// Every day to download failed
    #[error("all {failed} day downloads failed")]
    AllDownloadsFailed {
        /// Days that failed
        failed: usize,
    },

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
