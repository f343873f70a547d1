//! Report output: on-disk layout and `;`-delimited serialization

pub mod csv;
pub mod path;

pub use csv::{format_cell, render_report, write_atomic, RenderedReport, ROW_ERROR_PLACEHOLDER};
pub use path::{day_file_name, sanitize_folder_name, JobLayout};

/// Output errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// Filesystem failure
    #[error("IO error on {path}: {source}")]
    Io {
        /// File or directory involved
        path: std::path::PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Destination has no parent directory to stage a temporary file in
    #[error("cannot determine parent directory for {0}")]
    NoParent(std::path::PathBuf),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
