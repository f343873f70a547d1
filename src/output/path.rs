//! Filesystem layout of a job
//!
//! ```text
//! <root>/<sanitized-job-name>/
//! ├── files/
//! │   ├── export_2025-04-01.json.gz
//! │   └── export_2025-04-02.json.gz
//! └── export.csv
//! ```

use std::path::{Path, PathBuf};

/// Subdirectory holding the day artifacts
pub const FILES_DIR: &str = "files";

/// Report file name
pub const REPORT_FILE: &str = "export.csv";

/// Artifact file prefix
pub const DAY_FILE_PREFIX: &str = "export_";

/// Artifact file suffix
pub const DAY_FILE_SUFFIX: &str = ".json.gz";

/// Artifact file name for a day
pub fn day_file_name(day: &str) -> String {
    format!("{DAY_FILE_PREFIX}{day}{DAY_FILE_SUFFIX}")
}

/// Make a job name safe to use as a single directory name.
///
/// Characters outside `[A-Za-z0-9_-]` become `_`, then runs of `_` collapse.
pub fn sanitize_folder_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let c = if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            c
        } else {
            '_'
        };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    out
}

/// Paths for one job below the download root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobLayout {
    job_folder: PathBuf,
}

impl JobLayout {
    /// Layout for a job name; an unusable name falls back to the job id
    pub fn new(root: &Path, job_name: &str, job_id: &str) -> Self {
        let mut folder = sanitize_folder_name(job_name);
        if folder.trim_matches('_').is_empty() {
            folder = sanitize_folder_name(job_id);
        }
        Self {
            job_folder: root.join(folder),
        }
    }

    /// `<root>/<name>`
    pub fn job_folder(&self) -> &Path {
        &self.job_folder
    }

    /// `<root>/<name>/files`
    pub fn files_dir(&self) -> PathBuf {
        self.job_folder.join(FILES_DIR)
    }

    /// `<root>/<name>/export.csv`
    pub fn report_path(&self) -> PathBuf {
        self.job_folder.join(REPORT_FILE)
    }

    /// `<root>/<name>/files/export_<day>.json.gz`
    pub fn day_file(&self, day: &str) -> PathBuf {
        self.files_dir().join(day_file_name(day))
    }
}
