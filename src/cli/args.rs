//! Command line arguments

use crate::config::ExportConfig;
use crate::job::DateWindow;
use chrono::{Duration as ChronoDuration, NaiveDate};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::CliError;

/// Maximum allowed concurrency
const MAX_CONCURRENCY: usize = 32;

/// Days covered by `--week`
pub const WEEK_DAYS: u32 = 7;

/// Days covered by `--month`
pub const MONTH_DAYS: u32 = 30;

/// Parse and validate concurrency value
fn parse_concurrency(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if value == 0 {
        return Err("concurrency must be at least 1".to_string());
    }
    if value > MAX_CONCURRENCY {
        return Err(format!(
            "concurrency {value} exceeds maximum of {MAX_CONCURRENCY}"
        ));
    }
    Ok(value)
}

/// Output format of the run result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

/// Bulk export report CLI
#[derive(Parser, Debug)]
#[command(name = "bulk-export-report")]
#[command(
    about = "Download a bulk export job's day files and merge them into one CSV report",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    /// Export job id, or the first day (YYYY-MM-DD) of a range
    pub target: Option<String>,

    /// Last day (YYYY-MM-DD) of a range
    pub end: Option<String>,

    /// The 7 days ending yesterday
    #[arg(long, conflicts_with_all = ["month", "target", "end"])]
    pub week: bool,

    /// The 30 days ending yesterday
    #[arg(long, conflicts_with_all = ["week", "target", "end"])]
    pub month: bool,

    /// Job name used when a new job is created (ranges only)
    #[arg(long)]
    pub name: Option<String>,

    /// Output format (json or human)
    #[arg(long, default_value = "human")]
    pub output_format: OutputFormat,

    /// Export service base URL
    #[arg(long)]
    pub base_url: Option<String>,

    /// HTTP request timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Retries per day after the first attempt (0-20)
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=20))]
    pub max_retries: Option<u32>,

    /// Root directory for job folders
    #[arg(long)]
    pub download_root: Option<PathBuf>,

    /// Resource type to export (e.g. Messages, Calls)
    #[arg(long)]
    pub resource_type: Option<String>,

    /// Number of days downloaded at once (max: 32)
    #[arg(long, value_parser = parse_concurrency)]
    pub concurrency: Option<usize>,

    /// Seconds between job status checks
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval_secs: Option<u64>,

    /// Give up waiting for the job after this many seconds
    #[arg(long)]
    pub max_wait_secs: Option<u64>,

    /// Seconds to wait before the first status check of a new job
    #[arg(long)]
    pub initial_delay_secs: Option<u64>,

    /// Backoff unit in milliseconds for day retries
    #[arg(long)]
    pub backoff_ms: Option<u64>,

    /// Wall-clock limit for the download phase in seconds (0 disables it)
    #[arg(long)]
    pub download_deadline_secs: Option<u64>,

    /// Re-download day files that already exist locally
    #[arg(long, default_value_t = false)]
    pub force: bool,

    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9090)
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,
}

/// What the user asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunRequest {
    /// Process an existing job as-is
    ExistingJob {
        /// Job identifier
        job_id: String,
    },
    /// Reuse or create a job for a window
    Range {
        /// Requested days
        window: DateWindow,
        /// Name for a newly created job
        name: String,
    },
}

impl Cli {
    /// Apply flag values on top of environment configuration
    pub fn apply_overrides(&self, config: &mut ExportConfig) {
        if let Some(url) = &self.base_url {
            config.base_url = url.clone();
        }
        if let Some(secs) = self.timeout_secs {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = self.max_retries {
            config.max_retries = retries;
        }
        if let Some(root) = &self.download_root {
            config.download_root = root.clone();
        }
        if let Some(resource) = &self.resource_type {
            config.resource_type = resource.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(secs) = self.poll_interval_secs {
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = self.max_wait_secs {
            config.max_wait = Duration::from_secs(secs);
        }
        if let Some(secs) = self.initial_delay_secs {
            config.new_job_initial_delay = Duration::from_secs(secs);
        }
        if let Some(ms) = self.backoff_ms {
            config.backoff_base = Duration::from_millis(ms);
        }
        if let Some(secs) = self.download_deadline_secs {
            config.download_deadline = (secs > 0).then(|| Duration::from_secs(secs));
        }
    }

    /// Work out the request; relative windows end the day before `today`
    pub fn request(&self, today: NaiveDate) -> Result<RunRequest, CliError> {
        let relative = if self.week {
            Some(WEEK_DAYS)
        } else if self.month {
            Some(MONTH_DAYS)
        } else {
            None
        };

        let window = match (relative, &self.target, &self.end) {
            (Some(days), _, _) => {
                let yesterday = today - ChronoDuration::days(1);
                DateWindow::ending_on(yesterday, days)?
            }
            (None, Some(start), Some(end)) => DateWindow::parse(start, end)?,
            (None, Some(job_id), None) => {
                if self.name.is_some() {
                    return Err(CliError::InvalidArgument(
                        "--name only applies to date ranges".to_string(),
                    ));
                }
                return Ok(RunRequest::ExistingJob {
                    job_id: job_id.trim().to_string(),
                });
            }
            (None, None, _) => {
                return Err(CliError::InvalidArgument(
                    "expected a job id, a <start> <end> range, --week or --month".to_string(),
                ))
            }
        };

        let name = match &self.name {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => format!("export_{}_{}", window.start_str(), window.end_str()),
        };
        Ok(RunRequest::Range { window, name })
    }
}
