//! Runtime configuration
//!
//! Defaults are overridden by environment variables, which are in turn
//! overridden by CLI flags (see [`crate::cli::Cli::apply_overrides`]).

use crate::downloader::config::{
    DEFAULT_CONCURRENCY, DEFAULT_DOWNLOAD_DEADLINE_SECS, INITIAL_BACKOFF_MS, MAX_RETRIES,
};
use crate::remote::Credentials;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default export service endpoint
pub const DEFAULT_BASE_URL: &str = "https://bulkexports.twilio.com";

/// Default resource type exported
pub const DEFAULT_RESOURCE_TYPE: &str = "Messages";

/// HTTP request timeout (seconds) for API and content calls
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Seconds between two job status checks
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

/// Longest time to wait for a job to finish (seconds).
/// Exports of a full month routinely take well over an hour.
pub const DEFAULT_MAX_WAIT_SECS: u64 = 3 * 60 * 60;

/// Delay before the first status check of a freshly created job (seconds).
/// New jobs never finish inside their first minute.
pub const DEFAULT_NEW_JOB_INITIAL_DELAY_SECS: u64 = 60;

/// Number of recent jobs inspected when looking for a reusable one
pub const DEFAULT_JOB_LIST_LIMIT: usize = 50;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable holds a value that does not parse
    #[error("invalid value for {name}: {value:?} ({reason})")]
    InvalidValue {
        /// Variable name
        name: String,
        /// Raw value
        value: String,
        /// Parse failure
        reason: String,
    },
}

/// Settings consumed by every pipeline stage
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Export service base URL
    pub base_url: String,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Retries per day after the first attempt
    pub max_retries: u32,
    /// Root directory for job folders
    pub download_root: PathBuf,
    /// Resource type to export
    pub resource_type: String,
    /// Interval between status checks
    pub poll_interval: Duration,
    /// Maximum total wait for job completion
    pub max_wait: Duration,
    /// Delay before the first status check of a newly created job
    pub new_job_initial_delay: Duration,
    /// Concurrent day downloads
    pub concurrency: usize,
    /// Backoff unit for day retries
    pub backoff_base: Duration,
    /// Wall-clock cap for the whole download phase
    pub download_deadline: Option<Duration>,
    /// Recent jobs inspected when resolving an existing job
    pub job_list_limit: usize,
    /// Optional basic-auth credentials
    pub credentials: Option<Credentials>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_retries: MAX_RETRIES,
            download_root: PathBuf::from("downloads"),
            resource_type: DEFAULT_RESOURCE_TYPE.to_string(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            max_wait: Duration::from_secs(DEFAULT_MAX_WAIT_SECS),
            new_job_initial_delay: Duration::from_secs(DEFAULT_NEW_JOB_INITIAL_DELAY_SECS),
            concurrency: DEFAULT_CONCURRENCY,
            backoff_base: Duration::from_millis(INITIAL_BACKOFF_MS),
            download_deadline: Some(Duration::from_secs(DEFAULT_DOWNLOAD_DEADLINE_SECS)),
            job_list_limit: DEFAULT_JOB_LIST_LIMIT,
            credentials: None,
        }
    }
}

impl ExportConfig {
    /// Build configuration from defaults and the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("BULK_EXPORT_BASE_URL") {
            config.base_url = url;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "BULK_EXPORT_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = parse_var::<u32, _>(&lookup, "BULK_EXPORT_MAX_RETRIES")? {
            config.max_retries = retries;
        }
        if let Some(root) = lookup("BULK_EXPORT_DOWNLOAD_ROOT") {
            config.download_root = PathBuf::from(root);
        }
        if let Some(resource) = lookup("BULK_EXPORT_RESOURCE_TYPE") {
            config.resource_type = resource;
        }
        if let Some(secs) = parse_nonzero(&lookup, "BULK_EXPORT_POLL_INTERVAL_SECS")? {
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "BULK_EXPORT_MAX_WAIT_SECS")? {
            config.max_wait = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "BULK_EXPORT_INITIAL_DELAY_SECS")? {
            config.new_job_initial_delay = Duration::from_secs(secs);
        }
        if let Some(concurrency) = parse_nonzero(&lookup, "BULK_EXPORT_CONCURRENCY")? {
            config.concurrency = concurrency as usize;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "BULK_EXPORT_BACKOFF_MS")? {
            config.backoff_base = Duration::from_millis(ms);
        }
        // 0 disables the download deadline
        if let Some(secs) = parse_var::<u64, _>(&lookup, "BULK_EXPORT_DOWNLOAD_DEADLINE_SECS")? {
            config.download_deadline = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(limit) = parse_nonzero(&lookup, "BULK_EXPORT_JOB_LIST_LIMIT")? {
            config.job_list_limit = limit as usize;
        }

        let username = lookup("BULK_EXPORT_USERNAME");
        let password = lookup("BULK_EXPORT_PASSWORD");
        if let (Some(username), Some(password)) = (username, password) {
            config.credentials = Some(Credentials { username, password });
        }

        Ok(config)
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                name: name.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}

fn parse_nonzero<F>(lookup: &F, name: &str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match parse_var::<u64, _>(lookup, name)? {
        Some(0) => Err(ConfigError::InvalidValue {
            name: name.to_string(),
            value: "0".to_string(),
            reason: "must be at least 1".to_string(),
        }),
        other => Ok(other),
    }
}
