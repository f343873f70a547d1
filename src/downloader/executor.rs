//! Day download executor with retry, deadline and cancellation

use crate::config::ExportConfig;
use crate::downloader::config::{
    calculate_backoff, DEFAULT_CONCURRENCY, INITIAL_BACKOFF_MS, MAX_RETRIES,
};
use crate::downloader::{DownloadError, DownloadSummary, DownloadTask};
use crate::metrics::{self, DayDownloadMetrics};
use crate::remote::retry_formatter::{RetryContext, RetryErrorType};
use crate::remote::ExportService;
use crate::shutdown::{SharedShutdown, ShutdownCoordinator};
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use reqwest::{Client, Url};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Default timeout for content requests
const CONTENT_TIMEOUT_SECS: u64 = 300;

/// Content connect timeout
const CONTENT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Downloads day artifacts through a bounded worker pool
pub struct DayDownloader {
    service: Arc<dyn ExportService>,
    content: Client,
    resource_type: String,
    max_retries: u32,
    backoff_base: Duration,
    concurrency: usize,
    deadline: Option<Duration>,
    skip_existing: bool,
    shutdown: Option<SharedShutdown>,
    progress: Option<ProgressBar>,
}

impl DayDownloader {
    /// Create a downloader with default retry and concurrency settings
    pub fn new(
        service: Arc<dyn ExportService>,
        resource_type: impl Into<String>,
    ) -> Result<Self, DownloadError> {
        let content = content_client(Duration::from_secs(CONTENT_TIMEOUT_SECS))?;
        Ok(Self {
            service,
            content,
            resource_type: resource_type.into(),
            max_retries: MAX_RETRIES,
            backoff_base: Duration::from_millis(INITIAL_BACKOFF_MS),
            concurrency: DEFAULT_CONCURRENCY,
            deadline: None,
            skip_existing: false,
            shutdown: None,
            progress: None,
        })
    }

    /// Create a downloader from runtime configuration
    pub fn from_config(
        service: Arc<dyn ExportService>,
        config: &ExportConfig,
    ) -> Result<Self, DownloadError> {
        Ok(Self::new(service, config.resource_type.clone())?
            .with_max_retries(config.max_retries)
            .with_backoff_base(config.backoff_base)
            .with_concurrency(config.concurrency)
            .with_deadline(config.download_deadline))
    }

    /// Set maximum number of retries per day
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the backoff unit
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Set the number of days downloaded at once (at least one)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Cap the wall time of a whole batch
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Keep day files that are already on disk instead of downloading them again
    pub fn with_skip_existing(mut self, skip: bool) -> Self {
        self.skip_existing = skip;
        self
    }

    /// Attach a shared shutdown handle for graceful cancellation.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Advance this bar once per finished day
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Replace the client used for content requests
    pub fn with_content_client(mut self, client: Client) -> Self {
        self.content = client;
        self
    }

    /// Download every day into `files_dir`.
    ///
    /// Per-day failures end up in the summary; only an unusable
    /// `files_dir` fails the call.
    pub async fn download_days(
        &self,
        days: &[String],
        files_dir: &Path,
    ) -> Result<DownloadSummary, DownloadError> {
        tokio::fs::create_dir_all(files_dir)
            .await
            .map_err(|e| DownloadError::io(files_dir, e))?;

        let started = Instant::now();
        let deadline_at = self.deadline.map(|d| started + d);
        info!(
            days = days.len(),
            concurrency = self.concurrency,
            "Downloading day artifacts"
        );

        let tasks: Vec<DownloadTask> = stream::iter(days.iter().cloned())
            .map(|day| {
                let task = DownloadTask::new(day, files_dir);
                let span = info_span!("day", day = %task.day);
                self.run_task(task, deadline_at).instrument(span)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let summary = DownloadSummary::from_tasks(tasks, started.elapsed());
        info!(
            succeeded = summary.succeeded.len(),
            failed = summary.failed.len(),
            total_bytes = summary.total_bytes,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Download batch finished"
        );
        Ok(summary)
    }

    /// Run one day to a terminal outcome, honouring deadline and shutdown
    async fn run_task(&self, mut task: DownloadTask, deadline_at: Option<Instant>) -> DownloadTask {
        let day_metrics = DayDownloadMetrics::start(&task.day);

        if self.skip_existing {
            if let Ok(meta) = tokio::fs::metadata(&task.target).await {
                if meta.is_file() {
                    info!(day = %task.day, bytes = meta.len(), "Day file already present, skipping");
                    task.succeed(meta.len());
                    if let Some(pb) = &self.progress {
                        pb.inc(1);
                    }
                    return task;
                }
            }
        }

        let result = if self.shutdown_requested() {
            Err(DownloadError::Cancelled)
        } else if deadline_at.is_some_and(|d| Instant::now() >= d) {
            Err(DownloadError::DeadlineExceeded)
        } else {
            let work = self.download_day(&mut task);
            tokio::select! {
                result = work => result,
                _ = until_deadline(deadline_at) => Err(DownloadError::DeadlineExceeded),
                _ = until_shutdown(self.shutdown.as_deref()) => Err(DownloadError::Cancelled),
            }
        };

        match result {
            Ok(bytes) => {
                day_metrics.record_success(bytes, task.attempts);
                task.succeed(bytes);
            }
            Err(err) => {
                if matches!(err, DownloadError::DeadlineExceeded | DownloadError::Cancelled) {
                    // Interrupted mid-stream: the partial file is ours to clean up
                    let _ = tokio::fs::remove_file(task.partial_path()).await;
                    warn!(day = %task.day, "{}", err);
                }
                day_metrics.record_failure(err.reason());
                task.fail(&err);
            }
        }

        if let Some(pb) = &self.progress {
            pb.inc(1);
            pb.set_message(task.day.clone());
        }
        task
    }

    /// Attempt a day until it succeeds, hits a non-retryable error or runs out of attempts
    async fn download_day(&self, task: &mut DownloadTask) -> Result<u64, DownloadError> {
        let max_attempts = self.max_retries + 1;

        loop {
            task.attempts += 1;
            let attempt = task.attempts;

            match self.attempt_download(task).await {
                Ok(bytes) => {
                    if attempt > 1 {
                        let ctx = RetryContext::new(
                            attempt,
                            max_attempts,
                            RetryErrorType::NetworkGeneric,
                            Duration::ZERO,
                            &task.day,
                            "",
                        );
                        info!("{}", ctx.format_success());
                    }
                    info!(day = %task.day, bytes, "Day downloaded");
                    return Ok(bytes);
                }
                Err(err) => {
                    let error_type = err.error_type();

                    if attempt >= max_attempts || !err.is_retryable() {
                        let ctx = RetryContext::new(
                            attempt,
                            max_attempts,
                            error_type,
                            Duration::ZERO,
                            &task.day,
                            err.to_string(),
                        );
                        error!("{}", ctx.format_failure());
                        return Err(err);
                    }

                    let backoff = calculate_backoff(self.backoff_base, attempt);
                    let ctx = RetryContext::new(
                        attempt + 1,
                        max_attempts,
                        error_type,
                        backoff,
                        &task.day,
                        err.to_string(),
                    );
                    warn!(error = %err, "{}", ctx.format_retry());
                    metrics::record_retry_backoff(backoff, attempt);
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    /// One attempt: resolve location, stream to `.part`, rename into place
    async fn attempt_download(&self, task: &DownloadTask) -> Result<u64, DownloadError> {
        let url = self
            .service
            .fetch_day_location(&self.resource_type, &task.day)
            .await?;
        debug!(day = %task.day, url = %without_query(&url), "Fetching day content");

        let response = self.content.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::HttpStatus {
                status: status.as_u16(),
                url: without_query(&url),
            });
        }

        let partial = task.partial_path();
        let bytes = match write_body(response, &partial).await {
            Ok(bytes) => bytes,
            Err(err) => {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(err);
            }
        };

        if let Err(e) = tokio::fs::rename(&partial, &task.target).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(DownloadError::io(&task.target, e));
        }
        Ok(bytes)
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(|s| s.is_shutdown_requested())
            .unwrap_or(false)
    }
}

/// Stream a response body to `path` chunk by chunk, then flush and sync
async fn write_body(response: reqwest::Response, path: &Path) -> Result<u64, DownloadError> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| DownloadError::io(path, e))?;

    let mut body = response.bytes_stream();
    let mut written = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(path, e))?;
        written += chunk.len() as u64;
    }

    file.flush().await.map_err(|e| DownloadError::io(path, e))?;
    file.sync_all().await.map_err(|e| DownloadError::io(path, e))?;
    Ok(written)
}

fn content_client(timeout: Duration) -> Result<Client, DownloadError> {
    Ok(Client::builder()
        .connect_timeout(Duration::from_secs(CONTENT_CONNECT_TIMEOUT_SECS))
        .timeout(timeout)
        .build()?)
}

/// Content URLs are usually signed; keep the signature out of logs and errors
fn without_query(url: &Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.to_string()
}

async fn until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn until_shutdown(shutdown: Option<&ShutdownCoordinator>) {
    match shutdown {
        Some(s) => s.wait_for_shutdown().await,
        None => std::future::pending().await,
    }
}
