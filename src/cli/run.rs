//! Run orchestration: resolve → poll → reconcile → download → transform

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};

use super::{CliError, OutputFormat, RunRequest};
use crate::config::ExportConfig;
use crate::downloader::DayDownloader;
use crate::job::{
    reconcile_days, CompletionPoller, DateWindow, DaySet, JobResolver, PollSettings,
};
use crate::output::JobLayout;
use crate::remote::ExportService;
use crate::shutdown::SharedShutdown;
use crate::transform::{ReportBuilder, ReportOutcome};
use crate::ExportJob;

/// Structured result of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    /// Whether the run produced its output
    pub success: bool,
    /// Local job folder, once known
    pub job_folder: Option<String>,
    /// Records in the report
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_count: Option<usize>,
    /// Report location, when one was written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csv_path: Option<String>,
    /// Failure description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Successful run details
struct RunOutcome {
    record_count: usize,
    csv_path: Option<PathBuf>,
}

/// End-to-end pipeline over one export service
pub struct Pipeline {
    config: ExportConfig,
    service: Arc<dyn ExportService>,
    shutdown: Option<SharedShutdown>,
    show_progress: bool,
    force: bool,
}

impl Pipeline {
    /// Pipeline with the given configuration and service
    pub fn new(config: ExportConfig, service: Arc<dyn ExportService>) -> Self {
        Self {
            config,
            service,
            shutdown: None,
            show_progress: false,
            force: false,
        }
    }

    /// Attach a shared shutdown handle for graceful cancellation.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Render a progress bar over days while downloading
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Re-download day files that already exist
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Run the request; every failure is reported in the result, never raised
    pub async fn run(&self, request: &RunRequest) -> RunResult {
        let mut job_folder = None;
        let span = info_span!("run", resource_type = %self.config.resource_type);

        match self.execute(request, &mut job_folder).instrument(span).await {
            Ok(outcome) => RunResult {
                success: true,
                job_folder: job_folder.map(display),
                record_count: Some(outcome.record_count),
                csv_path: outcome.csv_path.map(display),
                error: None,
            },
            Err(e) => {
                error!("Run failed: {}", e);
                RunResult {
                    success: false,
                    job_folder: job_folder.map(display),
                    record_count: None,
                    csv_path: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn execute(
        &self,
        request: &RunRequest,
        job_folder: &mut Option<PathBuf>,
    ) -> Result<RunOutcome, CliError> {
        let (job, window) = self.acquire_job(request).await?;

        let layout = JobLayout::new(&self.config.download_root, job.display_name(), &job.id);
        *job_folder = Some(layout.job_folder().to_path_buf());

        let day_set = reconcile_days(&job.details, window.as_ref());
        log_day_set(&job, &day_set);

        if day_set.is_empty() {
            info!(job_id = %job.id, "Job has no days with data to download");
            return Ok(RunOutcome {
                record_count: 0,
                csv_path: None,
            });
        }

        self.download(&day_set, &layout).await?;

        let outcome = ReportBuilder::new()
            .with_days(day_set.days_to_download.iter().cloned())
            .build(&layout.files_dir(), &layout.report_path())
            .await?;
        let stats = outcome.stats();
        if stats.files_failed > 0 || stats.skipped_lines > 0 {
            warn!(
                files_failed = stats.files_failed,
                skipped_lines = stats.skipped_lines,
                "Some input could not be parsed"
            );
        }

        Ok(match outcome {
            ReportOutcome::NoData(_) => RunOutcome {
                record_count: 0,
                csv_path: None,
            },
            ReportOutcome::Written { path, stats } => RunOutcome {
                record_count: stats.records,
                csv_path: Some(path),
            },
        })
    }

    /// Resolve the job and wait until it has accounted for every expected day
    async fn acquire_job(
        &self,
        request: &RunRequest,
    ) -> Result<(ExportJob, Option<DateWindow>), CliError> {
        let resource = self.config.resource_type.as_str();
        let resolver =
            JobResolver::new(Arc::clone(&self.service)).with_list_limit(self.config.job_list_limit);

        match request {
            RunRequest::ExistingJob { job_id } => {
                let job = resolver.fetch_job(resource, job_id).await?;
                let expected = expected_days(&job);
                let counts = job.completion();
                if counts.is_complete(expected) || counts.is_settled_with_failures(expected) {
                    return Ok((job, None));
                }
                let job = self.wait(resource, &job.id, expected, false).await?;
                Ok((job, None))
            }
            RunRequest::Range { window, name } => {
                let (resolved, created) = resolver
                    .resolve_or_create(
                        resource,
                        &window.start_str(),
                        &window.end_str(),
                        window.len(),
                        name,
                    )
                    .await?;

                let job = if resolved.needs_waiting {
                    self.wait(resource, &resolved.job.id, window.len(), created)
                        .await?
                } else {
                    resolved.job
                };
                Ok((job, Some(*window)))
            }
        }
    }

    async fn wait(
        &self,
        resource: &str,
        job_id: &str,
        expected: u32,
        new_job: bool,
    ) -> Result<ExportJob, CliError> {
        let mut poller = CompletionPoller::new(
            Arc::clone(&self.service),
            PollSettings::from_config(&self.config, new_job),
        );
        if let Some(shutdown) = &self.shutdown {
            poller = poller.with_shutdown(Arc::clone(shutdown));
        }
        let completed = poller.wait_for_completion(resource, job_id, expected).await?;
        info!(
            job_id,
            ticks = completed.ticks,
            elapsed_secs = completed.elapsed.as_secs(),
            "Job ready"
        );
        Ok(completed.job)
    }

    async fn download(&self, day_set: &DaySet, layout: &JobLayout) -> Result<(), CliError> {
        let mut downloader = DayDownloader::from_config(Arc::clone(&self.service), &self.config)?
            .with_skip_existing(!self.force);
        if let Some(shutdown) = &self.shutdown {
            downloader = downloader.with_shutdown(Arc::clone(shutdown));
        }
        let progress = self
            .show_progress
            .then(|| create_progress_bar(day_set.days_to_download.len() as u64));
        if let Some(pb) = &progress {
            downloader = downloader.with_progress(pb.clone());
        }

        let summary = downloader
            .download_days(&day_set.days_to_download, &layout.files_dir())
            .await?;
        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        info!(
            succeeded = summary.succeeded.len(),
            failed = summary.failed.len(),
            mb = summary.total_bytes as f64 / 1_048_576.0,
            mb_per_sec = summary.throughput_bytes_per_sec() / 1_048_576.0,
            "Downloads finished"
        );

        if summary.succeeded.is_empty() && !summary.failed.is_empty() {
            return Err(CliError::AllDownloadsFailed {
                failed: summary.failed.len(),
            });
        }
        if !summary.all_succeeded() {
            warn!(
                "{} of {} days failed to download:",
                summary.failed.len(),
                summary.total_days()
            );
            for line in summary.failure_lines() {
                warn!("  {}", line);
            }
        }
        Ok(())
    }
}

/// Days a job should account for, from its own range; falls back to its buckets
fn expected_days(job: &ExportJob) -> u32 {
    match DateWindow::parse(&job.start_day, &job.end_day) {
        Ok(window) => window.len(),
        Err(_) => {
            let counts = job.completion();
            counts.completed_days + counts.failed_days
        }
    }
}

fn log_day_set(job: &ExportJob, day_set: &DaySet) {
    info!(
        job_id = %job.id,
        to_download = day_set.days_to_download.len(),
        empty = day_set.empty_days_in_range.len(),
        outside_job = day_set.days_outside_job_scope,
        total = day_set.total_days_in_range,
        "Reconciled job days"
    );
    if day_set.days_outside_job_scope > 0 {
        warn!(
            days = day_set.days_outside_job_scope,
            "Some requested days are not covered by the job"
        );
    }
}

fn display(path: PathBuf) -> String {
    path.display().to_string()
}

fn create_progress_bar(days: u64) -> ProgressBar {
    let pb = ProgressBar::new(days);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// Print the run result
pub fn print_result(result: &RunResult, format: OutputFormat) {
    match format {
        OutputFormat::Json => output_json(result),
        OutputFormat::Human => output_human(result),
    }
}

fn output_json(result: &RunResult) {
    match serde_json::to_string(result) {
        Ok(json) => println!("{json}"),
        Err(e) => error!("Failed to serialize result: {}", e),
    }
}

fn output_human(result: &RunResult) {
    if result.success {
        println!("\nExport completed successfully!");
        if let Some(folder) = &result.job_folder {
            println!("Job folder: {folder}");
        }
        match (&result.csv_path, result.record_count) {
            (Some(path), Some(count)) => {
                println!("Report: {path}");
                println!("Records: {count}");
            }
            _ => println!("No records found, no report written"),
        }
    } else {
        eprintln!("\nExport failed!");
        if let Some(folder) = &result.job_folder {
            eprintln!("Job folder: {folder}");
        }
        if let Some(err) = &result.error {
            eprintln!("Error: {err}");
        }
    }
}
