//! Finding or creating the export job for a date range

use std::sync::Arc;
use tracing::{debug, info};

use super::JobError;
use crate::config::DEFAULT_JOB_LIST_LIMIT;
use crate::remote::ExportService;
use crate::{CompletionCounts, ExportJob};

/// A job matched to a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedJob {
    /// Job snapshot
    pub job: ExportJob,
    /// Whether the job still has days to finish
    pub needs_waiting: bool,
    /// Day counts at resolution time
    pub completion: CompletionCounts,
}

impl ResolvedJob {
    fn new(job: ExportJob, expected_days: u32) -> Self {
        let completion = job.completion();
        Self {
            needs_waiting: !completion.is_complete(expected_days),
            completion,
            job,
        }
    }
}

/// Wraps the export service's job listing and creation calls
#[derive(Clone)]
pub struct JobResolver {
    service: Arc<dyn ExportService>,
    list_limit: usize,
}

fn require(name: &str, value: &str) -> Result<(), JobError> {
    if value.trim().is_empty() {
        return Err(JobError::Validation(format!("{name} must not be empty")));
    }
    Ok(())
}

impl JobResolver {
    /// Resolver over an export service
    pub fn new(service: Arc<dyn ExportService>) -> Self {
        Self {
            service,
            list_limit: DEFAULT_JOB_LIST_LIMIT,
        }
    }

    /// Inspect this many recent jobs when looking for a match
    pub fn with_list_limit(mut self, limit: usize) -> Self {
        self.list_limit = limit.max(1);
        self
    }

    /// First recent job whose own range is exactly `start..=end`
    pub async fn find_existing_job(
        &self,
        resource_type: &str,
        start: &str,
        end: &str,
        expected_days: u32,
    ) -> Result<Option<ResolvedJob>, JobError> {
        let jobs = self
            .service
            .list_jobs(resource_type, self.list_limit)
            .await
            .map_err(|e| e.with_context(format!("looking for an existing {start}..{end} job")))?;
        debug!(candidates = jobs.len(), start, end, "Searching existing jobs");

        let found = jobs
            .into_iter()
            .find(|job| job.start_day == start && job.end_day == end)
            .map(|job| ResolvedJob::new(job, expected_days));

        match &found {
            Some(resolved) => info!(
                job_id = %resolved.job.id,
                completed = resolved.completion.completed_days,
                expected = expected_days,
                needs_waiting = resolved.needs_waiting,
                "Found existing export job"
            ),
            None => info!(start, end, "No existing export job for this range"),
        }
        Ok(found)
    }

    /// Submit a new job for `start..=end`
    pub async fn create_export_job(
        &self,
        resource_type: &str,
        start: &str,
        end: &str,
        friendly_name: &str,
    ) -> Result<ExportJob, JobError> {
        require("resource type", resource_type)?;
        require("start day", start)?;
        require("end day", end)?;
        require("job name", friendly_name)?;

        let job = self
            .service
            .create_job(resource_type, start, end, friendly_name)
            .await
            .map_err(|e| e.with_context(format!("creating export job {friendly_name:?}")))?;

        info!(job_id = %job.id, name = %job.friendly_name, start, end, "Created export job");
        Ok(job)
    }

    /// Fetch one job by identifier
    pub async fn fetch_job(&self, resource_type: &str, job_id: &str) -> Result<ExportJob, JobError> {
        require("job id", job_id)?;
        let job = self
            .service
            .fetch_job(resource_type, job_id)
            .await
            .map_err(|e| e.with_context(format!("fetching export job {job_id}")))?;
        Ok(job)
    }

    /// Reuse a matching job or submit a new one.
    ///
    /// A freshly created job always needs waiting.
    pub async fn resolve_or_create(
        &self,
        resource_type: &str,
        start: &str,
        end: &str,
        expected_days: u32,
        friendly_name: &str,
    ) -> Result<(ResolvedJob, bool), JobError> {
        if let Some(existing) = self
            .find_existing_job(resource_type, start, end, expected_days)
            .await?
        {
            return Ok((existing, false));
        }

        let job = self
            .create_export_job(resource_type, start, end, friendly_name)
            .await?;
        let mut resolved = ResolvedJob::new(job, expected_days);
        resolved.needs_waiting = true;
        Ok((resolved, true))
    }
}
