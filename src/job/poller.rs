//! Completion polling
//!
//! ```text
//! Initial ──(initial delay)──▶ Waiting ──▶ Complete
//!                                 │
//!                                 ├──▶ TimedOut   (max wait elapsed)
//!                                 └──▶ Error      (non-transient failure)
//! ```
//!
//! Transient failures (network, timeouts, 408/429/5xx) keep the poller in
//! `Waiting`. Ticks run strictly one after another.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::JobError;
use crate::config::{
    ExportConfig, DEFAULT_MAX_WAIT_SECS, DEFAULT_NEW_JOB_INITIAL_DELAY_SECS,
    DEFAULT_POLL_INTERVAL_SECS,
};
use crate::metrics;
use crate::remote::ExportService;
use crate::shutdown::SharedShutdown;
use crate::{CompletionCounts, ExportJob};

/// Poller states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Not started
    Initial,
    /// Checking periodically
    Waiting,
    /// Every expected day accounted for
    Complete,
    /// Gave up after the maximum wait
    TimedOut,
    /// Stopped on a non-transient failure
    Error,
}

/// Timing knobs for one poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Sleep between ticks
    pub interval: Duration,
    /// Give up after this much wall time
    pub max_wait: Duration,
    /// Sleep before the first tick
    pub initial_delay: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            max_wait: Duration::from_secs(DEFAULT_MAX_WAIT_SECS),
            initial_delay: Duration::ZERO,
        }
    }
}

impl PollSettings {
    /// Settings from configuration; the initial delay applies to new jobs only
    pub fn from_config(config: &ExportConfig, new_job: bool) -> Self {
        Self {
            interval: config.poll_interval,
            max_wait: config.max_wait,
            initial_delay: if new_job {
                config.new_job_initial_delay
            } else {
                Duration::ZERO
            },
        }
    }

    /// Default settings for a job that was just created
    pub fn for_new_job() -> Self {
        Self {
            initial_delay: Duration::from_secs(DEFAULT_NEW_JOB_INITIAL_DELAY_SECS),
            ..Self::default()
        }
    }
}

/// A job that reached `Complete`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedJob {
    /// Final snapshot
    pub job: ExportJob,
    /// Day counts of the final snapshot
    pub counts: CompletionCounts,
    /// Status checks made
    pub ticks: u32,
    /// Time spent polling
    pub elapsed: Duration,
}

impl CompletedJob {
    /// Whether some days failed on the service side
    pub fn has_failed_days(&self) -> bool {
        self.counts.failed_days > 0
    }
}

/// Waits for a job to account for all its days
pub struct CompletionPoller {
    service: Arc<dyn ExportService>,
    settings: PollSettings,
    shutdown: Option<SharedShutdown>,
}

impl CompletionPoller {
    /// Poller with the given timing
    pub fn new(service: Arc<dyn ExportService>, settings: PollSettings) -> Self {
        Self {
            service,
            settings,
            shutdown: None,
        }
    }

    /// Attach a shared shutdown handle; a request ends the poll as cancelled
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Poll `job_id` until `expected_days` are accounted for
    pub async fn wait_for_completion(
        &self,
        resource_type: &str,
        job_id: &str,
        expected_days: u32,
    ) -> Result<CompletedJob, JobError> {
        let started = Instant::now();
        let mut state = PollState::Initial;
        let mut ticks = 0u32;
        let mut last_counts = CompletionCounts::default();

        if !self.settings.initial_delay.is_zero() {
            info!(
                job_id,
                delay_secs = self.settings.initial_delay.as_secs(),
                "Waiting before the first status check"
            );
            self.pause(self.settings.initial_delay, job_id).await?;
        }
        transition(&mut state, PollState::Waiting, job_id);

        loop {
            if started.elapsed() > self.settings.max_wait {
                transition(&mut state, PollState::TimedOut, job_id);
                return Err(JobError::Timeout {
                    job_id: job_id.to_string(),
                    elapsed: started.elapsed(),
                    completed: last_counts.completed_days,
                    expected: expected_days,
                });
            }

            ticks += 1;
            match self.service.fetch_job(resource_type, job_id).await {
                Ok(job) => {
                    let counts = job.completion();
                    last_counts = counts;

                    if counts.is_complete(expected_days)
                        || counts.is_settled_with_failures(expected_days)
                    {
                        metrics::record_poll_tick("complete");
                        transition(&mut state, PollState::Complete, job_id);
                        if counts.failed_days > 0 {
                            warn!(
                                job_id,
                                failed_days = counts.failed_days,
                                "Job finished with failed days"
                            );
                        }
                        return Ok(CompletedJob {
                            job,
                            counts,
                            ticks,
                            elapsed: started.elapsed(),
                        });
                    }

                    metrics::record_poll_tick("waiting");
                    info!(
                        job_id,
                        tick = ticks,
                        completed = counts.completed_days,
                        expected = expected_days,
                        failed = counts.failed_days,
                        queue_position = job.job_queue_position.as_deref().unwrap_or("-"),
                        eta = job.estimated_completion_time.as_deref().unwrap_or("-"),
                        "Job still running"
                    );
                }
                Err(err) if err.is_transient() => {
                    metrics::record_poll_tick("error");
                    warn!(job_id, tick = ticks, error = %err, "Status check failed, will retry");
                }
                Err(err) => {
                    metrics::record_poll_tick("error");
                    transition(&mut state, PollState::Error, job_id);
                    return Err(err
                        .with_context(format!("polling export job {job_id}"))
                        .into());
                }
            }

            self.pause(self.settings.interval, job_id).await?;
        }
    }

    async fn pause(&self, duration: Duration, job_id: &str) -> Result<(), JobError> {
        match &self.shutdown {
            Some(shutdown) => tokio::select! {
                _ = tokio::time::sleep(duration) => Ok(()),
                _ = shutdown.wait_for_shutdown() => {
                    warn!(job_id, "Shutdown requested, stopping job polling");
                    Err(JobError::Cancelled(job_id.to_string()))
                }
            },
            None => {
                tokio::time::sleep(duration).await;
                Ok(())
            }
        }
    }
}

fn transition(state: &mut PollState, next: PollState, job_id: &str) {
    debug!(job_id, from = ?*state, to = ?next, "Poller state change");
    *state = next;
}
