//! Pipeline metrics
//!
//! Counters and histograms for day downloads, job polling and the report
//! transform. Without an installed recorder the `metrics` macros are no-ops;
//! the CLI installs the Prometheus exporter only when `--metrics-addr` is given.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

static METRICS_INITIALIZED: Mutex<bool> = Mutex::new(false);

/// Install the Prometheus exporter and describe every metric.
///
/// Must run inside a tokio runtime. Calling it again is a no-op.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    let mut initialized = match METRICS_INITIALIZED.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    PrometheusBuilder::new().with_http_listener(addr).install()?;

    describe_counter!(
        "day_downloads_completed_total",
        Unit::Count,
        "Day artifacts downloaded successfully"
    );
    describe_counter!(
        "day_downloads_failed_total",
        Unit::Count,
        "Day artifacts that failed after every attempt"
    );
    describe_counter!(
        "day_download_bytes_total",
        Unit::Bytes,
        "Compressed bytes written to disk"
    );
    describe_counter!(
        "day_download_retries_total",
        Unit::Count,
        "Retry attempts across all days"
    );
    describe_histogram!(
        "day_download_duration_seconds",
        Unit::Seconds,
        "Wall time per day including retries"
    );
    describe_histogram!(
        "retry_backoff_duration_seconds",
        Unit::Seconds,
        "Backoff slept before a retry"
    );
    describe_counter!(
        "job_poll_ticks_total",
        Unit::Count,
        "Job status checks by outcome"
    );
    describe_counter!(
        "report_records_total",
        Unit::Count,
        "Records parsed from day artifacts"
    );
    describe_counter!(
        "report_parse_errors_total",
        Unit::Count,
        "Lines skipped because they were not JSON objects"
    );

    *initialized = true;
    info!("Metrics exporter listening on {}", addr);
    Ok(())
}

/// Whether the exporter has been installed
pub fn is_initialized() -> bool {
    match METRICS_INITIALIZED.lock() {
        Ok(guard) => *guard,
        Err(poisoned) => *poisoned.into_inner(),
    }
}

/// Timing and outcome of one day download
pub struct DayDownloadMetrics {
    day: String,
    start_time: Instant,
}

impl DayDownloadMetrics {
    /// Start tracking a day
    pub fn start(day: impl Into<String>) -> Self {
        Self {
            day: day.into(),
            start_time: Instant::now(),
        }
    }

    /// Record a successful download
    pub fn record_success(&self, bytes: u64, attempts: u32) {
        let duration = self.start_time.elapsed();

        counter!("day_downloads_completed_total").increment(1);
        counter!("day_download_bytes_total").increment(bytes);
        histogram!("day_download_duration_seconds", "outcome" => "success")
            .record(duration.as_secs_f64());

        debug!(
            day = %self.day,
            bytes,
            attempts,
            duration_ms = duration.as_millis() as u64,
            "Day download recorded"
        );
    }

    /// Record a permanent failure
    pub fn record_failure(&self, reason: &'static str) {
        let duration = self.start_time.elapsed();

        counter!("day_downloads_failed_total", "reason" => reason).increment(1);
        histogram!("day_download_duration_seconds", "outcome" => "failure")
            .record(duration.as_secs_f64());

        warn!(
            day = %self.day,
            reason,
            duration_ms = duration.as_millis() as u64,
            "Day download failure recorded"
        );
    }
}

/// Record a retry and the backoff slept before it
pub fn record_retry_backoff(duration: Duration, attempt: u32) {
    counter!("day_download_retries_total").increment(1);
    histogram!("retry_backoff_duration_seconds").record(duration.as_secs_f64());

    debug!(
        attempt,
        backoff_ms = duration.as_millis() as u64,
        "Retry backoff recorded"
    );
}

/// Record one job status check; `outcome` is `waiting`, `complete` or `error`
pub fn record_poll_tick(outcome: &'static str) {
    counter!("job_poll_ticks_total", "outcome" => outcome).increment(1);
}

/// Record the totals of one transform run
pub fn record_transform(records: u64, parse_errors: u64) {
    counter!("report_records_total").increment(records);
    counter!("report_parse_errors_total").increment(parse_errors);
}
