//! Export job lifecycle
//!
//! Everything that happens before the first byte is downloaded:
//!
//! 1. **Resolution**: reuse a job covering the exact date range, or submit one ([`resolver`])
//! 2. **Polling**: wait until every expected day is accounted for ([`poller`])
//! 3. **Reconciliation**: decide which days actually need downloading ([`reconcile`])
//!
//! # Error Handling
//!
//! All operations return `Result<T, JobError>`:
//! - Validation errors (bad dates, missing fields) are raised before any remote call
//! - Remote errors are wrapped with context; the poller retries transient ones itself
//! - Timeouts and cancellations are distinct variants so callers can report them apart

use crate::remote::RemoteServiceError;
use std::time::Duration;

pub mod poller;
pub mod reconcile;
pub mod resolver;

pub use poller::{CompletedJob, CompletionPoller, PollSettings, PollState};
pub use reconcile::{date_range, reconcile_days, DateWindow, DaySet, ReconcileWarning};
pub use resolver::{JobResolver, ResolvedJob};

/// Job lifecycle errors
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// Input rejected before contacting the service
    #[error("validation error: {0}")]
    Validation(String),

    /// Export service call failed
    #[error("remote service error: {0}")]
    Remote(#[from] RemoteServiceError),

    /// Job did not finish before the deadline
    #[error(
        "timed out after {elapsed:?} waiting for job {job_id} ({completed}/{expected} days completed)"
    )]
    Timeout {
        /// Job being polled
        job_id: String,
        /// Time spent polling
        elapsed: Duration,
        /// Days completed at the last successful check
        completed: u32,
        /// Days expected
        expected: u32,
    },

    /// Shutdown requested while waiting
    #[error("cancelled while waiting for job {0}")]
    Cancelled(String),
}
