//! Day set reconciliation
//!
//! Works out which calendar days of a job have to be downloaded, given the
//! job's status buckets and an optional user-requested window.

use chrono::{Duration as ChronoDuration, Local, NaiveDate, TimeZone};
use std::collections::BTreeSet;
use tracing::warn;

use super::JobError;
use crate::{DayDetail, DayStatus};

/// Day string format used by the export service
pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// Parse a `YYYY-MM-DD` day string
pub fn parse_day(input: &str) -> Result<NaiveDate, JobError> {
    NaiveDate::parse_from_str(input.trim(), DAY_FORMAT)
        .map_err(|e| JobError::Validation(format!("invalid date {input:?}: {e}")))
}

/// Format a date the way the export service expects it
pub fn format_day(date: NaiveDate) -> String {
    date.format(DAY_FORMAT).to_string()
}

/// Render a date as a day string by way of local noon.
///
/// Noon is far enough from midnight that no UTC offset or DST shift moves the
/// instant into a neighbouring calendar day.
fn day_at_local_noon(date: NaiveDate) -> String {
    date.and_hms_opt(12, 0, 0)
        .and_then(|noon| Local.from_local_datetime(&noon).earliest())
        .map(|local| local.format(DAY_FORMAT).to_string())
        .unwrap_or_else(|| format_day(date))
}

/// Inclusive range of calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateWindow {
    /// Create a window; `start` must not be after `end`
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, JobError> {
        if start > end {
            return Err(JobError::Validation(format!(
                "start date {} is after end date {}",
                format_day(start),
                format_day(end)
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse a window from two `YYYY-MM-DD` strings
    pub fn parse(start: &str, end: &str) -> Result<Self, JobError> {
        Self::new(parse_day(start)?, parse_day(end)?)
    }

    /// The `days` calendar days ending on `end` (inclusive)
    pub fn ending_on(end: NaiveDate, days: u32) -> Result<Self, JobError> {
        if days == 0 {
            return Err(JobError::Validation("window must span at least one day".to_string()));
        }
        let start = end - ChronoDuration::days(i64::from(days) - 1);
        Self::new(start, end)
    }

    /// First day
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// First day as `YYYY-MM-DD`
    pub fn start_str(&self) -> String {
        format_day(self.start)
    }

    /// Last day as `YYYY-MM-DD`
    pub fn end_str(&self) -> String {
        format_day(self.end)
    }

    /// Number of days in the window
    pub fn len(&self) -> u32 {
        ((self.end - self.start).num_days() + 1) as u32
    }

    /// Always false; a window spans at least one day
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Every day in the window, ascending
    pub fn days(&self) -> Vec<String> {
        let mut days = Vec::with_capacity(self.len() as usize);
        let mut current = self.start;
        while current <= self.end {
            days.push(day_at_local_noon(current));
            match current.succ_opt() {
                Some(next) => current = next,
                None => break,
            }
        }
        days
    }
}

/// Inclusive list of day strings between two `YYYY-MM-DD` dates
pub fn date_range(start: &str, end: &str) -> Result<Vec<String>, JobError> {
    Ok(DateWindow::parse(start, end)?.days())
}

/// Something odd noticed while reconciling; reported, never fatal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileWarning {
    /// Downloadable and empty days add up to more than the window holds
    InconsistentBuckets {
        /// Days in the requested window
        total: usize,
        /// Days selected for download
        to_download: usize,
        /// Empty days in the window
        empty: usize,
    },
    /// A completed bucket reports days without listing them
    UnlistedDays {
        /// Bucket status
        status: DayStatus,
        /// Count reported
        count: u32,
    },
    /// A bucket lists a day that is not a valid `YYYY-MM-DD` date
    MalformedDay(String),
}

impl std::fmt::Display for ReconcileWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InconsistentBuckets {
                total,
                to_download,
                empty,
            } => write!(
                f,
                "job buckets disagree with the requested window: {to_download} to download + {empty} empty > {total} days"
            ),
            Self::UnlistedDays { status, count } => {
                write!(f, "{count} {status} day(s) reported without a day list")
            }
            Self::MalformedDay(day) => write!(f, "ignoring malformed day {day:?}"),
        }
    }
}

/// Result of reconciling a job against a window
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DaySet {
    /// Days with data to download, ascending
    pub days_to_download: Vec<String>,
    /// Days completed without records, ascending
    pub empty_days_in_range: Vec<String>,
    /// Days in the window the job does not account for.
    /// Negative only for inconsistent input, alongside a warning.
    pub days_outside_job_scope: i64,
    /// Days in the window (or accounted for, without a window)
    pub total_days_in_range: usize,
    /// Issues found in the job details
    pub warnings: Vec<ReconcileWarning>,
}

impl DaySet {
    /// Nothing needs downloading
    pub fn is_empty(&self) -> bool {
        self.days_to_download.is_empty()
    }
}

fn collect_days(
    details: &[DayDetail],
    status: &DayStatus,
    warnings: &mut Vec<ReconcileWarning>,
) -> BTreeSet<String> {
    let mut days = BTreeSet::new();
    for detail in details.iter().filter(|d| &d.status == status) {
        if detail.days.is_none() && detail.count > 0 {
            warnings.push(ReconcileWarning::UnlistedDays {
                status: detail.status.clone(),
                count: detail.count,
            });
        }
        for day in detail.day_list() {
            match parse_day(day) {
                Ok(date) => {
                    days.insert(format_day(date));
                }
                Err(_) => warnings.push(ReconcileWarning::MalformedDay(day.clone())),
            }
        }
    }
    days
}

/// Compute the days to download from a job's buckets.
///
/// Without a window every `Completed` day is selected. With a window the
/// completed and empty buckets are intersected with it.
pub fn reconcile_days(details: &[DayDetail], window: Option<&DateWindow>) -> DaySet {
    let mut warnings = Vec::new();
    let completed = collect_days(details, &DayStatus::Completed, &mut warnings);
    let empty = collect_days(details, &DayStatus::CompletedEmptyRecords, &mut warnings);

    let set = match window {
        None => {
            let empty: Vec<String> = empty.difference(&completed).cloned().collect();
            let total = completed.len() + empty.len();
            DaySet {
                days_to_download: completed.into_iter().collect(),
                empty_days_in_range: empty,
                days_outside_job_scope: 0,
                total_days_in_range: total,
                warnings,
            }
        }
        Some(window) => {
            let in_window: BTreeSet<String> = window.days().into_iter().collect();
            let to_download: Vec<String> = completed.intersection(&in_window).cloned().collect();
            let empty_in_range: Vec<String> = empty.intersection(&in_window).cloned().collect();

            let total = in_window.len();
            let outside = total as i64 - to_download.len() as i64 - empty_in_range.len() as i64;
            if outside < 0 {
                warnings.push(ReconcileWarning::InconsistentBuckets {
                    total,
                    to_download: to_download.len(),
                    empty: empty_in_range.len(),
                });
            }

            DaySet {
                days_to_download: to_download,
                empty_days_in_range: empty_in_range,
                days_outside_job_scope: outside,
                total_days_in_range: total,
                warnings,
            }
        }
    };

    for warning in &set.warnings {
        warn!("Reconciliation: {}", warning);
    }
    set
}
