//! In-memory export service for resolver, poller, downloader and pipeline tests

use async_trait::async_trait;
use bulk_export_report::remote::{ExportService, RemoteResult, RemoteServiceError};
use bulk_export_report::{DayDetail, DayStatus, ExportJob};
use reqwest::Url;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// Job snapshot with the given buckets
pub fn job(id: &str, start: &str, end: &str, details: Vec<DayDetail>) -> ExportJob {
    ExportJob {
        id: id.to_string(),
        friendly_name: format!("job {id}"),
        resource_type: "Messages".to_string(),
        start_day: start.to_string(),
        end_day: end.to_string(),
        details,
        job_queue_position: None,
        estimated_completion_time: None,
    }
}

/// Job whose `Completed` bucket only carries a count
pub fn job_with_completed_count(id: &str, completed: u32) -> ExportJob {
    let details = if completed == 0 {
        vec![]
    } else {
        vec![DayDetail {
            status: DayStatus::Completed,
            count: completed,
            days: None,
        }]
    };
    job(id, "2025-04-01", "2025-04-05", details)
}

#[derive(Default)]
pub struct FakeExportService {
    jobs: Mutex<Vec<ExportJob>>,
    snapshots: Mutex<VecDeque<RemoteResult<ExportJob>>>,
    locations: Mutex<HashMap<String, Url>>,
    created: Mutex<Vec<(String, String, String)>>,
    fetch_calls: AtomicU32,
    location_calls: AtomicU32,
}

impl FakeExportService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs returned by `list_jobs`
    pub fn with_jobs(self, jobs: Vec<ExportJob>) -> Self {
        *self.jobs.lock().unwrap() = jobs;
        self
    }

    /// Results returned by successive `fetch_job` calls; the last one repeats
    pub fn with_snapshots(self, snapshots: Vec<RemoteResult<ExportJob>>) -> Self {
        *self.snapshots.lock().unwrap() = snapshots.into();
        self
    }

    /// Content URL returned for a day
    pub fn with_location(self, day: &str, url: &str) -> Self {
        self.locations
            .lock()
            .unwrap()
            .insert(day.to_string(), Url::parse(url).unwrap());
        self
    }

    pub fn fetch_calls(&self) -> u32 {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn location_calls(&self) -> u32 {
        self.location_calls.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> Vec<(String, String, String)> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExportService for FakeExportService {
    async fn list_jobs(&self, _resource_type: &str, limit: usize) -> RemoteResult<Vec<ExportJob>> {
        Ok(self.jobs.lock().unwrap().iter().take(limit).cloned().collect())
    }

    async fn create_job(
        &self,
        resource_type: &str,
        start_day: &str,
        end_day: &str,
        friendly_name: &str,
    ) -> RemoteResult<ExportJob> {
        self.created.lock().unwrap().push((
            start_day.to_string(),
            end_day.to_string(),
            friendly_name.to_string(),
        ));
        let mut created = job("JS_NEW", start_day, end_day, vec![]);
        created.friendly_name = friendly_name.to_string();
        created.resource_type = resource_type.to_string();
        Ok(created)
    }

    async fn fetch_job(&self, _resource_type: &str, job_id: &str) -> RemoteResult<ExportJob> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let mut snapshots = self.snapshots.lock().unwrap();
        let next = if snapshots.len() > 1 {
            snapshots.pop_front()
        } else {
            snapshots.front().cloned()
        };
        match next {
            Some(result) => result,
            None => self
                .jobs
                .lock()
                .unwrap()
                .iter()
                .find(|j| j.id == job_id)
                .cloned()
                .ok_or_else(|| {
                    RemoteServiceError::from_response(format!("fetching job {job_id}"), 404, "")
                }),
        }
    }

    async fn fetch_day_location(&self, _resource_type: &str, day: &str) -> RemoteResult<Url> {
        self.location_calls.fetch_add(1, Ordering::SeqCst);
        self.locations.lock().unwrap().get(day).cloned().ok_or_else(|| {
            RemoteServiceError::from_response(format!("resolving content location for {day}"), 404, "")
        })
    }
}
