//! End-to-end runs over the fake service and a mock content server

use crate::support::fake_service::{job, FakeExportService};
use crate::support::gzip::gzip;
use bulk_export_report::cli::{Pipeline, RunRequest};
use bulk_export_report::config::ExportConfig;
use bulk_export_report::job::DateWindow;
use bulk_export_report::{DayDetail, DayStatus};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(root: &Path) -> ExportConfig {
    ExportConfig {
        download_root: root.to_path_buf(),
        max_retries: 0,
        backoff_base: Duration::from_millis(1),
        poll_interval: Duration::from_millis(10),
        max_wait: Duration::from_secs(5),
        new_job_initial_delay: Duration::ZERO,
        concurrency: 2,
        ..ExportConfig::default()
    }
}

fn finished_job(id: &str) -> bulk_export_report::ExportJob {
    job(
        id,
        "2025-04-01",
        "2025-04-03",
        vec![
            DayDetail::with_days(DayStatus::Completed, &["2025-04-01", "2025-04-02"]),
            DayDetail::with_days(DayStatus::CompletedEmptyRecords, &["2025-04-03"]),
        ],
    )
}

fn range_request() -> RunRequest {
    RunRequest::Range {
        window: DateWindow::parse("2025-04-01", "2025-04-03").unwrap(),
        name: "april".to_string(),
    }
}

async fn content_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/content/2025-04-01"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(gzip(
            "{\"sid\":\"SM1\",\"to\":\"+15551230001\",\"price\":\"0.0079\"}\n",
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/content/2025-04-02"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(gzip(
            "{\"sid\":\"SM2\",\"to\":\"+15551230002\",\"price\":\"0.0158\"}\n{\"sid\":\"SM3\"}\n",
        )))
        .mount(&server)
        .await;
    server
}

fn with_locations(service: FakeExportService, server: &MockServer) -> FakeExportService {
    service
        .with_location("2025-04-01", &format!("{}/content/2025-04-01", server.uri()))
        .with_location("2025-04-02", &format!("{}/content/2025-04-02", server.uri()))
}

#[tokio::test]
async fn test_existing_range_job_produces_report() {
    let server = content_server().await;
    let service = Arc::new(with_locations(
        FakeExportService::new().with_jobs(vec![finished_job("JS1")]),
        &server,
    ));
    let root = TempDir::new().unwrap();

    let result = Pipeline::new(config(root.path()), service.clone())
        .run(&range_request())
        .await;

    assert!(result.success, "run failed: {:?}", result.error);
    assert_eq!(result.record_count, Some(3));
    assert!(service.created().is_empty());

    let folder = root.path().join("job_JS1");
    assert_eq!(result.job_folder, Some(folder.display().to_string()));
    let csv_path = folder.join("export.csv");
    assert_eq!(result.csv_path, Some(csv_path.display().to_string()));

    let text = std::fs::read_to_string(csv_path).unwrap();
    assert_eq!(
        text,
        "sid;to;price\nSM1;=\"+15551230001\";0,0079\nSM2;=\"+15551230002\";0,0158\nSM3;;"
    );
    assert!(folder.join("files/export_2025-04-01.json.gz").exists());
    assert!(!folder.join("files/export_2025-04-03.json.gz").exists());
}

#[tokio::test]
async fn test_new_job_is_created_and_polled() {
    let server = content_server().await;
    let service = Arc::new(with_locations(
        FakeExportService::new().with_snapshots(vec![
            Ok(job("JS_NEW", "2025-04-01", "2025-04-03", vec![])),
            Ok(finished_job("JS_NEW")),
        ]),
        &server,
    ));
    let root = TempDir::new().unwrap();

    let result = Pipeline::new(config(root.path()), service.clone())
        .run(&range_request())
        .await;

    assert!(result.success, "run failed: {:?}", result.error);
    assert_eq!(result.record_count, Some(3));
    assert_eq!(service.created().len(), 1);
    assert_eq!(service.created()[0].2, "april");
    assert_eq!(service.fetch_calls(), 2);
}

#[tokio::test]
async fn test_job_id_request_uses_job_range() {
    let server = content_server().await;
    let service = Arc::new(with_locations(
        FakeExportService::new().with_jobs(vec![finished_job("JS1")]),
        &server,
    ));
    let root = TempDir::new().unwrap();

    let result = Pipeline::new(config(root.path()), service)
        .run(&RunRequest::ExistingJob {
            job_id: "JS1".to_string(),
        })
        .await;

    assert!(result.success, "run failed: {:?}", result.error);
    assert_eq!(result.record_count, Some(3));
}

#[tokio::test]
async fn test_all_downloads_failing_fails_the_run() {
    let service = Arc::new(FakeExportService::new().with_jobs(vec![finished_job("JS1")]));
    let root = TempDir::new().unwrap();

    let result = Pipeline::new(config(root.path()), service)
        .run(&range_request())
        .await;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("all 2 day downloads failed"));
    assert!(result.job_folder.is_some());
    assert!(result.csv_path.is_none());
    assert!(!root.path().join("job_JS1/export.csv").exists());
}

#[tokio::test]
async fn test_empty_job_succeeds_without_report() {
    let empty = job(
        "JS1",
        "2025-04-01",
        "2025-04-03",
        vec![DayDetail::with_days(
            DayStatus::CompletedEmptyRecords,
            &["2025-04-01", "2025-04-02", "2025-04-03"],
        )],
    );
    let service = Arc::new(FakeExportService::new().with_jobs(vec![empty]));
    let root = TempDir::new().unwrap();

    let result = Pipeline::new(config(root.path()), service.clone())
        .run(&range_request())
        .await;

    assert!(result.success);
    assert_eq!(result.record_count, Some(0));
    assert!(result.csv_path.is_none());
    assert_eq!(service.location_calls(), 0);
}

#[tokio::test]
async fn test_unknown_job_id_fails_without_folder() {
    let service = Arc::new(FakeExportService::new());
    let root = TempDir::new().unwrap();

    let result = Pipeline::new(config(root.path()), service)
        .run(&RunRequest::ExistingJob {
            job_id: "JS404".to_string(),
        })
        .await;

    assert!(!result.success);
    assert!(result.job_folder.is_none());
    assert!(result.error.unwrap().contains("JS404"));
}

#[tokio::test]
async fn test_stale_days_in_reused_folder_stay_out_of_report() {
    let server = content_server().await;
    let service = Arc::new(with_locations(
        FakeExportService::new().with_jobs(vec![finished_job("JS1")]),
        &server,
    ));
    let root = TempDir::new().unwrap();
    let files = root.path().join("job_JS1").join("files");
    std::fs::create_dir_all(&files).unwrap();
    std::fs::write(
        files.join("export_2025-03-15.json.gz"),
        gzip("{\"sid\":\"STALE\"}\n"),
    )
    .unwrap();

    let result = Pipeline::new(config(root.path()), service)
        .run(&range_request())
        .await;

    assert!(result.success, "run failed: {:?}", result.error);
    assert_eq!(result.record_count, Some(3));
    let text = std::fs::read_to_string(root.path().join("job_JS1/export.csv")).unwrap();
    assert!(!text.contains("STALE"));
}
