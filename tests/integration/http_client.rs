//! HTTP client against a mock export service

use bulk_export_report::remote::{
    Credentials, ExportService, HttpExportClient, RemoteErrorKind,
};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, credentials: Option<Credentials>) -> HttpExportClient {
    HttpExportClient::new(server.uri(), Duration::from_secs(5), credentials).unwrap()
}

fn job_body(id: &str) -> serde_json::Value {
    json!({
        "job_sid": id,
        "friendly_name": "april",
        "resource_type": "Messages",
        "start_day": "2025-04-01",
        "end_day": "2025-04-02",
        "details": [
            {"status": "Completed", "count": 1, "days": ["2025-04-01"]},
            {"status": "CompletedEmptyRecords", "count": 1, "days": ["2025-04-02"]}
        ]
    })
}

#[tokio::test]
async fn test_list_jobs_parses_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/Exports/Messages/Jobs"))
        .and(query_param("PageSize", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jobs": [job_body("JS1"), job_body("JS2")]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let jobs = client(&server, None).list_jobs("Messages", 50).await.unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].id, "JS1");
    assert_eq!(jobs[0].completion().completed_days, 2);
}

#[tokio::test]
async fn test_create_job_posts_form() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/Exports/Messages/Jobs"))
        .and(body_string_contains("StartDay=2025-04-01"))
        .and(body_string_contains("EndDay=2025-04-02"))
        .and(body_string_contains("FriendlyName=april"))
        .respond_with(ResponseTemplate::new(201).set_body_json(job_body("JS9")))
        .expect(1)
        .mount(&server)
        .await;

    let job = client(&server, None)
        .create_job("Messages", "2025-04-01", "2025-04-02", "april")
        .await
        .unwrap();
    assert_eq!(job.id, "JS9");
}

#[tokio::test]
async fn test_provider_error_body_is_parsed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/Exports/Messages/Jobs/JSX"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "code": 20404,
            "message": "The requested resource was not found",
            "more_info": "https://example.com/docs/errors/20404",
            "status": 404
        })))
        .mount(&server)
        .await;

    let err = client(&server, None)
        .fetch_job("Messages", "JSX")
        .await
        .unwrap_err();
    assert_eq!(err.kind, RemoteErrorKind::Http);
    assert_eq!(err.code, Some(20404));
    assert!(err.is_not_found());
    assert!(err.context.contains("JSX"));
}

#[tokio::test]
async fn test_malformed_job_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/Exports/Messages/Jobs/JS1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client(&server, None)
        .fetch_job("Messages", "JS1")
        .await
        .unwrap_err();
    assert_eq!(err.kind, RemoteErrorKind::Decode);
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_day_location_from_redirect_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/Exports/Messages/Days/2025-04-01"))
        .respond_with(
            ResponseTemplate::new(307)
                .insert_header("Location", "https://cdn.example.com/day1.json.gz?sig=abc"),
        )
        .mount(&server)
        .await;

    let url = client(&server, None)
        .fetch_day_location("Messages", "2025-04-01")
        .await
        .unwrap();
    assert_eq!(url.host_str(), Some("cdn.example.com"));
    assert_eq!(url.path(), "/day1.json.gz");
}

#[tokio::test]
async fn test_relative_redirect_resolves_against_service() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/Exports/Messages/Days/2025-04-01"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", "/content/day1.json.gz?sig=abc"),
        )
        .mount(&server)
        .await;

    let url = client(&server, None)
        .fetch_day_location("Messages", "2025-04-01")
        .await
        .unwrap();
    assert_eq!(
        url.as_str(),
        format!("{}/content/day1.json.gz?sig=abc", server.uri())
    );
}

#[tokio::test]
async fn test_day_location_from_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/Exports/Messages/Days/2025-04-02"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "day": "2025-04-02",
            "redirect_to": "https://cdn.example.com/day2.json.gz"
        })))
        .mount(&server)
        .await;

    let url = client(&server, None)
        .fetch_day_location("Messages", "2025-04-02")
        .await
        .unwrap();
    assert_eq!(url.as_str(), "https://cdn.example.com/day2.json.gz");
}

#[tokio::test]
async fn test_day_without_redirect_is_invalid() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/Exports/Messages/Days/2025-04-03"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"day": "2025-04-03"})))
        .mount(&server)
        .await;

    let err = client(&server, None)
        .fetch_day_location("Messages", "2025-04-03")
        .await
        .unwrap_err();
    assert_eq!(err.kind, RemoteErrorKind::InvalidResponse);
}

#[tokio::test]
async fn test_basic_auth_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/Exports/Messages/Jobs"))
        .and(header("Authorization", "Basic QUMxOnNlY3JldA=="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"jobs": []})))
        .expect(1)
        .mount(&server)
        .await;

    let credentials = Credentials {
        username: "AC1".to_string(),
        password: "secret".to_string(),
    };
    let jobs = client(&server, Some(credentials))
        .list_jobs("Messages", 50)
        .await
        .unwrap();
    assert!(jobs.is_empty());
}
