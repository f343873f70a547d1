//! Artifact directory to report

use crate::support::gzip::write_artifact;
use bulk_export_report::transform::{build_report, ReportBuilder, ReportOutcome};
use tempfile::TempDir;

#[tokio::test]
async fn test_report_content_is_exact() {
    let dir = TempDir::new().unwrap();
    let files = dir.path().join("files");
    let report = dir.path().join("export.csv");

    write_artifact(
        &files,
        "2025-04-02",
        "{\"sid\":\"SM3\",\"to\":\"+15550000003\",\"price\":\"0.25\",\"body\":\"late\"}\n",
    );
    write_artifact(
        &files,
        "2025-04-01",
        concat!(
            "{\"sid\":\"SM1\",\"to\":\"+15551234567\",\"price\":\"1.50\",\"body\":\"a;b\"}\n",
            "\n",
            "not json\n",
            "{\"sid\":\"SM2\",\"to\":\"+15557654321\",\"price\":\"-0.0079\",\"body\":\"say \\\"hi\\\"\"}\n",
        ),
    );

    let outcome = build_report(&files, &report).await.unwrap();
    let stats = outcome.stats().clone();
    assert_eq!(outcome.report_path(), Some(report.as_path()));
    assert_eq!(stats.files_parsed, 2);
    assert_eq!(stats.records, 3);
    assert_eq!(stats.skipped_lines, 1);
    assert_eq!(stats.columns, 4);

    let text = std::fs::read_to_string(&report).unwrap();
    assert_eq!(
        text,
        concat!(
            "sid;to;price;body\n",
            "SM1;=\"+15551234567\";1,50;\"a;b\"\n",
            "SM2;=\"+15557654321\";-0,0079;\"say \"\"hi\"\"\"\n",
            "SM3;=\"+15550000003\";0,25;late",
        )
    );
}

#[tokio::test]
async fn test_every_line_becomes_a_record() {
    let dir = TempDir::new().unwrap();
    let files = dir.path().join("files");
    let body: String = (0..250)
        .map(|i| format!("{{\"sid\":\"SM{i}\",\"num_segments\":{}}}\n", i % 3))
        .collect();
    write_artifact(&files, "2025-04-01", &body);

    let outcome = build_report(&files, &dir.path().join("export.csv"))
        .await
        .unwrap();
    assert_eq!(outcome.stats().records, 250);

    let text = std::fs::read_to_string(dir.path().join("export.csv")).unwrap();
    assert_eq!(text.lines().count(), 251);
    assert!(!text.ends_with('\n'));
}

#[tokio::test]
async fn test_unreadable_and_foreign_files_are_skipped() {
    let dir = TempDir::new().unwrap();
    let files = dir.path().join("files");
    write_artifact(&files, "2025-04-01", "{\"sid\":\"SM1\"}\n");
    std::fs::write(files.join("export_2025-04-02.json.gz"), b"definitely not gzip").unwrap();
    std::fs::write(files.join("notes.txt"), b"hello").unwrap();
    std::fs::write(files.join("export_2025-04-03.json.gz.part"), b"partial").unwrap();

    let outcome = build_report(&files, &dir.path().join("export.csv"))
        .await
        .unwrap();
    let stats = outcome.stats();
    assert_eq!(stats.files_parsed, 1);
    assert_eq!(stats.files_failed, 1);
    assert_eq!(stats.files_ignored, 2);
    assert_eq!(stats.records, 1);
}

#[tokio::test]
async fn test_no_records_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let files = dir.path().join("files");
    write_artifact(&files, "2025-04-01", "");
    let report = dir.path().join("export.csv");

    let outcome = build_report(&files, &report).await.unwrap();
    assert!(matches!(outcome, ReportOutcome::NoData(_)));
    assert!(!report.exists());
}

#[tokio::test]
async fn test_parse_error_cap_truncates_file() {
    let dir = TempDir::new().unwrap();
    let files = dir.path().join("files");
    write_artifact(
        &files,
        "2025-04-01",
        "{\"sid\":\"SM1\"}\nbad\nbad\nbad\n{\"sid\":\"SM2\"}\n",
    );

    let outcome = ReportBuilder::new()
        .with_max_parse_errors(2)
        .build(&files, &dir.path().join("export.csv"))
        .await
        .unwrap();
    assert_eq!(outcome.stats().records, 1);
    assert_eq!(outcome.stats().skipped_lines, 2);
}

#[tokio::test]
async fn test_missing_directory_is_an_error() {
    let dir = TempDir::new().unwrap();
    let result = build_report(&dir.path().join("absent"), &dir.path().join("export.csv")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_day_filter_leaves_out_other_artifacts() {
    let dir = TempDir::new().unwrap();
    let files = dir.path().join("files");
    write_artifact(&files, "2025-03-01", "{\"sid\":\"OLD\"}\n");
    write_artifact(&files, "2025-04-01", "{\"sid\":\"SM1\"}\n");
    let report = dir.path().join("export.csv");

    let outcome = ReportBuilder::new()
        .with_days(["2025-04-01"])
        .build(&files, &report)
        .await
        .unwrap();

    assert_eq!(outcome.stats().records, 1);
    assert_eq!(outcome.stats().files_outside_days, 1);
    assert_eq!(std::fs::read_to_string(&report).unwrap(), "sid\nSM1");
}
