use bulk_export_report::job::{reconcile_days, DateWindow, ReconcileWarning};
use bulk_export_report::{DayDetail, DayStatus};

fn april_buckets() -> Vec<DayDetail> {
    vec![
        DayDetail::with_days(DayStatus::Completed, &["2025-04-01", "2025-04-02"]),
        DayDetail::with_days(DayStatus::CompletedEmptyRecords, &["2025-04-03"]),
    ]
}

#[test]
fn window_splits_completed_and_empty_days() {
    let window = DateWindow::parse("2025-04-01", "2025-04-03").unwrap();
    let set = reconcile_days(&april_buckets(), Some(&window));

    assert_eq!(set.days_to_download, vec!["2025-04-01", "2025-04-02"]);
    assert_eq!(set.empty_days_in_range, vec!["2025-04-03"]);
    assert_eq!(set.days_outside_job_scope, 0);
    assert_eq!(set.total_days_in_range, 3);
    assert!(set.warnings.is_empty());
}

#[test]
fn window_narrower_than_job_drops_outside_days() {
    let window = DateWindow::parse("2025-04-02", "2025-04-02").unwrap();
    let set = reconcile_days(&april_buckets(), Some(&window));

    assert_eq!(set.days_to_download, vec!["2025-04-02"]);
    assert!(set.empty_days_in_range.is_empty());
    assert_eq!(set.days_outside_job_scope, 0);
}

#[test]
fn window_wider_than_job_counts_uncovered_days() {
    let window = DateWindow::parse("2025-03-30", "2025-04-03").unwrap();
    let set = reconcile_days(&april_buckets(), Some(&window));

    assert_eq!(set.total_days_in_range, 5);
    assert_eq!(set.days_outside_job_scope, 2);
}

#[test]
fn no_window_takes_every_completed_day_once() {
    let details = vec![
        DayDetail::with_days(DayStatus::Completed, &["2025-04-02", "2025-04-01"]),
        DayDetail::with_days(DayStatus::Completed, &["2025-04-02", "2025-04-04"]),
        DayDetail::with_days(DayStatus::CompletedEmptyRecords, &["2025-04-03"]),
        DayDetail::with_days(DayStatus::Failed, &["2025-04-05"]),
    ];
    let set = reconcile_days(&details, None);

    assert_eq!(set.days_to_download, vec!["2025-04-01", "2025-04-02", "2025-04-04"]);
    assert_eq!(set.empty_days_in_range, vec!["2025-04-03"]);
    assert_eq!(set.total_days_in_range, 4);
    assert_eq!(set.days_outside_job_scope, 0);
}

#[test]
fn no_window_empty_days_exclude_completed_ones() {
    let details = vec![
        DayDetail::with_days(DayStatus::Completed, &["2025-04-01"]),
        DayDetail::with_days(DayStatus::CompletedEmptyRecords, &["2025-04-01", "2025-04-02"]),
    ];
    let set = reconcile_days(&details, None);

    assert_eq!(set.empty_days_in_range, vec!["2025-04-02"]);
    assert_eq!(set.total_days_in_range, 2);
}

#[test]
fn overlapping_buckets_report_negative_scope_with_warning() {
    let details = vec![
        DayDetail::with_days(DayStatus::Completed, &["2025-04-01"]),
        DayDetail::with_days(DayStatus::CompletedEmptyRecords, &["2025-04-01"]),
    ];
    let window = DateWindow::parse("2025-04-01", "2025-04-01").unwrap();
    let set = reconcile_days(&details, Some(&window));

    assert_eq!(set.days_outside_job_scope, -1);
    assert_eq!(
        set.warnings,
        vec![ReconcileWarning::InconsistentBuckets {
            total: 1,
            to_download: 1,
            empty: 1,
        }]
    );
}

#[test]
fn nothing_to_download_is_not_an_error() {
    let details = vec![DayDetail::with_days(
        DayStatus::CompletedEmptyRecords,
        &["2025-04-01"],
    )];
    let set = reconcile_days(&details, None);
    assert!(set.is_empty());
}

#[test]
fn pending_and_unknown_buckets_are_ignored() {
    let details = vec![
        DayDetail::with_days(DayStatus::Pending, &["2025-04-01"]),
        DayDetail::with_days(DayStatus::Unknown("Queued".to_string()), &["2025-04-02"]),
    ];
    let set = reconcile_days(&details, None);
    assert!(set.is_empty());
    assert!(set.empty_days_in_range.is_empty());
}
