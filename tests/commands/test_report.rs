//! Tests for the report command

use abxplore::aggregate::Segment;
use abxplore::commands::{execute, render_report, report_run, RunConfig};
use abxplore::io::RESULTS_FILE;
use abxplore::Error;
use chrono::NaiveDate;
use tempfile::TempDir;

use super::write_raw_data;

#[test]
fn test_report_reads_saved_results() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_raw_data(data.path());

    execute(&RunConfig {
        data_dir: data.path().to_path_buf(),
        output_dir: out.path().to_path_buf(),
        processing_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        segment: Some(Segment::Industry),
        dry_run: false,
    })
    .unwrap();

    let document = report_run(&out.path().join(RESULTS_FILE), false).unwrap();
    assert_eq!(document.segment, Some(Segment::Industry));

    let text = render_report(&document, false);
    assert!(text.contains("segment: industry"));
    assert!(text.contains("Finance"));
    assert!(text.contains("Retail"));
}

#[test]
fn test_report_without_results_fails() {
    let dir = TempDir::new().unwrap();
    let err = report_run(&dir.path().join(RESULTS_FILE), false).unwrap_err();
    assert!(matches!(err, Error::InputNotFound(_)));
}
