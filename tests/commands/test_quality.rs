//! Tests for the quality command

use abxplore::commands::{quality_run, render_quality, RunConfig};
use chrono::NaiveDate;
use tempfile::TempDir;

use super::write_raw_data;

#[tokio::test]
async fn test_quality_run_never_writes_outputs() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_raw_data(data.path());

    let summary = quality_run(RunConfig {
        data_dir: data.path().to_path_buf(),
        output_dir: out.path().join("never"),
        processing_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        segment: None,
        dry_run: false,
    })
    .await
    .unwrap();

    assert!(!out.path().join("never").exists());
    assert_eq!(summary.leads.records_in, 6);
    assert_eq!(summary.merged_duplicates, 1);

    let text = render_quality(&summary);
    assert!(text.contains("test_data:1"));
    assert!(text.contains("had_phone_extension:1"));
}
