//! Tests for the run command

use abxplore::commands::{execute, pipeline_run, RunConfig};
use abxplore::io::{
    CLEAN_CONTACT_EVENTS_FILE, CLEAN_FUNNEL_STAGES_FILE, CLEAN_LEADS_FILE, CLEAN_OUTCOMES_FILE,
    LEAD_METRICS_FILE, RESULTS_FILE, STATISTICAL_RESULTS_FILE,
};
use abxplore::model::DropReason;
use abxplore::Error;
use chrono::NaiveDate;
use tempfile::TempDir;

use super::write_raw_data;

fn config(data: &TempDir, out: &TempDir, dry_run: bool) -> RunConfig {
    RunConfig {
        data_dir: data.path().to_path_buf(),
        output_dir: out.path().join("results"),
        processing_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        segment: None,
        dry_run,
    }
}

#[test]
fn test_execute_writes_every_output() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_raw_data(data.path());

    let output = execute(&config(&data, &out, false)).unwrap();

    for name in [
        CLEAN_LEADS_FILE,
        CLEAN_CONTACT_EVENTS_FILE,
        CLEAN_FUNNEL_STAGES_FILE,
        CLEAN_OUTCOMES_FILE,
        LEAD_METRICS_FILE,
        STATISTICAL_RESULTS_FILE,
        RESULTS_FILE,
    ] {
        assert!(out.path().join("results").join(name).exists(), "{name} missing");
    }

    // Lead 3 is test data; lead 4 duplicates lead 1 by email and is newer.
    let ids: Vec<&str> = output.leads.iter().map(|l| l.lead_id.as_str()).collect();
    assert_eq!(ids, vec!["2", "4", "5", "6"]);
    assert_eq!(output.quality.leads.dropped[&DropReason::TestData], 1);
    assert_eq!(output.quality.contact_events.dropped[&DropReason::MissingLeadId], 1);
    assert_eq!(output.quality.orphans.contact_events, 1);

    let lead4 = output.lead_metrics.iter().find(|m| m.lead_id == "4").unwrap();
    assert!(lead4.converted);
    assert_eq!(lead4.revenue, 150_000.0);
    assert_eq!(lead4.time_to_close, Some(29));
    assert!(lead4.funnel_completed);
    assert!(!lead4.responded);

    let lead2 = output.lead_metrics.iter().find(|m| m.lead_id == "2").unwrap();
    assert!(!lead2.converted, "0.01 is a placeholder for no revenue");
    assert!(lead2.responded);

    let lead6 = output.lead_metrics.iter().find(|m| m.lead_id == "6").unwrap();
    assert_eq!(lead6.revenue, 500_000.0);
    assert_eq!(lead6.time_to_close, Some(730));

    let lead5 = output.leads.iter().find(|l| l.lead_id == "5").unwrap();
    assert!(lead5.flags.had_future_created_at);
}

#[test]
fn test_dry_run_writes_nothing() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_raw_data(data.path());

    let output = execute(&config(&data, &out, true)).unwrap();

    assert!(!output.comparisons.is_empty());
    assert!(!out.path().join("results").exists());
}

#[test]
fn test_missing_input_is_reported() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();

    let err = execute(&config(&data, &out, false)).unwrap_err();
    assert!(matches!(err, Error::InputNotFound(_)));
}

#[tokio::test]
async fn test_pipeline_run_on_blocking_pool() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_raw_data(data.path());

    let output = pipeline_run(config(&data, &out, false)).await.unwrap();

    assert_eq!(output.lead_metrics.len(), 4);
    assert!(out.path().join("results").join(RESULTS_FILE).exists());
}
