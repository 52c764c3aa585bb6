//! CSV and JSON table I/O
//!
//! Raw tables are read by header name, so column order does not matter and
//! unknown columns are ignored. Cleaned tables are written with their quality
//! flags spelled out as columns plus `total_quality_issues`.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::{
    ContactEvent, Lead, Outcome, QualityFlags, SequencedStage, DATETIME_FORMAT, DATE_FORMAT,
};
use crate::pipeline::{PipelineOutput, RawTables, ResultsDocument};
use crate::stats::{MetricComparison, Verdict};

pub const LEADS_FILE: &str = "leads.csv";
pub const CONTACT_EVENTS_FILE: &str = "contact_events.csv";
pub const FUNNEL_STAGES_FILE: &str = "funnel_stages.csv";
pub const OUTCOMES_FILE: &str = "outcomes.csv";

pub const CLEAN_LEADS_FILE: &str = "clean_leads.csv";
pub const CLEAN_CONTACT_EVENTS_FILE: &str = "clean_contact_events.csv";
pub const CLEAN_FUNNEL_STAGES_FILE: &str = "clean_funnel_stages.csv";
pub const CLEAN_OUTCOMES_FILE: &str = "clean_outcomes.csv";
pub const LEAD_METRICS_FILE: &str = "lead_metrics.csv";
pub const STATISTICAL_RESULTS_FILE: &str = "statistical_results.csv";
pub const RESULTS_FILE: &str = "results.json";

/// Read every row of a CSV file into `T`.
pub fn read_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Err(Error::InputNotFound(path.display().to_string()));
    }
    let mut reader = csv::Reader::from_path(path)?;
    let rows = reader.deserialize().collect::<std::result::Result<Vec<T>, _>>()?;
    debug!(path = %path.display(), rows = rows.len(), "Loaded table");
    Ok(rows)
}

/// Load the four raw tables from a data directory.
pub fn read_raw_tables(data_dir: &Path) -> Result<RawTables> {
    Ok(RawTables {
        leads: read_table(&data_dir.join(LEADS_FILE))?,
        contact_events: read_table(&data_dir.join(CONTACT_EVENTS_FILE))?,
        funnel_stages: read_table(&data_dir.join(FUNNEL_STAGES_FILE))?,
        outcomes: read_table(&data_dir.join(OUTCOMES_FILE))?,
    })
}

pub fn write_table<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    debug!(path = %path.display(), rows = rows.len(), "Wrote table");
    Ok(())
}

pub fn write_results(path: &Path, document: &ResultsDocument) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, document)?;
    Ok(())
}

pub fn read_results(path: &Path) -> Result<ResultsDocument> {
    if !path.exists() {
        return Err(Error::InputNotFound(path.display().to_string()));
    }
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Write every output table plus `results.json`. Returns the written paths.
pub fn write_outputs(output_dir: &Path, output: &PipelineOutput) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir)?;
    let path = |name: &str| output_dir.join(name);

    let leads: Vec<CleanLeadRow> = output.leads.iter().map(CleanLeadRow::from).collect();
    let events: Vec<CleanContactEventRow> = output
        .contact_events
        .iter()
        .map(CleanContactEventRow::from)
        .collect();
    let stages: Vec<CleanFunnelStageRow> = output
        .funnel_stages
        .iter()
        .map(CleanFunnelStageRow::from)
        .collect();
    let outcomes: Vec<CleanOutcomeRow> =
        output.outcomes.iter().map(CleanOutcomeRow::from).collect();
    let comparisons: Vec<ComparisonRow> =
        output.comparisons.iter().map(ComparisonRow::from).collect();

    write_table(&path(CLEAN_LEADS_FILE), &leads)?;
    write_table(&path(CLEAN_CONTACT_EVENTS_FILE), &events)?;
    write_table(&path(CLEAN_FUNNEL_STAGES_FILE), &stages)?;
    write_table(&path(CLEAN_OUTCOMES_FILE), &outcomes)?;
    write_table(&path(LEAD_METRICS_FILE), &output.lead_metrics)?;
    write_table(&path(STATISTICAL_RESULTS_FILE), &comparisons)?;
    write_results(&path(RESULTS_FILE), &output.results())?;

    let written: Vec<PathBuf> = [
        CLEAN_LEADS_FILE,
        CLEAN_CONTACT_EVENTS_FILE,
        CLEAN_FUNNEL_STAGES_FILE,
        CLEAN_OUTCOMES_FILE,
        LEAD_METRICS_FILE,
        STATISTICAL_RESULTS_FILE,
        RESULTS_FILE,
    ]
    .iter()
    .map(|name| path(name))
    .collect();

    info!(dir = %output_dir.display(), files = written.len(), "Outputs written");
    Ok(written)
}

fn format_date(date: Option<chrono::NaiveDate>) -> Option<String> {
    date.map(|d| d.format(DATE_FORMAT).to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanLeadRow {
    pub lead_id: String,
    pub company_name: Option<String>,
    pub contact_email: String,
    pub contact_phone: Option<String>,
    pub industry: String,
    pub region: String,
    pub source_channel: String,
    pub company_size: String,
    pub annual_revenue: f64,
    pub lead_group: Option<String>,
    pub created_at: Option<String>,
    pub assigned_at: Option<String>,
    pub was_test_data: bool,
    pub had_revenue_outlier: bool,
    pub had_phone_extension: bool,
    pub was_duplicate_email: bool,
    pub had_future_created_at: bool,
    pub had_unknown_group: bool,
    pub total_quality_issues: u32,
}

impl From<&Lead> for CleanLeadRow {
    fn from(lead: &Lead) -> Self {
        let flags = &lead.flags;
        Self {
            lead_id: lead.lead_id.clone(),
            company_name: lead.company_name.clone(),
            contact_email: lead.contact_email.clone(),
            contact_phone: lead.contact_phone.clone(),
            industry: lead.industry.clone(),
            region: lead.region.clone(),
            source_channel: lead.source_channel.clone(),
            company_size: lead.company_size.as_str().to_string(),
            annual_revenue: lead.annual_revenue,
            lead_group: lead.lead_group.map(|arm| arm.as_str().to_string()),
            created_at: lead
                .created_at
                .map(|ts| ts.format(DATETIME_FORMAT).to_string()),
            assigned_at: format_date(lead.assigned_at),
            was_test_data: flags.was_test_data,
            had_revenue_outlier: flags.had_revenue_outlier,
            had_phone_extension: flags.had_phone_extension,
            was_duplicate_email: flags.was_duplicate_email,
            had_future_created_at: flags.had_future_created_at,
            had_unknown_group: flags.had_unknown_group,
            total_quality_issues: flags.total_quality_issues(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanContactEventRow {
    pub event_id: Option<String>,
    pub lead_id: String,
    pub event_date: Option<String>,
    pub contact_type: String,
    pub response_type: String,
    pub had_nonstandard_contact_type: bool,
    pub had_missing_response: bool,
    pub had_future_date: bool,
    pub total_quality_issues: u32,
}

impl From<&ContactEvent> for CleanContactEventRow {
    fn from(event: &ContactEvent) -> Self {
        Self {
            event_id: event.event_id.clone(),
            lead_id: event.lead_id.clone(),
            event_date: format_date(event.event_date),
            contact_type: event.contact_type.as_str().to_string(),
            response_type: event.response_type.clone(),
            had_nonstandard_contact_type: event.flags.had_nonstandard_contact_type,
            had_missing_response: event.flags.had_missing_response,
            had_future_date: event.flags.had_future_date,
            total_quality_issues: event.flags.total_quality_issues(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanFunnelStageRow {
    pub stage_id: Option<String>,
    pub lead_id: String,
    pub stage_name: String,
    pub stage_order: u8,
    pub stage_date: Option<String>,
    pub stage_sequence: u32,
    pub days_in_previous_stage: Option<i64>,
    pub stage_category: String,
    pub had_invalid_stage_order: bool,
    pub had_nonstandard_stage_name: bool,
    pub had_future_date: bool,
    pub total_quality_issues: u32,
}

impl From<&SequencedStage> for CleanFunnelStageRow {
    fn from(sequenced: &SequencedStage) -> Self {
        let stage = &sequenced.stage;
        Self {
            stage_id: stage.stage_id.clone(),
            lead_id: stage.lead_id.clone(),
            stage_name: stage.stage_name.as_str().to_string(),
            stage_order: stage.stage_order,
            stage_date: format_date(stage.stage_date),
            stage_sequence: sequenced.stage_sequence,
            days_in_previous_stage: sequenced.days_in_previous_stage,
            stage_category: sequenced.stage_category.as_str().to_string(),
            had_invalid_stage_order: stage.flags.had_invalid_stage_order,
            had_nonstandard_stage_name: stage.flags.had_nonstandard_stage_name,
            had_future_date: stage.flags.had_future_date,
            total_quality_issues: stage.flags.total_quality_issues(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanOutcomeRow {
    pub outcome_id: Option<String>,
    pub lead_id: String,
    pub converted: bool,
    pub revenue: f64,
    pub outcome_date: Option<String>,
    pub days_to_close: Option<i64>,
    pub had_negative_revenue: bool,
    pub had_revenue_artifact: bool,
    pub had_revenue_outlier: bool,
    pub had_conversion_mismatch: bool,
    pub had_invalid_days_to_close: bool,
    pub had_missing_outcome_date: bool,
    pub had_future_date: bool,
    pub total_quality_issues: u32,
}

impl From<&Outcome> for CleanOutcomeRow {
    fn from(outcome: &Outcome) -> Self {
        let flags = &outcome.flags;
        Self {
            outcome_id: outcome.outcome_id.clone(),
            lead_id: outcome.lead_id.clone(),
            converted: outcome.converted,
            revenue: outcome.revenue,
            outcome_date: format_date(outcome.outcome_date),
            days_to_close: outcome.days_to_close,
            had_negative_revenue: flags.had_negative_revenue,
            had_revenue_artifact: flags.had_revenue_artifact,
            had_revenue_outlier: flags.had_revenue_outlier,
            had_conversion_mismatch: flags.had_conversion_mismatch,
            had_invalid_days_to_close: flags.had_invalid_days_to_close,
            had_missing_outcome_date: flags.had_missing_outcome_date,
            had_future_date: flags.had_future_date,
            total_quality_issues: flags.total_quality_issues(),
        }
    }
}

/// One line of `statistical_results.csv`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub metric_name: String,
    pub segment: String,
    pub test: Option<String>,
    pub status: String,
    pub sample_size_control: usize,
    pub sample_size_treatment: usize,
    pub control_mean_or_rate: Option<f64>,
    pub treatment_mean_or_rate: Option<f64>,
    pub test_statistic: Option<f64>,
    pub degrees_of_freedom: Option<f64>,
    pub p_value: Option<f64>,
    pub significant: bool,
    pub absolute_lift: Option<f64>,
    pub relative_lift: Option<f64>,
    pub ci_lower: Option<f64>,
    pub ci_upper: Option<f64>,
}

impl From<&MetricComparison> for ComparisonRow {
    fn from(comparison: &MetricComparison) -> Self {
        let stats = comparison.verdict.statistics();
        Self {
            metric_name: comparison.metric.as_str().to_string(),
            segment: comparison.segment.clone(),
            test: stats.map(|s| s.test.as_str().to_string()),
            status: match comparison.verdict {
                Verdict::Tested(_) => "tested",
                Verdict::InsufficientData => "insufficient_data",
            }
            .to_string(),
            sample_size_control: comparison.sample_size_control,
            sample_size_treatment: comparison.sample_size_treatment,
            control_mean_or_rate: comparison.control_value,
            treatment_mean_or_rate: comparison.treatment_value,
            test_statistic: stats.map(|s| s.statistic),
            degrees_of_freedom: stats.map(|s| s.degrees_of_freedom),
            p_value: stats.map(|s| s.p_value),
            significant: comparison.verdict.is_significant(),
            absolute_lift: stats.map(|s| s.absolute_lift),
            relative_lift: stats.and_then(|s| s.relative_lift),
            ci_lower: stats.map(|s| s.ci_lower),
            ci_upper: stats.map(|s| s.ci_upper),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawLead;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, content: &str) {
        let mut file = File::create(dir.join(name)).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn test_read_leads_with_generator_columns() {
        let dir = TempDir::new().unwrap();
        write_file(
            dir.path(),
            LEADS_FILE,
            "lead_id,company_name,industry,company_size,region,contact_email,contact_phone,annual_revenue,source_channel,created_at,group,assigned_at\n\
             1,Acme,Retail,small,Europe,a@example.com,555-123-4567 ext 9,abc,Website,2024-01-01 10:00:00,test,\n\
             2,,,,,,,,,,,\n",
        );

        let leads: Vec<RawLead> = read_table(&dir.path().join(LEADS_FILE)).unwrap();

        assert_eq!(leads.len(), 2);
        assert_eq!(leads[0].lead_id.as_deref(), Some("1"));
        assert_eq!(leads[0].lead_group.as_deref(), Some("test"));
        assert_eq!(leads[0].annual_revenue, None);
        assert_eq!(leads[0].assigned_at, None);
        assert_eq!(leads[1].contact_email, None);
    }

    #[test]
    fn test_missing_table_is_input_not_found() {
        let dir = TempDir::new().unwrap();
        let err = read_raw_tables(dir.path()).unwrap_err();
        assert!(matches!(err, Error::InputNotFound(path) if path.ends_with(LEADS_FILE)));
    }

    #[test]
    fn test_write_and_read_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rows.csv");
        let rows = vec![
            CleanContactEventRow {
                event_id: Some("E1".to_string()),
                lead_id: "L1".to_string(),
                event_date: Some("2024-07-01".to_string()),
                contact_type: "Phone Call".to_string(),
                response_type: "No Response".to_string(),
                had_nonstandard_contact_type: false,
                had_missing_response: true,
                had_future_date: false,
                total_quality_issues: 1,
            },
            CleanContactEventRow {
                event_id: None,
                lead_id: "L2".to_string(),
                event_date: None,
                contact_type: "Other".to_string(),
                response_type: "Interested".to_string(),
                had_nonstandard_contact_type: true,
                had_missing_response: false,
                had_future_date: false,
                total_quality_issues: 1,
            },
        ];

        write_table(&path, &rows).unwrap();
        let back: Vec<CleanContactEventRow> = read_table(&path).unwrap();

        assert_eq!(back.len(), 2);
        assert_eq!(back[0].contact_type, "Phone Call");
        assert_eq!(back[1].event_id, None);
        assert!(back[1].had_nonstandard_contact_type);
    }

    #[test]
    fn test_read_results_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = read_results(&dir.path().join(RESULTS_FILE)).unwrap_err();
        assert!(matches!(err, Error::InputNotFound(_)));
    }
}
