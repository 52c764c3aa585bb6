//! Outcome records (terminal result of a lead)

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{lenient, QualityFlags, DATE_FORMAT};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawOutcome {
    pub outcome_id: Option<String>,
    pub lead_id: Option<String>,
    #[serde(deserialize_with = "lenient::flag")]
    pub converted: Option<bool>,
    #[serde(deserialize_with = "lenient::decimal")]
    pub revenue: Option<f64>,
    pub outcome_date: Option<String>,
    #[serde(deserialize_with = "lenient::integer")]
    pub days_to_close: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeFlags {
    pub had_negative_revenue: bool,
    pub had_revenue_artifact: bool,
    pub had_revenue_outlier: bool,
    pub had_conversion_mismatch: bool,
    pub had_invalid_days_to_close: bool,
    pub had_missing_outcome_date: bool,
    pub had_future_date: bool,
}

impl QualityFlags for OutcomeFlags {
    fn flags(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("had_negative_revenue", self.had_negative_revenue),
            ("had_revenue_artifact", self.had_revenue_artifact),
            ("had_revenue_outlier", self.had_revenue_outlier),
            ("had_conversion_mismatch", self.had_conversion_mismatch),
            ("had_invalid_days_to_close", self.had_invalid_days_to_close),
            ("had_missing_outcome_date", self.had_missing_outcome_date),
            ("had_future_date", self.had_future_date),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub outcome_id: Option<String>,
    pub lead_id: String,
    pub converted: bool,
    pub revenue: f64,
    pub outcome_date: Option<NaiveDate>,
    pub days_to_close: Option<i64>,
    pub flags: OutcomeFlags,
}

impl From<&Outcome> for RawOutcome {
    fn from(outcome: &Outcome) -> Self {
        RawOutcome {
            outcome_id: outcome.outcome_id.clone(),
            lead_id: Some(outcome.lead_id.clone()),
            converted: Some(outcome.converted),
            revenue: Some(outcome.revenue),
            outcome_date: outcome
                .outcome_date
                .map(|d| d.format(DATE_FORMAT).to_string()),
            days_to_close: outcome.days_to_close,
        }
    }
}
