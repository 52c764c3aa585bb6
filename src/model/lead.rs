//! Lead records

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::{lenient, Arm, QualityFlags, DATETIME_FORMAT, DATE_FORMAT};

/// Lead row as exported by the CRM.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawLead {
    pub lead_id: Option<String>,
    pub company_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub industry: Option<String>,
    pub region: Option<String>,
    pub source_channel: Option<String>,
    pub company_size: Option<String>,
    pub created_at: Option<String>,
    #[serde(deserialize_with = "lenient::decimal")]
    pub annual_revenue: Option<f64>,
    #[serde(rename = "group", alias = "lead_group")]
    pub lead_group: Option<String>,
    pub assigned_at: Option<String>,
}

/// Company size bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CompanySize {
    Small,
    Medium,
    Large,
    Enterprise,
    Unknown,
}

impl CompanySize {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "small" => CompanySize::Small,
            "medium" => CompanySize::Medium,
            "large" => CompanySize::Large,
            "enterprise" => CompanySize::Enterprise,
            _ => CompanySize::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompanySize::Small => "Small",
            CompanySize::Medium => "Medium",
            CompanySize::Large => "Large",
            CompanySize::Enterprise => "Enterprise",
            CompanySize::Unknown => "Unknown",
        }
    }
}

/// What was wrong with a raw lead before cleaning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LeadFlags {
    pub was_test_data: bool,
    pub had_revenue_outlier: bool,
    pub had_phone_extension: bool,
    /// Set by deduplication on the surviving record of a shared email.
    pub was_duplicate_email: bool,
    pub had_future_created_at: bool,
    pub had_unknown_group: bool,
}

impl QualityFlags for LeadFlags {
    fn flags(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("was_test_data", self.was_test_data),
            ("had_revenue_outlier", self.had_revenue_outlier),
            ("had_phone_extension", self.had_phone_extension),
            ("was_duplicate_email", self.was_duplicate_email),
            ("had_future_created_at", self.had_future_created_at),
            ("had_unknown_group", self.had_unknown_group),
        ]
    }
}

/// Cleaned lead.
#[derive(Debug, Clone, PartialEq)]
pub struct Lead {
    pub lead_id: String,
    pub company_name: Option<String>,
    pub contact_email: String,
    pub contact_phone: Option<String>,
    pub industry: String,
    pub region: String,
    pub source_channel: String,
    pub company_size: CompanySize,
    pub annual_revenue: f64,
    pub lead_group: Option<Arm>,
    pub created_at: Option<NaiveDateTime>,
    pub assigned_at: Option<NaiveDate>,
    pub flags: LeadFlags,
}

impl Lead {
    /// Same cleaned values, ignoring flags.
    pub fn same_values(&self, other: &Lead) -> bool {
        Lead {
            flags: other.flags,
            ..self.clone()
        } == *other
    }
}

impl From<&Lead> for RawLead {
    fn from(lead: &Lead) -> Self {
        RawLead {
            lead_id: Some(lead.lead_id.clone()),
            company_name: lead.company_name.clone(),
            contact_email: Some(lead.contact_email.clone()),
            contact_phone: lead.contact_phone.clone(),
            industry: Some(lead.industry.clone()),
            region: Some(lead.region.clone()),
            source_channel: Some(lead.source_channel.clone()),
            company_size: Some(lead.company_size.as_str().to_string()),
            created_at: lead
                .created_at
                .map(|ts| ts.format(DATETIME_FORMAT).to_string()),
            annual_revenue: Some(lead.annual_revenue),
            lead_group: lead.lead_group.map(|arm| arm.as_str().to_string()),
            assigned_at: lead.assigned_at.map(|d| d.format(DATE_FORMAT).to_string()),
        }
    }
}
