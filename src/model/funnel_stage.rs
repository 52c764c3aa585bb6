//! Funnel stage records and their sequenced form

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{lenient, QualityFlags, DATE_FORMAT};

/// Lowest valid stage position.
pub const MIN_STAGE_ORDER: u8 = 1;

/// Highest valid stage position.
pub const MAX_STAGE_ORDER: u8 = 7;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawFunnelStage {
    pub stage_id: Option<String>,
    pub lead_id: Option<String>,
    pub stage_name: Option<String>,
    pub stage_date: Option<String>,
    #[serde(deserialize_with = "lenient::integer")]
    pub stage_order: Option<i64>,
}

/// The seven pipeline stages, in business order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StageName {
    New,
    Contacted,
    Qualified,
    #[serde(rename = "Demo Scheduled")]
    DemoScheduled,
    #[serde(rename = "Proposal Sent")]
    ProposalSent,
    #[serde(rename = "Closed Won")]
    ClosedWon,
    #[serde(rename = "Closed Lost")]
    ClosedLost,
    Unknown,
}

impl StageName {
    pub const ALL: [StageName; 7] = [
        StageName::New,
        StageName::Contacted,
        StageName::Qualified,
        StageName::DemoScheduled,
        StageName::ProposalSent,
        StageName::ClosedWon,
        StageName::ClosedLost,
    ];

    /// Map free text onto a stage using fixed synonym lists.
    pub fn parse(value: &str) -> Self {
        let normalized = value
            .trim()
            .to_lowercase()
            .replace(['_', '-'], " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        match normalized.as_str() {
            "new" | "new lead" | "lead" => StageName::New,
            "contacted" | "contact made" | "reached out" => StageName::Contacted,
            "qualified" | "qualification" | "sql" => StageName::Qualified,
            "demo scheduled" | "demo" | "demo booked" | "demo set" => StageName::DemoScheduled,
            "proposal sent" | "proposal" | "quote sent" | "quote" => StageName::ProposalSent,
            "closed won" | "won" | "deal won" => StageName::ClosedWon,
            "closed lost" | "lost" | "deal lost" => StageName::ClosedLost,
            _ => StageName::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::New => "New",
            StageName::Contacted => "Contacted",
            StageName::Qualified => "Qualified",
            StageName::DemoScheduled => "Demo Scheduled",
            StageName::ProposalSent => "Proposal Sent",
            StageName::ClosedWon => "Closed Won",
            StageName::ClosedLost => "Closed Lost",
            StageName::Unknown => "Unknown",
        }
    }

    /// Position in the pipeline, 1-based. Unknown stages sit at the start.
    pub fn canonical_order(&self) -> u8 {
        match self {
            StageName::New | StageName::Unknown => 1,
            StageName::Contacted => 2,
            StageName::Qualified => 3,
            StageName::DemoScheduled => 4,
            StageName::ProposalSent => 5,
            StageName::ClosedWon => 6,
            StageName::ClosedLost => 7,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, StageName::ClosedWon | StageName::ClosedLost)
    }

    pub fn category(&self) -> StageCategory {
        match self {
            StageName::New | StageName::Contacted => StageCategory::Early,
            StageName::Qualified | StageName::DemoScheduled => StageCategory::Mid,
            StageName::ProposalSent | StageName::ClosedWon | StageName::ClosedLost => {
                StageCategory::Late
            }
            StageName::Unknown => StageCategory::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageCategory {
    #[serde(rename = "Early Stage")]
    Early,
    #[serde(rename = "Mid Stage")]
    Mid,
    #[serde(rename = "Late Stage")]
    Late,
    Unknown,
}

impl StageCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageCategory::Early => "Early Stage",
            StageCategory::Mid => "Mid Stage",
            StageCategory::Late => "Late Stage",
            StageCategory::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FunnelStageFlags {
    pub had_invalid_stage_order: bool,
    pub had_nonstandard_stage_name: bool,
    pub had_future_date: bool,
}

impl QualityFlags for FunnelStageFlags {
    fn flags(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("had_invalid_stage_order", self.had_invalid_stage_order),
            ("had_nonstandard_stage_name", self.had_nonstandard_stage_name),
            ("had_future_date", self.had_future_date),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunnelStage {
    pub stage_id: Option<String>,
    pub lead_id: String,
    pub stage_name: StageName,
    pub stage_order: u8,
    pub stage_date: Option<NaiveDate>,
    pub flags: FunnelStageFlags,
}

impl From<&FunnelStage> for RawFunnelStage {
    fn from(stage: &FunnelStage) -> Self {
        RawFunnelStage {
            stage_id: stage.stage_id.clone(),
            lead_id: Some(stage.lead_id.clone()),
            stage_name: Some(stage.stage_name.as_str().to_string()),
            stage_date: stage.stage_date.map(|d| d.format(DATE_FORMAT).to_string()),
            stage_order: Some(i64::from(stage.stage_order)),
        }
    }
}

/// A funnel stage placed in its lead's chronological sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct SequencedStage {
    pub stage: FunnelStage,
    /// Dense 1-based rank within the lead.
    pub stage_sequence: u32,
    /// Whole days since the previous stage; `None` only for the first stage.
    pub days_in_previous_stage: Option<i64>,
    pub stage_category: StageCategory,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_name_synonyms() {
        assert_eq!(StageName::parse("qualified"), StageName::Qualified);
        assert_eq!(StageName::parse("demo"), StageName::DemoScheduled);
        assert_eq!(StageName::parse("quote sent"), StageName::ProposalSent);
        assert_eq!(StageName::parse("won"), StageName::ClosedWon);
        assert_eq!(StageName::parse("Closed_Lost"), StageName::ClosedLost);
        assert_eq!(StageName::parse("negotiation"), StageName::Unknown);
    }

    #[test]
    fn test_canonical_names_parse_to_themselves() {
        for stage in StageName::ALL {
            assert_eq!(StageName::parse(stage.as_str()), stage);
        }
    }

    #[test]
    fn test_canonical_order_is_one_through_seven() {
        let orders: Vec<u8> = StageName::ALL.iter().map(|s| s.canonical_order()).collect();
        assert_eq!(orders, vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_stage_categories() {
        assert_eq!(StageName::Contacted.category(), StageCategory::Early);
        assert_eq!(StageName::DemoScheduled.category(), StageCategory::Mid);
        assert_eq!(StageName::ClosedLost.category(), StageCategory::Late);
        assert_eq!(StageName::Unknown.category(), StageCategory::Unknown);
        assert_eq!(StageCategory::Late.as_str(), "Late Stage");
    }
}
