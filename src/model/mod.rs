//! Record types for the four CRM tables
//!
//! Each entity has a raw shape (every column optional, exactly as loaded) and a
//! cleaned shape carrying its quality flags. Shared pieces live here:
//! - [`ProcessingContext`]: the injected "today" used by every date rule
//! - [`Cleaned`] / [`DropReason`]: the disposition a cleaner returns
//! - [`Arm`]: experiment assignment
//! - [`QualityFlags`]: uniform access to per-record flag sets

pub mod contact_event;
pub mod funnel_stage;
pub mod lead;
pub mod lenient;
pub mod outcome;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

pub use contact_event::{ContactEvent, ContactEventFlags, ContactType, RawContactEvent};
pub use funnel_stage::{
    FunnelStage, FunnelStageFlags, RawFunnelStage, SequencedStage, StageCategory, StageName,
};
pub use lead::{CompanySize, Lead, LeadFlags, RawLead};
pub use outcome::{Outcome, OutcomeFlags, RawOutcome};

/// Text used for categorical fields that were blank or unrecognised.
pub const UNKNOWN: &str = "Unknown";

/// Timestamp layout used when cleaned values are written back out.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Date layout used when cleaned values are written back out.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Reference point for "future" and "missing" date rules.
///
/// Passed explicitly to every cleaner so a run is reproducible for any date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingContext {
    pub processing_date: NaiveDate,
}

impl ProcessingContext {
    pub fn new(processing_date: NaiveDate) -> Self {
        Self { processing_date }
    }

    /// Midnight at the start of the processing date.
    pub fn processing_datetime(&self) -> NaiveDateTime {
        self.processing_date.and_time(NaiveTime::MIN)
    }

    /// A date strictly after the processing date.
    pub fn is_future(&self, date: NaiveDate) -> bool {
        date > self.processing_date
    }
}

/// Why a raw record did not make it into the cleaned set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    MissingLeadId,
    MissingEmail,
    TestData,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::MissingLeadId => "missing_lead_id",
            DropReason::MissingEmail => "missing_email",
            DropReason::TestData => "test_data",
        }
    }
}

/// Result of cleaning one raw record.
#[derive(Debug, Clone, PartialEq)]
pub enum Cleaned<T> {
    Kept(T),
    Dropped(DropReason),
}

impl<T> Cleaned<T> {
    pub fn kept(self) -> Option<T> {
        match self {
            Cleaned::Kept(record) => Some(record),
            Cleaned::Dropped(_) => None,
        }
    }

    pub fn drop_reason(&self) -> Option<DropReason> {
        match self {
            Cleaned::Kept(_) => None,
            Cleaned::Dropped(reason) => Some(*reason),
        }
    }

    pub fn is_kept(&self) -> bool {
        matches!(self, Cleaned::Kept(_))
    }
}

/// Experiment arm a lead was assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arm {
    Control,
    Treatment,
}

impl Arm {
    /// Parse a raw `group` value. The CRM export writes `test` for the
    /// treatment arm; `treatment` is accepted as well.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "control" => Some(Arm::Control),
            "test" | "treatment" => Some(Arm::Treatment),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Arm::Control => "control",
            Arm::Treatment => "treatment",
        }
    }
}

/// Uniform view over an entity's flag set.
pub trait QualityFlags {
    /// Every flag as `(name, raised)`, in a stable order.
    fn flags(&self) -> Vec<(&'static str, bool)>;

    /// Number of raised flags.
    fn total_quality_issues(&self) -> u32 {
        self.flags().iter().filter(|(_, raised)| *raised).count() as u32
    }
}

/// Trimmed text, or `None` for null and whitespace-only values.
pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Round a money amount to cents.
pub(crate) fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
