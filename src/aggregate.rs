//! Per-lead metric table and arm/segment grouping
//!
//! One row per canonical lead, left-joined with:
//! - at most one outcome (latest `outcome_date`, then highest `outcome_id`)
//! - its contact events, reduced to counts and response classification
//! - its sequenced funnel, reduced to a [`FunnelSummary`]
//!
//! Child rows whose lead is not canonical are counted as orphans and skipped.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::funnel::FunnelSummary;
use crate::model::{
    Arm, CompanySize, ContactEvent, Lead, Outcome, QualityFlags, SequencedStage, StageName,
};

/// A response counts toward responsiveness only within this many days of assignment.
pub const RESPONSE_WINDOW_DAYS: i64 = 30;

/// Segment key used when no segment dimension is requested.
pub const ALL_SEGMENT: &str = "all";

/// One analysis-ready row per lead.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadMetrics {
    pub lead_id: String,
    pub lead_group: Option<Arm>,
    pub industry: String,
    pub region: String,
    pub company_size: CompanySize,
    pub source_channel: String,
    pub assigned_at: Option<NaiveDate>,
    pub contact_count: usize,
    pub first_response: Option<String>,
    pub last_response: Option<String>,
    /// Responded within [`RESPONSE_WINDOW_DAYS`] of assignment.
    pub responded: bool,
    pub converted: bool,
    /// Days to close for converted leads only.
    pub time_to_close: Option<i64>,
    /// Outcome revenue, 0.00 when the lead has no outcome.
    pub revenue: f64,
    pub days_to_first_closed_stage: Option<i64>,
    pub funnel_completed: bool,
    pub furthest_stage: Option<StageName>,
    pub total_quality_issues: u32,
}

/// Child rows that referenced a lead outside the canonical set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrphanCounts {
    pub outcomes: usize,
    pub contact_events: usize,
    pub funnel_stages: usize,
    /// Extra outcomes beyond the one kept for a lead.
    pub surplus_outcomes: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    pub rows: Vec<LeadMetrics>,
    pub orphans: OrphanCounts,
}

fn outcome_rank(a: &Outcome, b: &Outcome) -> std::cmp::Ordering {
    a.outcome_date
        .cmp(&b.outcome_date)
        .then_with(|| a.outcome_id.cmp(&b.outcome_id))
}

fn event_order(a: &&ContactEvent, b: &&ContactEvent) -> std::cmp::Ordering {
    match (a.event_date, b.event_date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    }
    .then_with(|| a.event_id.cmp(&b.event_id))
}

/// Whether any real response landed inside the window after assignment.
/// Responses logged before assignment count as day 0.
pub fn responded_within_window(assigned_at: Option<NaiveDate>, events: &[&ContactEvent]) -> bool {
    let Some(assigned_at) = assigned_at else {
        return false;
    };
    events
        .iter()
        .filter(|e| e.is_response())
        .filter_map(|e| e.event_date)
        .any(|date| (date - assigned_at).num_days().max(0) <= RESPONSE_WINDOW_DAYS)
}

/// Join cleaned tables into the per-lead metric table.
pub fn aggregate(
    leads: &[Lead],
    outcomes: &[Outcome],
    events: &[ContactEvent],
    funnels: &BTreeMap<String, Vec<SequencedStage>>,
) -> Aggregation {
    let canonical: HashSet<&str> = leads.iter().map(|l| l.lead_id.as_str()).collect();
    let mut orphans = OrphanCounts::default();

    let mut outcome_by_lead: HashMap<&str, &Outcome> = HashMap::new();
    for outcome in outcomes {
        if !canonical.contains(outcome.lead_id.as_str()) {
            orphans.outcomes += 1;
            continue;
        }
        match outcome_by_lead.get(outcome.lead_id.as_str()) {
            Some(current) => {
                orphans.surplus_outcomes += 1;
                if outcome_rank(outcome, current).is_gt() {
                    outcome_by_lead.insert(outcome.lead_id.as_str(), outcome);
                }
            }
            None => {
                outcome_by_lead.insert(outcome.lead_id.as_str(), outcome);
            }
        }
    }

    let mut events_by_lead: HashMap<&str, Vec<&ContactEvent>> = HashMap::new();
    for event in events {
        if canonical.contains(event.lead_id.as_str()) {
            events_by_lead
                .entry(event.lead_id.as_str())
                .or_default()
                .push(event);
        } else {
            orphans.contact_events += 1;
        }
    }

    orphans.funnel_stages = funnels
        .iter()
        .filter(|(lead_id, _)| !canonical.contains(lead_id.as_str()))
        .map(|(_, stages)| stages.len())
        .sum();

    let rows = leads
        .iter()
        .map(|lead| {
            let outcome = outcome_by_lead.get(lead.lead_id.as_str()).copied();
            let mut lead_events = events_by_lead
                .get(lead.lead_id.as_str())
                .cloned()
                .unwrap_or_default();
            lead_events.sort_by(event_order);
            let summary = funnels
                .get(&lead.lead_id)
                .map(|seq| FunnelSummary::from_sequence(seq))
                .unwrap_or_default();

            build_row(lead, outcome, &lead_events, &summary)
        })
        .collect();

    debug!(
        orphan_outcomes = orphans.outcomes,
        orphan_events = orphans.contact_events,
        orphan_stages = orphans.funnel_stages,
        "Aggregated lead metrics"
    );

    Aggregation { rows, orphans }
}

fn build_row(
    lead: &Lead,
    outcome: Option<&Outcome>,
    events: &[&ContactEvent],
    summary: &FunnelSummary,
) -> LeadMetrics {
    let converted = outcome.is_some_and(|o| o.converted);
    let total_quality_issues = lead.flags.total_quality_issues()
        + outcome.map_or(0, |o| o.flags.total_quality_issues())
        + events
            .iter()
            .map(|e| e.flags.total_quality_issues())
            .sum::<u32>()
        + summary.total_quality_issues;

    LeadMetrics {
        lead_id: lead.lead_id.clone(),
        lead_group: lead.lead_group,
        industry: lead.industry.clone(),
        region: lead.region.clone(),
        company_size: lead.company_size,
        source_channel: lead.source_channel.clone(),
        assigned_at: lead.assigned_at,
        contact_count: events.len(),
        first_response: events.first().map(|e| e.response_type.clone()),
        last_response: events.last().map(|e| e.response_type.clone()),
        responded: responded_within_window(lead.assigned_at, events),
        converted,
        time_to_close: outcome.filter(|o| o.converted).and_then(|o| o.days_to_close),
        revenue: outcome.map_or(0.0, |o| o.revenue),
        days_to_first_closed_stage: lead
            .assigned_at
            .zip(summary.first_closed_date)
            .map(|(assigned, closed)| (closed - assigned).num_days()),
        funnel_completed: summary.completed(),
        furthest_stage: summary.furthest_stage,
        total_quality_issues,
    }
}

/// Dimension used to split the comparison into sub-groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    Industry,
    Region,
    CompanySize,
    SourceChannel,
}

impl Segment {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().replace('-', "_").as_str() {
            "industry" => Some(Segment::Industry),
            "region" => Some(Segment::Region),
            "company_size" | "size" => Some(Segment::CompanySize),
            "source_channel" | "channel" => Some(Segment::SourceChannel),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Segment::Industry => "industry",
            Segment::Region => "region",
            Segment::CompanySize => "company_size",
            Segment::SourceChannel => "source_channel",
        }
    }

    /// The segment value of a row.
    pub fn value_of(&self, row: &LeadMetrics) -> String {
        match self {
            Segment::Industry => row.industry.clone(),
            Segment::Region => row.region.clone(),
            Segment::CompanySize => row.company_size.as_str().to_string(),
            Segment::SourceChannel => row.source_channel.clone(),
        }
    }
}

/// The four headline metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Conversion,
    TimeToClose,
    Responsiveness,
    RevenuePerLead,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Conversion,
        Metric::TimeToClose,
        Metric::Responsiveness,
        Metric::RevenuePerLead,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Conversion => "conversion",
            Metric::TimeToClose => "time_to_close",
            Metric::Responsiveness => "responsiveness",
            Metric::RevenuePerLead => "revenue_per_lead",
        }
    }
}

/// Observations of each metric for one arm.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricSamples {
    pub leads: usize,
    pub conversion: Vec<f64>,
    pub time_to_close: Vec<f64>,
    pub responsiveness: Vec<f64>,
    pub revenue_per_lead: Vec<f64>,
}

impl MetricSamples {
    pub fn push(&mut self, row: &LeadMetrics) {
        self.leads += 1;
        self.conversion.push(if row.converted { 1.0 } else { 0.0 });
        if let Some(days) = row.time_to_close {
            self.time_to_close.push(days as f64);
        }
        self.responsiveness
            .push(if row.responded { 1.0 } else { 0.0 });
        self.revenue_per_lead.push(row.revenue);
    }

    pub fn get(&self, metric: Metric) -> &[f64] {
        match metric {
            Metric::Conversion => &self.conversion,
            Metric::TimeToClose => &self.time_to_close,
            Metric::Responsiveness => &self.responsiveness,
            Metric::RevenuePerLead => &self.revenue_per_lead,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArmSamples {
    pub control: MetricSamples,
    pub treatment: MetricSamples,
}

impl ArmSamples {
    pub fn arm_mut(&mut self, arm: Arm) -> &mut MetricSamples {
        match arm {
            Arm::Control => &mut self.control,
            Arm::Treatment => &mut self.treatment,
        }
    }
}

/// Group rows by segment value and arm.
///
/// Every segment value seen in `rows` gets a group, even when none of its
/// leads has an arm; such rows add no samples. With no segment values at all
/// the result still holds an empty [`ALL_SEGMENT`] group, so each metric is
/// reported as untestable rather than omitted.
pub fn group_by_arm(rows: &[LeadMetrics], segment: Option<Segment>) -> BTreeMap<String, ArmSamples> {
    let mut groups: BTreeMap<String, ArmSamples> = BTreeMap::new();
    for row in rows {
        let key = segment
            .map(|s| s.value_of(row))
            .unwrap_or_else(|| ALL_SEGMENT.to_string());
        let group = groups.entry(key).or_default();
        if let Some(arm) = row.lead_group {
            group.arm_mut(arm).push(row);
        }
    }
    if groups.is_empty() {
        groups.insert(ALL_SEGMENT.to_string(), ArmSamples::default());
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::funnel::sequence_all;
    use crate::model::contact_event::NO_RESPONSE;
    use crate::model::{
        ContactEventFlags, ContactType, FunnelStage, FunnelStageFlags, LeadFlags, OutcomeFlags,
    };

    fn date(m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2024, m, d)
    }

    fn lead(id: &str, arm: Option<Arm>, industry: &str) -> Lead {
        Lead {
            lead_id: id.to_string(),
            company_name: None,
            contact_email: format!("{id}@example.com"),
            contact_phone: None,
            industry: industry.to_string(),
            region: "Europe".to_string(),
            source_channel: "Website".to_string(),
            company_size: CompanySize::Medium,
            annual_revenue: 0.0,
            lead_group: arm,
            created_at: None,
            assigned_at: date(6, 1),
            flags: LeadFlags::default(),
        }
    }

    fn outcome(id: &str, lead_id: &str, revenue: f64, day: u32) -> Outcome {
        Outcome {
            outcome_id: Some(id.to_string()),
            lead_id: lead_id.to_string(),
            converted: revenue > 0.0,
            revenue,
            outcome_date: date(8, day),
            days_to_close: Some(40),
            flags: OutcomeFlags::default(),
        }
    }

    fn event(id: &str, lead_id: &str, day: Option<NaiveDate>, response: &str) -> ContactEvent {
        ContactEvent {
            event_id: Some(id.to_string()),
            lead_id: lead_id.to_string(),
            event_date: day,
            contact_type: ContactType::Email,
            response_type: response.to_string(),
            flags: ContactEventFlags::default(),
        }
    }

    fn stage(lead_id: &str, name: StageName, day: Option<NaiveDate>) -> FunnelStage {
        FunnelStage {
            stage_id: None,
            lead_id: lead_id.to_string(),
            stage_name: name,
            stage_order: name.canonical_order(),
            stage_date: day,
            flags: FunnelStageFlags::default(),
        }
    }

    #[test]
    fn test_lead_without_children_gets_zero_metrics() {
        let agg = aggregate(&[lead("L1", Some(Arm::Control), "Retail")], &[], &[], &BTreeMap::new());
        let row = &agg.rows[0];

        assert!(!row.converted);
        assert_eq!(row.revenue, 0.0);
        assert_eq!(row.time_to_close, None);
        assert!(!row.responded);
        assert_eq!(row.contact_count, 0);
        assert!(!row.funnel_completed);
    }

    #[test]
    fn test_time_to_close_only_for_converted() {
        let leads = [
            lead("L1", Some(Arm::Control), "Retail"),
            lead("L2", Some(Arm::Control), "Retail"),
        ];
        let outcomes = [outcome("O1", "L1", 12_000.0, 1), outcome("O2", "L2", 0.0, 1)];
        let agg = aggregate(&leads, &outcomes, &[], &BTreeMap::new());

        assert_eq!(agg.rows[0].time_to_close, Some(40));
        assert_eq!(agg.rows[0].revenue, 12_000.0);
        assert_eq!(agg.rows[1].time_to_close, None);
        assert!(!agg.rows[1].converted);
    }

    #[test]
    fn test_latest_outcome_wins_and_orphans_counted() {
        let leads = [lead("L1", Some(Arm::Treatment), "Retail")];
        let outcomes = [
            outcome("O1", "L1", 5_000.0, 1),
            outcome("O2", "L1", 9_000.0, 15),
            outcome("O3", "GONE", 1_000.0, 3),
        ];
        let agg = aggregate(&leads, &outcomes, &[], &BTreeMap::new());

        assert_eq!(agg.rows[0].revenue, 9_000.0);
        assert_eq!(agg.orphans.outcomes, 1);
        assert_eq!(agg.orphans.surplus_outcomes, 1);
    }

    #[test]
    fn test_responsiveness_window() {
        let leads = [
            lead("L1", Some(Arm::Control), "Retail"),
            lead("L2", Some(Arm::Control), "Retail"),
            lead("L3", Some(Arm::Control), "Retail"),
            lead("L4", Some(Arm::Control), "Retail"),
            lead("L5", Some(Arm::Control), "Retail"),
            lead("L6", Some(Arm::Control), "Retail"),
        ];
        let events = [
            event("E1", "L1", date(6, 20), "Interested"),
            event("E2", "L2", date(6, 5), NO_RESPONSE),
            event("E3", "L2", date(8, 1), "Responded"),
            event("E4", "L3", date(5, 30), "Callback Requested"),
            event("E5", "GONE", date(6, 2), "Responded"),
            event("E6", "L4", date(7, 1), "Responded"),
            event("E7", "L5", date(7, 2), "Responded"),
            event("E8", "L6", None, "Responded"),
        ];
        let agg = aggregate(&leads, &[], &events, &BTreeMap::new());

        assert!(agg.rows[0].responded);
        assert!(!agg.rows[1].responded, "response after 61 days is outside the window");
        assert!(agg.rows[2].responded, "pre-assignment response counts as day 0");
        assert!(agg.rows[3].responded, "day 30 is inside the window");
        assert!(!agg.rows[4].responded, "day 31 is outside the window");
        assert!(!agg.rows[5].responded, "an undated response never counts");
        assert_eq!(agg.rows[5].contact_count, 1);
        assert_eq!(agg.rows[1].contact_count, 2);
        assert_eq!(agg.rows[1].first_response.as_deref(), Some(NO_RESPONSE));
        assert_eq!(agg.rows[1].last_response.as_deref(), Some("Responded"));
        assert_eq!(agg.orphans.contact_events, 1);
    }

    #[test]
    fn test_funnel_summary_joined() {
        let leads = [lead("L1", Some(Arm::Control), "Retail")];
        let funnels = sequence_all(vec![
            stage("L1", StageName::Contacted, date(6, 2)),
            stage("L1", StageName::ClosedWon, date(7, 1)),
            stage("GONE", StageName::New, date(6, 2)),
        ]);
        let agg = aggregate(&leads, &[], &[], &funnels);

        assert!(agg.rows[0].funnel_completed);
        assert_eq!(agg.rows[0].days_to_first_closed_stage, Some(30));
        assert_eq!(agg.rows[0].furthest_stage, Some(StageName::ClosedWon));
        assert_eq!(agg.orphans.funnel_stages, 1);
    }

    #[test]
    fn test_group_by_arm_and_segment() {
        let leads = [
            lead("L1", Some(Arm::Control), "Retail"),
            lead("L2", Some(Arm::Treatment), "Retail"),
            lead("L3", Some(Arm::Control), "Finance"),
            lead("L4", None, "Finance"),
        ];
        let outcomes = [outcome("O2", "L2", 7_500.0, 2)];
        let agg = aggregate(&leads, &outcomes, &[], &BTreeMap::new());

        let overall = group_by_arm(&agg.rows, None);
        assert_eq!(overall.len(), 1);
        assert_eq!(overall[ALL_SEGMENT].control.leads, 2);
        assert_eq!(overall[ALL_SEGMENT].treatment.leads, 1);
        assert_eq!(overall[ALL_SEGMENT].treatment.get(Metric::Conversion), &[1.0]);
        assert_eq!(overall[ALL_SEGMENT].treatment.get(Metric::TimeToClose), &[40.0]);
        assert!(overall[ALL_SEGMENT].control.get(Metric::TimeToClose).is_empty());

        let by_industry = group_by_arm(&agg.rows, Some(Segment::Industry));
        assert_eq!(by_industry.len(), 2);
        assert_eq!(by_industry["Finance"].treatment.leads, 0);
        assert_eq!(by_industry["Retail"].treatment.get(Metric::RevenuePerLead), &[7_500.0]);
    }

    #[test]
    fn test_shared_lead_id_sees_same_children() {
        let mut second = lead("L1", Some(Arm::Treatment), "Retail");
        second.contact_email = "other@example.com".to_string();
        let leads = [lead("L1", Some(Arm::Control), "Retail"), second];
        let outcomes = [outcome("O1", "L1", 4_000.0, 3)];
        let events = [event("E1", "L1", date(6, 3), "Interested")];

        let agg = aggregate(&leads, &outcomes, &events, &BTreeMap::new());

        let counts: Vec<usize> = agg.rows.iter().map(|r| r.contact_count).collect();
        assert_eq!(counts, vec![1, 1]);
        assert!(agg.rows.iter().all(|r| r.converted && r.responded));
    }

    #[test]
    fn test_group_by_arm_keeps_groups_without_arms() {
        assert_eq!(group_by_arm(&[], None)[ALL_SEGMENT].control.leads, 0);
        assert_eq!(group_by_arm(&[], Some(Segment::Region)).len(), 1);

        let agg = aggregate(&[lead("L1", None, "Retail")], &[], &[], &BTreeMap::new());
        let overall = group_by_arm(&agg.rows, None);
        assert_eq!(overall.len(), 1);
        assert_eq!(overall[ALL_SEGMENT].control.leads, 0);
        assert_eq!(overall[ALL_SEGMENT].treatment.leads, 0);

        let by_region = group_by_arm(&agg.rows, Some(Segment::Region));
        assert_eq!(by_region.keys().collect::<Vec<_>>(), vec!["Europe"]);
    }

    #[test]
    fn test_segment_parse() {
        assert_eq!(Segment::parse("Industry"), Some(Segment::Industry));
        assert_eq!(Segment::parse("company-size"), Some(Segment::CompanySize));
        assert_eq!(Segment::parse("channel"), Some(Segment::SourceChannel));
        assert_eq!(Segment::parse("planet"), None);
    }
}
