//! Funnel sequencing
//!
//! Stages of one lead are ordered by `(stage_date, stage_order, stage_id)`
//! ascending, with undated stages after every dated one. Each gets a dense
//! 1-based `stage_sequence` and the whole-day gap to its predecessor. A gap
//! involving an undated stage is 0, so the gap is null only for the first stage.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::model::{FunnelStage, QualityFlags, SequencedStage, StageName};

fn chronological(a: &FunnelStage, b: &FunnelStage) -> Ordering {
    let by_date = match (a.stage_date, b.stage_date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_date
        .then_with(|| a.stage_order.cmp(&b.stage_order))
        .then_with(|| a.stage_id.cmp(&b.stage_id))
}

/// Sequence the stages of a single lead.
pub fn sequence_lead(mut stages: Vec<FunnelStage>) -> Vec<SequencedStage> {
    stages.sort_by(chronological);

    let mut previous: Option<Option<NaiveDate>> = None;
    stages
        .into_iter()
        .enumerate()
        .map(|(idx, stage)| {
            let days_in_previous_stage = previous.map(|prev| match (prev, stage.stage_date) {
                (Some(p), Some(c)) => (c - p).num_days(),
                _ => 0,
            });
            previous = Some(stage.stage_date);

            SequencedStage {
                stage_category: stage.stage_name.category(),
                stage_sequence: idx as u32 + 1,
                days_in_previous_stage,
                stage,
            }
        })
        .collect()
}

/// Sequence every lead's stages. Leads come back ordered by `lead_id`.
pub fn sequence_all(stages: Vec<FunnelStage>) -> BTreeMap<String, Vec<SequencedStage>> {
    let mut by_lead: BTreeMap<String, Vec<FunnelStage>> = BTreeMap::new();
    for stage in stages {
        by_lead.entry(stage.lead_id.clone()).or_default().push(stage);
    }

    by_lead
        .into_iter()
        .map(|(lead_id, stages)| (lead_id, sequence_lead(stages)))
        .collect()
}

/// Per-lead reduction of a sequenced funnel.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FunnelSummary {
    pub stage_count: usize,
    /// Furthest known stage by canonical order.
    pub furthest_stage: Option<StageName>,
    /// First Closed Won / Closed Lost stage in sequence order.
    pub first_closed_stage: Option<StageName>,
    pub first_closed_date: Option<NaiveDate>,
    pub total_quality_issues: u32,
}

impl FunnelSummary {
    pub fn from_sequence(sequence: &[SequencedStage]) -> Self {
        let first_closed = sequence.iter().find(|s| s.stage.stage_name.is_closed());

        Self {
            stage_count: sequence.len(),
            furthest_stage: sequence
                .iter()
                .map(|s| s.stage.stage_name)
                .filter(|name| *name != StageName::Unknown)
                .max_by_key(|name| name.canonical_order()),
            first_closed_stage: first_closed.map(|s| s.stage.stage_name),
            first_closed_date: first_closed.and_then(|s| s.stage.stage_date),
            total_quality_issues: sequence
                .iter()
                .map(|s| s.stage.flags.total_quality_issues())
                .sum(),
        }
    }

    /// The lead reached a terminal stage.
    pub fn completed(&self) -> bool {
        self.first_closed_stage.is_some()
    }
}
