//! End-to-end run: clean → deduplicate → sequence → aggregate → test
//!
//! [`run`] is synchronous and pure apart from logging and metric counters.
//! The CLI calls it from a blocking task.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::aggregate::{aggregate, group_by_arm, LeadMetrics, OrphanCounts, Segment};
use crate::cleaning::{
    clean_batch, clean_contact_event, clean_funnel_stage, clean_lead, clean_outcome,
};
use crate::dedup::deduplicate;
use crate::funnel::sequence_all;
use crate::metrics;
use crate::model::{
    Cleaned, ContactEvent, DropReason, Lead, Outcome, ProcessingContext, QualityFlags,
    RawContactEvent, RawFunnelStage, RawLead, RawOutcome, SequencedStage,
};
use crate::stats::{compare_all, MetricComparison};

/// The four raw tables as loaded.
#[derive(Debug, Clone, Default)]
pub struct RawTables {
    pub leads: Vec<RawLead>,
    pub contact_events: Vec<RawContactEvent>,
    pub funnel_stages: Vec<RawFunnelStage>,
    pub outcomes: Vec<RawOutcome>,
}

/// Cleaning tallies for one entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityQuality {
    pub entity: String,
    pub records_in: usize,
    pub kept: usize,
    pub dropped: BTreeMap<DropReason, usize>,
    /// Raised count per flag name, over kept records.
    pub flag_counts: BTreeMap<String, usize>,
    /// Kept records with at least one raised flag.
    pub records_with_issues: usize,
    pub total_quality_issues: u64,
}

impl EntityQuality {
    pub fn new(entity: &str) -> Self {
        Self {
            entity: entity.to_string(),
            ..Default::default()
        }
    }

    pub fn dropped_total(&self) -> usize {
        self.dropped.values().sum()
    }

    fn count_drops<T>(&mut self, results: &[Cleaned<T>]) {
        self.records_in += results.len();
        for result in results {
            if let Some(reason) = result.drop_reason() {
                *self.dropped.entry(reason).or_default() += 1;
            }
        }
    }

    fn count_flags<'a, F, I>(&mut self, flags: I)
    where
        F: QualityFlags + 'a,
        I: IntoIterator<Item = &'a F>,
    {
        for record in flags {
            self.kept += 1;
            let issues = record.total_quality_issues();
            if issues > 0 {
                self.records_with_issues += 1;
                self.total_quality_issues += u64::from(issues);
            }
            for (name, raised) in record.flags() {
                let slot = self.flag_counts.entry(name.to_string()).or_default();
                if raised {
                    *slot += 1;
                }
            }
        }
    }
}

/// Data quality across the whole run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualitySummary {
    pub leads: EntityQuality,
    pub contact_events: EntityQuality,
    pub funnel_stages: EntityQuality,
    pub outcomes: EntityQuality,
    /// Lead records merged away by email deduplication.
    pub merged_duplicates: usize,
    pub duplicate_groups: usize,
    pub orphans: OrphanCounts,
    /// Canonical leads without a recognised arm.
    pub unassigned_leads: usize,
}

impl QualitySummary {
    pub fn entities(&self) -> [&EntityQuality; 4] {
        [
            &self.leads,
            &self.contact_events,
            &self.funnel_stages,
            &self.outcomes,
        ]
    }
}

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub processing_date: NaiveDate,
    pub segment: Option<Segment>,
    pub leads: Vec<Lead>,
    pub contact_events: Vec<ContactEvent>,
    pub funnel_stages: Vec<SequencedStage>,
    pub outcomes: Vec<Outcome>,
    pub lead_metrics: Vec<LeadMetrics>,
    pub comparisons: Vec<MetricComparison>,
    pub quality: QualitySummary,
}

impl PipelineOutput {
    pub fn results(&self) -> ResultsDocument {
        ResultsDocument {
            processing_date: self.processing_date,
            segment: self.segment,
            lead_count: self.lead_metrics.len(),
            quality: self.quality.clone(),
            comparisons: self.comparisons.clone(),
        }
    }
}

/// The `results.json` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsDocument {
    pub processing_date: NaiveDate,
    pub segment: Option<Segment>,
    pub lead_count: usize,
    pub quality: QualitySummary,
    pub comparisons: Vec<MetricComparison>,
}

fn split_kept<T>(results: Vec<Cleaned<T>>) -> Vec<T> {
    results.into_iter().filter_map(Cleaned::kept).collect()
}

/// Run every stage for one processing date.
pub fn run(raw: &RawTables, ctx: &ProcessingContext, segment: Option<Segment>) -> PipelineOutput {
    let started = Instant::now();
    info!(
        processing_date = %ctx.processing_date,
        leads = raw.leads.len(),
        contact_events = raw.contact_events.len(),
        funnel_stages = raw.funnel_stages.len(),
        outcomes = raw.outcomes.len(),
        "Starting pipeline run"
    );

    let mut quality = QualitySummary {
        leads: EntityQuality::new("leads"),
        contact_events: EntityQuality::new("contact_events"),
        funnel_stages: EntityQuality::new("funnel_stages"),
        outcomes: EntityQuality::new("outcomes"),
        ..Default::default()
    };

    // Cleaning
    let stage_started = Instant::now();
    let cleaned_leads = clean_batch(&raw.leads, ctx, clean_lead);
    let cleaned_events = clean_batch(&raw.contact_events, ctx, clean_contact_event);
    let cleaned_stages = clean_batch(&raw.funnel_stages, ctx, clean_funnel_stage);
    let cleaned_outcomes = clean_batch(&raw.outcomes, ctx, clean_outcome);

    quality.leads.count_drops(&cleaned_leads);
    quality.contact_events.count_drops(&cleaned_events);
    quality.funnel_stages.count_drops(&cleaned_stages);
    quality.outcomes.count_drops(&cleaned_outcomes);

    let leads = split_kept(cleaned_leads);
    let contact_events = split_kept(cleaned_events);
    let stages = split_kept(cleaned_stages);
    let outcomes = split_kept(cleaned_outcomes);
    debug!(
        leads = leads.len(),
        contact_events = contact_events.len(),
        funnel_stages = stages.len(),
        outcomes = outcomes.len(),
        "Cleaning complete"
    );
    metrics::observe_stage("cleaning", stage_started.elapsed());

    // Deduplication
    let stage_started = Instant::now();
    let deduplicated = deduplicate(leads);
    quality.merged_duplicates = deduplicated.merged;
    quality.duplicate_groups = deduplicated.duplicate_groups;
    let leads = deduplicated.leads;
    quality.unassigned_leads = leads.iter().filter(|l| l.lead_group.is_none()).count();
    if quality.unassigned_leads > 0 {
        warn!(
            count = quality.unassigned_leads,
            "Leads without a recognised arm are excluded from comparisons"
        );
    }

    quality.leads.count_flags(leads.iter().map(|l| &l.flags));
    quality
        .contact_events
        .count_flags(contact_events.iter().map(|e| &e.flags));
    quality
        .funnel_stages
        .count_flags(stages.iter().map(|s| &s.flags));
    quality.outcomes.count_flags(outcomes.iter().map(|o| &o.flags));
    metrics::observe_stage("dedup", stage_started.elapsed());

    // Sequencing
    let stage_started = Instant::now();
    let funnels = sequence_all(stages);
    metrics::observe_stage("sequencing", stage_started.elapsed());

    // Aggregation
    let stage_started = Instant::now();
    let aggregation = aggregate(&leads, &outcomes, &contact_events, &funnels);
    quality.orphans = aggregation.orphans;
    metrics::observe_stage("aggregation", stage_started.elapsed());

    // Testing
    let stage_started = Instant::now();
    let groups = group_by_arm(&aggregation.rows, segment);
    let comparisons = compare_all(&groups);
    metrics::observe_stage("testing", stage_started.elapsed());
    let significant = comparisons
        .iter()
        .filter(|c| c.verdict.is_significant())
        .count();

    for entity in quality.entities() {
        metrics::record_entity_quality(entity);
        info!(
            entity = %entity.entity,
            records_in = entity.records_in,
            kept = entity.kept,
            dropped = entity.dropped_total(),
            with_issues = entity.records_with_issues,
            "Entity cleaned"
        );
    }

    info!(
        canonical_leads = leads.len(),
        merged_duplicates = quality.merged_duplicates,
        segments = groups.len(),
        comparisons = comparisons.len(),
        significant,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Pipeline run complete"
    );

    PipelineOutput {
        processing_date: ctx.processing_date,
        segment,
        leads,
        contact_events,
        funnel_stages: funnels.into_values().flatten().collect(),
        outcomes,
        lead_metrics: aggregation.rows,
        comparisons,
        quality,
    }
}
