//! Lead deduplication by contact email
//!
//! Within each email group the lead with the latest `created_at` wins; ties go
//! to the highest `lead_id`. A missing `created_at` ranks below any timestamp.
//! Survivors keep their input order.

use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::debug;

use crate::model::Lead;

/// Canonical leads plus how many records were merged away.
#[derive(Debug, Clone, Default)]
pub struct Deduplicated {
    pub leads: Vec<Lead>,
    pub merged: usize,
    /// Email groups that had more than one member.
    pub duplicate_groups: usize,
}

/// Ranking key: greater is better.
fn rank(a: &Lead, b: &Lead) -> Ordering {
    a.created_at
        .cmp(&b.created_at)
        .then_with(|| a.lead_id.cmp(&b.lead_id))
}

/// Collapse leads sharing a contact email to one canonical record each.
pub fn deduplicate(leads: Vec<Lead>) -> Deduplicated {
    let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
    for (idx, lead) in leads.iter().enumerate() {
        groups
            .entry(lead.contact_email.clone())
            .or_default()
            .push(idx);
    }

    let mut winners: Vec<(usize, bool)> = groups
        .values()
        .filter_map(|members| {
            members
                .iter()
                .copied()
                .max_by(|&a, &b| rank(&leads[a], &leads[b]))
                .map(|winner| (winner, members.len() > 1))
        })
        .collect();
    winners.sort_unstable_by_key(|(idx, _)| *idx);

    let duplicate_groups = winners.iter().filter(|(_, dup)| *dup).count();
    let merged = leads.len() - winners.len();

    let mut slots: Vec<Option<Lead>> = leads.into_iter().map(Some).collect();
    let leads = winners
        .into_iter()
        .filter_map(|(idx, dup)| {
            slots[idx].take().map(|mut lead| {
                lead.flags.was_duplicate_email = dup;
                lead
            })
        })
        .collect();

    debug!(merged, duplicate_groups, "Deduplicated leads by email");

    Deduplicated {
        leads,
        merged,
        duplicate_groups,
    }
}
