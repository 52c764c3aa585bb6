//! Data quality summary
//!
//! Runs cleaning through aggregation without writing files and prints what
//! was dropped, merged and flagged per table.

use std::fmt::Write;

use crate::error::{Error, Result};
use crate::pipeline::QualitySummary;

use super::run::{execute, RunConfig};

/// Render the quality summary as a plain-text table.
pub fn render_quality(summary: &QualitySummary) -> String {
    let mut out = String::new();
    let header = "🧹 Data quality summary";
    let _ = writeln!(out, "{}", header);
    let _ = writeln!(out, "{}", "-".repeat(header.chars().count()));
    let _ = writeln!(
        out,
        "{:16} {:>8} {:>8} {:>8} {:>10} {:>8}",
        "Table", "In", "Kept", "Dropped", "w/ issues", "Issues"
    );

    for entity in summary.entities() {
        let _ = writeln!(
            out,
            "{:16} {:>8} {:>8} {:>8} {:>10} {:>8}",
            entity.entity,
            entity.records_in,
            entity.kept,
            entity.dropped_total(),
            entity.records_with_issues,
            entity.total_quality_issues
        );

        if !entity.dropped.is_empty() {
            let reasons: Vec<String> = entity
                .dropped
                .iter()
                .map(|(reason, count)| format!("{}:{}", reason.as_str(), count))
                .collect();
            let _ = writeln!(out, "  dropped: {}", reasons.join(", "));
        }

        let raised: Vec<String> = entity
            .flag_counts
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(flag, count)| format!("{}:{}", flag, count))
            .collect();
        if !raised.is_empty() {
            let _ = writeln!(out, "  flags: {}", raised.join(", "));
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Duplicates merged: {} (in {} email groups)",
        summary.merged_duplicates, summary.duplicate_groups
    );
    let _ = writeln!(
        out,
        "Orphans: {} outcomes, {} contact events, {} funnel stages; {} surplus outcomes",
        summary.orphans.outcomes,
        summary.orphans.contact_events,
        summary.orphans.funnel_stages,
        summary.orphans.surplus_outcomes
    );
    let _ = writeln!(out, "Leads without an arm: {}", summary.unassigned_leads);
    out
}

/// Print the quality summary for a dry run of the pipeline.
pub async fn run(mut config: RunConfig) -> Result<QualitySummary> {
    config.dry_run = true;
    let output = tokio::task::spawn_blocking(move || execute(&config))
        .await
        .map_err(|e| Error::Unknown(format!("Pipeline task failed: {}", e)))??;

    print!("{}", render_quality(&output.quality));
    Ok(output.quality)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DropReason;
    use crate::pipeline::EntityQuality;

    #[test]
    fn test_render_quality_lists_drops_and_flags() {
        let mut leads = EntityQuality::new("leads");
        leads.records_in = 10;
        leads.kept = 7;
        leads.dropped.insert(DropReason::TestData, 2);
        leads.dropped.insert(DropReason::MissingEmail, 1);
        leads.flag_counts.insert("had_phone_extension".to_string(), 3);
        leads.flag_counts.insert("was_test_data".to_string(), 0);

        let summary = QualitySummary {
            leads,
            contact_events: EntityQuality::new("contact_events"),
            funnel_stages: EntityQuality::new("funnel_stages"),
            outcomes: EntityQuality::new("outcomes"),
            merged_duplicates: 4,
            duplicate_groups: 2,
            ..Default::default()
        };

        let text = render_quality(&summary);

        assert!(text.contains("dropped: missing_email:1, test_data:2"));
        assert!(text.contains("flags: had_phone_extension:3"));
        assert!(!text.contains("was_test_data"));
        assert!(text.contains("Duplicates merged: 4 (in 2 email groups)"));
        assert!(text.contains("contact_events"));
    }
}
