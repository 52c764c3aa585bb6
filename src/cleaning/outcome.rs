//! Outcome cleaning and conversion/revenue reconciliation

use super::dates::{cap_date, parse_date};
use crate::model::{
    non_blank, round_cents, Cleaned, DropReason, Outcome, OutcomeFlags, ProcessingContext,
    RawOutcome,
};

/// Known synthetic-data revenue values and the realistic amounts they stand for.
pub const REVENUE_ARTIFACTS: [(f64, f64); 3] = [
    (0.01, 0.00),
    (999_999_999.0, 150_000.00),
    (50_000_000.0, 250_000.00),
];

/// Revenue above this is an outlier and replaced by [`OUTCOME_REVENUE_CEILING`].
pub const OUTCOME_REVENUE_OUTLIER: f64 = 2_000_000.0;

/// Largest revenue a cleaned outcome may carry.
pub const OUTCOME_REVENUE_CEILING: f64 = 500_000.0;

/// Longest plausible sales cycle, in days.
pub const MAX_DAYS_TO_CLOSE: i64 = 730;

pub fn clean_outcome(raw: &RawOutcome, ctx: &ProcessingContext) -> Cleaned<Outcome> {
    let Some(lead_id) = non_blank(raw.lead_id.as_deref()) else {
        return Cleaned::Dropped(DropReason::MissingLeadId);
    };

    let revenue = clean_outcome_revenue(raw.revenue);
    let stated = raw.converted.unwrap_or(false);
    let converted = revenue > 0.0;

    let (parsed_date, date_capped) = cap_date(parse_date(raw.outcome_date.as_deref()), ctx);
    let outcome_date = match parsed_date {
        None if converted => Some(ctx.processing_date),
        other => other,
    };

    let flags = OutcomeFlags {
        had_negative_revenue: raw.revenue.is_some_and(|r| r < 0.0),
        had_revenue_artifact: raw.revenue.and_then(revenue_artifact).is_some(),
        had_revenue_outlier: raw.revenue.is_some_and(|r| {
            revenue_artifact(r).is_none() && r > OUTCOME_REVENUE_CEILING
        }),
        had_conversion_mismatch: stated != converted,
        had_invalid_days_to_close: raw
            .days_to_close
            .is_some_and(|d| !(1..=MAX_DAYS_TO_CLOSE).contains(&d)),
        had_missing_outcome_date: parsed_date.is_none() && converted,
        had_future_date: date_capped,
    };

    Cleaned::Kept(Outcome {
        outcome_id: non_blank(raw.outcome_id.as_deref()).map(str::to_string),
        lead_id: lead_id.to_string(),
        converted,
        revenue,
        outcome_date,
        days_to_close: raw.days_to_close.map(clean_days_to_close),
        flags,
    })
}

/// Substitute for a known synthetic revenue value, if `revenue` is one.
pub fn revenue_artifact(revenue: f64) -> Option<f64> {
    REVENUE_ARTIFACTS
        .iter()
        .find(|(artifact, _)| *artifact == revenue)
        .map(|(_, substitute)| *substitute)
}

/// Clean outcome revenue into `[0, OUTCOME_REVENUE_CEILING]`.
pub fn clean_outcome_revenue(revenue: Option<f64>) -> f64 {
    let Some(revenue) = revenue else {
        return 0.0;
    };
    if revenue < 0.0 {
        return 0.0;
    }
    if let Some(substitute) = revenue_artifact(revenue) {
        return substitute;
    }
    if revenue > OUTCOME_REVENUE_OUTLIER {
        return OUTCOME_REVENUE_CEILING;
    }
    round_cents(revenue).min(OUTCOME_REVENUE_CEILING)
}

/// Absolute value, at least one day, at most [`MAX_DAYS_TO_CLOSE`].
pub fn clean_days_to_close(days: i64) -> i64 {
    days.saturating_abs().clamp(1, MAX_DAYS_TO_CLOSE)
}
