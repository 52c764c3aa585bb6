//! Funnel stage cleaning

use super::dates::{cap_date, parse_date};
use crate::model::funnel_stage::{MAX_STAGE_ORDER, MIN_STAGE_ORDER};
use crate::model::{
    non_blank, Cleaned, DropReason, FunnelStage, FunnelStageFlags, ProcessingContext,
    RawFunnelStage, StageName,
};

pub fn clean_funnel_stage(raw: &RawFunnelStage, ctx: &ProcessingContext) -> Cleaned<FunnelStage> {
    let Some(lead_id) = non_blank(raw.lead_id.as_deref()) else {
        return Cleaned::Dropped(DropReason::MissingLeadId);
    };

    let stage_name = raw
        .stage_name
        .as_deref()
        .map(StageName::parse)
        .unwrap_or(StageName::Unknown);
    let (stage_date, date_capped) = cap_date(parse_date(raw.stage_date.as_deref()), ctx);

    let flags = FunnelStageFlags {
        had_invalid_stage_order: raw.stage_order.map_or(true, |o| {
            !(i64::from(MIN_STAGE_ORDER)..=i64::from(MAX_STAGE_ORDER)).contains(&o)
        }),
        had_nonstandard_stage_name: raw
            .stage_name
            .as_deref()
            .map_or(true, |n| n != stage_name.as_str() || stage_name == StageName::Unknown),
        had_future_date: date_capped,
    };

    Cleaned::Kept(FunnelStage {
        stage_id: non_blank(raw.stage_id.as_deref()).map(str::to_string),
        lead_id: lead_id.to_string(),
        stage_name,
        stage_order: clamp_stage_order(raw.stage_order, stage_name),
        stage_date,
        flags,
    })
}

/// Clamp into `[1, 7]`; a missing order falls back to the stage's canonical position.
pub fn clamp_stage_order(order: Option<i64>, stage_name: StageName) -> u8 {
    match order {
        Some(o) => o.clamp(i64::from(MIN_STAGE_ORDER), i64::from(MAX_STAGE_ORDER)) as u8,
        None => stage_name.canonical_order(),
    }
}
