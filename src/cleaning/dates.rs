//! Date parsing and capping shared by the cleaners

use chrono::{NaiveDate, NaiveDateTime};

use crate::model::{non_blank, ProcessingContext};

const DATETIME_LAYOUTS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

const DATE_LAYOUTS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];

/// Parse a timestamp; a bare date becomes midnight.
pub fn parse_datetime(value: Option<&str>) -> Option<NaiveDateTime> {
    let value = non_blank(value)?;
    DATETIME_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(value, layout).ok())
        .or_else(|| parse_date(Some(value)).and_then(|d| d.and_hms_opt(0, 0, 0)))
}

/// Parse a date; timestamps are truncated to their date.
pub fn parse_date(value: Option<&str>) -> Option<NaiveDate> {
    let value = non_blank(value)?;
    DATE_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDate::parse_from_str(value, layout).ok())
        .or_else(|| {
            DATETIME_LAYOUTS
                .iter()
                .find_map(|layout| NaiveDateTime::parse_from_str(value, layout).ok())
                .map(|ts| ts.date())
        })
}

/// Cap a date at the processing date. Returns the date and whether it was capped.
pub fn cap_date(date: Option<NaiveDate>, ctx: &ProcessingContext) -> (Option<NaiveDate>, bool) {
    match date {
        Some(d) if ctx.is_future(d) => (Some(ctx.processing_date), true),
        other => (other, false),
    }
}

/// Cap a timestamp whose date lies after the processing date.
pub fn cap_datetime(
    ts: Option<NaiveDateTime>,
    ctx: &ProcessingContext,
) -> (Option<NaiveDateTime>, bool) {
    match ts {
        Some(t) if ctx.is_future(t.date()) => (Some(ctx.processing_datetime()), true),
        other => (other, false),
    }
}
