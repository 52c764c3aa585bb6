//! Contact event cleaning

use super::dates::{cap_date, parse_date};
use crate::model::contact_event::NO_RESPONSE;
use crate::model::{
    non_blank, Cleaned, ContactEvent, ContactEventFlags, ContactType, DropReason,
    ProcessingContext, RawContactEvent,
};

pub fn clean_contact_event(raw: &RawContactEvent, ctx: &ProcessingContext) -> Cleaned<ContactEvent> {
    let Some(lead_id) = non_blank(raw.lead_id.as_deref()) else {
        return Cleaned::Dropped(DropReason::MissingLeadId);
    };

    let contact_type = raw
        .contact_type
        .as_deref()
        .map(ContactType::parse)
        .unwrap_or(ContactType::Other);
    let response_type = non_blank(raw.response_type.as_deref());
    let (event_date, date_capped) = cap_date(parse_date(raw.event_date.as_deref()), ctx);

    let flags = ContactEventFlags {
        had_nonstandard_contact_type: raw
            .contact_type
            .as_deref()
            .map_or(true, |t| t != contact_type.as_str()),
        had_missing_response: response_type.is_none(),
        had_future_date: date_capped,
    };

    Cleaned::Kept(ContactEvent {
        event_id: non_blank(raw.event_id.as_deref()).map(str::to_string),
        lead_id: lead_id.to_string(),
        event_date,
        contact_type,
        response_type: normalize_response(response_type),
        flags,
    })
}

/// Blank and any casing of "No Response" become [`NO_RESPONSE`].
fn normalize_response(response: Option<&str>) -> String {
    match response {
        Some(r) if !r.eq_ignore_ascii_case(NO_RESPONSE) => r.to_string(),
        _ => NO_RESPONSE.to_string(),
    }
}
