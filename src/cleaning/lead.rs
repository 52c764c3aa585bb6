//! Lead cleaning

use once_cell::sync::Lazy;
use regex::Regex;

use super::dates::{cap_date, cap_datetime, parse_date, parse_datetime};
use crate::model::{
    non_blank, round_cents, Arm, Cleaned, CompanySize, DropReason, Lead, LeadFlags,
    ProcessingContext, RawLead, UNKNOWN,
};

/// Ceiling for a lead's stated annual revenue.
pub const LEAD_REVENUE_CAP: f64 = 500_000_000.0;

/// Shortest phone number (after formatting is removed) worth keeping.
pub const MIN_PHONE_LEN: usize = 10;

static TEST_COMPANY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)test|delete|sample").expect("Invalid test company regex"));

static PHONE_EXTENSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)ext|x").expect("Invalid phone extension regex"));

const PHONE_FORMATTING: [char; 6] = ['(', ')', '-', '.', ' ', '+'];

/// Clean one lead. Rows without an id or email, and placeholder companies,
/// are dropped.
pub fn clean_lead(raw: &RawLead, ctx: &ProcessingContext) -> Cleaned<Lead> {
    let Some(lead_id) = non_blank(raw.lead_id.as_deref()) else {
        return Cleaned::Dropped(DropReason::MissingLeadId);
    };
    let Some(email) = non_blank(raw.contact_email.as_deref()) else {
        return Cleaned::Dropped(DropReason::MissingEmail);
    };
    if is_test_company(raw.company_name.as_deref()) {
        return Cleaned::Dropped(DropReason::TestData);
    }

    let (created_at, created_capped) = cap_datetime(parse_datetime(raw.created_at.as_deref()), ctx);
    let (assigned_at, _) = cap_date(
        parse_date(raw.assigned_at.as_deref()).or(created_at.map(|ts| ts.date())),
        ctx,
    );
    let lead_group = non_blank(raw.lead_group.as_deref()).and_then(Arm::parse);

    let flags = LeadFlags {
        was_test_data: false,
        had_revenue_outlier: is_revenue_outlier(raw.annual_revenue),
        had_phone_extension: raw
            .contact_phone
            .as_deref()
            .is_some_and(|p| PHONE_EXTENSION.is_match(p)),
        was_duplicate_email: false,
        had_future_created_at: created_capped,
        had_unknown_group: lead_group.is_none(),
    };

    Cleaned::Kept(Lead {
        lead_id: lead_id.to_string(),
        company_name: non_blank(raw.company_name.as_deref()).map(str::to_string),
        contact_email: email.to_lowercase(),
        contact_phone: clean_phone(raw.contact_phone.as_deref()),
        industry: or_unknown(raw.industry.as_deref()),
        region: or_unknown(raw.region.as_deref()),
        source_channel: or_unknown(raw.source_channel.as_deref()),
        company_size: raw
            .company_size
            .as_deref()
            .map(CompanySize::parse)
            .unwrap_or(CompanySize::Unknown),
        annual_revenue: clean_annual_revenue(raw.annual_revenue),
        lead_group,
        created_at,
        assigned_at,
        flags,
    })
}

/// Company names used for test or placeholder records.
pub fn is_test_company(name: Option<&str>) -> bool {
    name.is_some_and(|n| TEST_COMPANY.is_match(n))
}

/// Drop any extension, strip formatting, and reject numbers that are too short.
pub fn clean_phone(phone: Option<&str>) -> Option<String> {
    let phone = phone?;
    let without_ext = match PHONE_EXTENSION.find(phone) {
        Some(marker) => &phone[..marker.start()],
        None => phone,
    };
    let digits: String = without_ext
        .chars()
        .filter(|c| !PHONE_FORMATTING.contains(c))
        .collect();
    let digits = digits.trim();

    (digits.chars().count() >= MIN_PHONE_LEN).then(|| digits.to_string())
}

pub fn clean_annual_revenue(revenue: Option<f64>) -> f64 {
    match revenue {
        None => 0.0,
        Some(r) if r < 0.0 => 0.0,
        Some(r) if r > LEAD_REVENUE_CAP => LEAD_REVENUE_CAP,
        Some(r) => round_cents(r),
    }
}

fn is_revenue_outlier(revenue: Option<f64>) -> bool {
    revenue.is_some_and(|r| !(0.0..=LEAD_REVENUE_CAP).contains(&r))
}

fn or_unknown(value: Option<&str>) -> String {
    non_blank(value).unwrap_or(UNKNOWN).to_string()
}
