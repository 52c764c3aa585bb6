//! Contact events (outreach touches on a lead)

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{QualityFlags, DATE_FORMAT};

/// Response text used when the CRM left the field empty.
pub const NO_RESPONSE: &str = "No Response";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawContactEvent {
    pub event_id: Option<String>,
    pub lead_id: Option<String>,
    pub event_date: Option<String>,
    pub contact_type: Option<String>,
    pub response_type: Option<String>,
}

/// Outreach channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContactType {
    Email,
    #[serde(rename = "Phone Call")]
    PhoneCall,
    #[serde(rename = "LinkedIn Message")]
    LinkedInMessage,
    #[serde(rename = "Demo Request")]
    DemoRequest,
    Other,
}

impl ContactType {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "email" | "e-mail" => ContactType::Email,
            "phone call" | "phone" | "call" => ContactType::PhoneCall,
            "linkedin message" | "linkedin" => ContactType::LinkedInMessage,
            "demo request" | "demo" => ContactType::DemoRequest,
            _ => ContactType::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContactType::Email => "Email",
            ContactType::PhoneCall => "Phone Call",
            ContactType::LinkedInMessage => "LinkedIn Message",
            ContactType::DemoRequest => "Demo Request",
            ContactType::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ContactEventFlags {
    pub had_nonstandard_contact_type: bool,
    pub had_missing_response: bool,
    pub had_future_date: bool,
}

impl QualityFlags for ContactEventFlags {
    fn flags(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("had_nonstandard_contact_type", self.had_nonstandard_contact_type),
            ("had_missing_response", self.had_missing_response),
            ("had_future_date", self.had_future_date),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContactEvent {
    pub event_id: Option<String>,
    pub lead_id: String,
    pub event_date: Option<NaiveDate>,
    pub contact_type: ContactType,
    pub response_type: String,
    pub flags: ContactEventFlags,
}

impl ContactEvent {
    /// The lead answered this touch in some way.
    pub fn is_response(&self) -> bool {
        self.response_type != NO_RESPONSE
    }
}

impl From<&ContactEvent> for RawContactEvent {
    fn from(event: &ContactEvent) -> Self {
        RawContactEvent {
            event_id: event.event_id.clone(),
            lead_id: Some(event.lead_id.clone()),
            event_date: event.event_date.map(|d| d.format(DATE_FORMAT).to_string()),
            contact_type: Some(event.contact_type.as_str().to_string()),
            response_type: Some(event.response_type.clone()),
        }
    }
}
