use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A user's request for a slot. Recurring requests carry a date range and a
/// weekday instead of a single date; on approval they spawn one non-recurring
/// booking per occurrence and stay behind as the parent record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub user_name: String,
    pub phone_number: String,
    pub slot_id: Option<String>,
    pub room_id: String,
    pub start_time: String,
    pub end_time: String,
    pub service_name: String,
    pub provider_name: String,
    pub status: BookingStatus,
    pub date: Option<NaiveDateTime>,
    pub is_recurring: bool,
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
    /// 0 = Sunday .. 6 = Saturday, matching the weekday of `start_date`.
    pub recurring_day_of_week: Option<u8>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Approved,
    Rejected,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Approved => "approved",
            BookingStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "approved" => BookingStatus::Approved,
            "rejected" => BookingStatus::Rejected,
            _ => BookingStatus::Pending,
        }
    }
}

const PHONE_PREFIXES: [&str; 4] = ["010", "011", "012", "015"];

/// Eleven digits, starting with one of the carrier prefixes.
pub fn is_valid_phone_number(phone: &str) -> bool {
    phone.len() == 11
        && phone.chars().all(|c| c.is_ascii_digit())
        && PHONE_PREFIXES.iter().any(|p| phone.starts_with(p))
}
