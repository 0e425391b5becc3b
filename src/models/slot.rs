use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One concrete bookable window: one room, one date, one time span.
///
/// A `weekly` slot is not a live recurrence: it is an independent record
/// labelled weekly, one per occurrence, produced by bulk expansion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub id: String,
    pub room_id: String,
    pub start_time: String,
    pub end_time: String,
    pub service_name: String,
    pub provider_name: String,
    /// Calendar day, stored at UTC midnight.
    pub date: NaiveDateTime,
    #[serde(rename = "type")]
    pub kind: SlotType,
    pub status: SlotStatus,
    pub booked_by: Option<String>,
    pub created_at: NaiveDateTime,
}

impl Slot {
    /// Booking state follows from service/provider assignment: a slot is
    /// booked iff both are non-empty, and `bookedBy` mirrors the provider
    /// only while booked. Client-supplied status is never trusted on the
    /// derived paths.
    pub fn derive_state(service_name: &str, provider_name: &str) -> (SlotStatus, Option<String>) {
        if !service_name.is_empty() && !provider_name.is_empty() {
            (SlotStatus::Booked, Some(provider_name.to_string()))
        } else {
            (SlotStatus::Available, None)
        }
    }

    /// Re-derives `status` and `bookedBy` from the current service/provider.
    pub fn rederive(&mut self) {
        let (status, booked_by) = Self::derive_state(&self.service_name, &self.provider_name);
        self.status = status;
        self.booked_by = booked_by;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotType {
    Single,
    Weekly,
}

impl SlotType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotType::Single => "single",
            SlotType::Weekly => "weekly",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "weekly" => SlotType::Weekly,
            _ => SlotType::Single,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Available,
    Booked,
}

impl SlotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Available => "available",
            SlotStatus::Booked => "booked",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "booked" => SlotStatus::Booked,
            _ => SlotStatus::Available,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_assigned_is_booked() {
        let (status, booked_by) = Slot::derive_state("Choir", "Ms. Salma");
        assert_eq!(status, SlotStatus::Booked);
        assert_eq!(booked_by.as_deref(), Some("Ms. Salma"));
    }

    #[test]
    fn test_partial_assignment_stays_available() {
        let (status, booked_by) = Slot::derive_state("Choir", "");
        assert_eq!(status, SlotStatus::Available);
        assert_eq!(booked_by, None);

        let (status, booked_by) = Slot::derive_state("", "Ms. Salma");
        assert_eq!(status, SlotStatus::Available);
        assert_eq!(booked_by, None);
    }

    #[test]
    fn test_unassigned_is_available() {
        let (status, booked_by) = Slot::derive_state("", "");
        assert_eq!(status, SlotStatus::Available);
        assert_eq!(booked_by, None);
    }

    #[test]
    fn test_type_round_trip() {
        assert_eq!(SlotType::parse("weekly").as_str(), "weekly");
        assert_eq!(SlotType::parse("single").as_str(), "single");
        assert_eq!(SlotStatus::parse("booked").as_str(), "booked");
        assert_eq!(SlotStatus::parse("available").as_str(), "available");
    }
}
