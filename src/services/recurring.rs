use chrono::{Duration, NaiveDateTime};
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, Slot, SlotStatus};
use crate::services::dates;

/// Every date in `[start, end]` falling on `start`'s weekday, in order.
pub fn occurrence_dates(start: NaiveDateTime, end: NaiveDateTime) -> Vec<NaiveDateTime> {
    let mut out = Vec::new();
    let mut day = start;
    while day <= end {
        out.push(day);
        day += Duration::days(7);
    }
    out
}

/// Request-time gate: every occurrence must have an available slot matching
/// the room, time span, and date. The first failing date rejects the whole
/// request, and nothing may be persisted on failure, so this runs before the
/// parent booking is written.
pub fn validate_occurrences(
    conn: &Connection,
    room_id: &str,
    start_time: &str,
    end_time: &str,
    start_date: NaiveDateTime,
    end_date: NaiveDateTime,
) -> Result<Vec<NaiveDateTime>, AppError> {
    if end_date < start_date {
        return Err(AppError::Validation(
            "endDate must not be before startDate".to_string(),
        ));
    }

    let occurrences = occurrence_dates(start_date, end_date);
    for day in &occurrences {
        let date = day.format("%Y-%m-%d");
        match queries::find_slot_for_occurrence(conn, room_id, start_time, end_time, day)? {
            None => {
                return Err(AppError::Conflict(format!(
                    "No matching slot exists on {date}"
                )))
            }
            Some(slot) if slot.status == SlotStatus::Booked => {
                return Err(AppError::Conflict(format!(
                    "The slot on {date} is already booked"
                )))
            }
            Some(_) => {}
        }
    }
    Ok(occurrences)
}

/// Result of materializing a recurring approval.
#[derive(Debug)]
pub struct ApprovedOccurrences {
    /// One concrete non-recurring booking per occurrence that went through.
    pub created: Vec<Booking>,
    /// Snapshots of the slots that were flipped, for the restore-undo.
    pub slots_before: Vec<Slot>,
    /// The same slots after the flip, for notification payloads.
    pub slots_after: Vec<Slot>,
    /// Occurrences whose slot was gone or booked out-of-band since request
    /// time. These are skipped, not errors.
    pub skipped: usize,
}

/// Approval-time materialization. Unlike request-time validation this
/// tolerates drift: an occurrence whose slot disappeared or got booked in
/// the meantime is skipped without blocking the rest. Only pre-existing
/// slots are mutated; no slot is ever created here.
pub fn approve_occurrences(
    conn: &Connection,
    parent: &Booking,
) -> Result<ApprovedOccurrences, AppError> {
    let (Some(start_date), Some(end_date)) = (parent.start_date, parent.end_date) else {
        return Err(AppError::Validation(
            "Recurring booking is missing its date range".to_string(),
        ));
    };

    let now = dates::now();
    let mut created = Vec::new();
    let mut slots_before = Vec::new();
    let mut slots_after = Vec::new();
    let mut skipped = 0usize;

    for day in occurrence_dates(start_date, end_date) {
        let found = queries::find_slot_for_occurrence(
            conn,
            &parent.room_id,
            &parent.start_time,
            &parent.end_time,
            &day,
        )?;
        let Some(mut slot) = found else {
            skipped += 1;
            continue;
        };
        if slot.status == SlotStatus::Booked {
            skipped += 1;
            continue;
        }

        slots_before.push(slot.clone());
        slot.service_name = parent.service_name.clone();
        slot.provider_name = parent.provider_name.clone();
        slot.rederive();
        queries::update_slot(conn, &slot)?;
        slots_after.push(slot.clone());

        let occurrence = Booking {
            id: uuid::Uuid::new_v4().to_string(),
            user_name: parent.user_name.clone(),
            phone_number: parent.phone_number.clone(),
            slot_id: Some(slot.id.clone()),
            room_id: parent.room_id.clone(),
            start_time: parent.start_time.clone(),
            end_time: parent.end_time.clone(),
            service_name: parent.service_name.clone(),
            provider_name: parent.provider_name.clone(),
            status: BookingStatus::Approved,
            date: Some(day),
            is_recurring: false,
            start_date: None,
            end_date: None,
            recurring_day_of_week: None,
            created_at: now,
            updated_at: now,
        };
        queries::insert_booking(conn, &occurrence)?;
        created.push(occurrence);
    }

    Ok(ApprovedOccurrences {
        created,
        slots_before,
        slots_after,
        skipped,
    })
}
