use chrono::{Duration, NaiveDateTime};
use rusqlite::Connection;
use serde::Deserialize;

use crate::db::queries::{self, BookedBy, SlotFieldUpdate, SlotOrder};
use crate::errors::AppError;
use crate::models::{Slot, SlotStatus, SlotType};
use crate::services::dates;
use crate::services::filter::{is_valid_time, SlotFilter};

/// One admin-supplied slot shape: time span, date, optional assignment.
/// A weekly template with `repeatUntil` expands into one record per week.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct SlotTemplate {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub date: Option<String>,
    pub service_name: Option<String>,
    pub provider_name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<SlotType>,
    pub repeat_until: Option<String>,
}

/// The fields a bulk update may carry. `bookedBy` distinguishes "absent"
/// from an explicit null. On the filtered path `status`/`bookedBy` are
/// derived, not read from here; the id-list path trusts them as given.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct SlotUpdates {
    pub service_name: Option<String>,
    pub provider_name: Option<String>,
    pub status: Option<SlotStatus>,
    /// `Some(None)` is an explicit `bookedBy: null`; `None` leaves it alone.
    #[serde(default, deserialize_with = "double_option")]
    pub booked_by: Option<Option<String>>,
    #[serde(rename = "type")]
    pub kind: Option<SlotType>,
}

// Present-but-null must stay distinguishable from absent.
fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl SlotUpdates {
    pub fn is_empty(&self) -> bool {
        self.service_name.is_none()
            && self.provider_name.is_none()
            && self.status.is_none()
            && self.booked_by.is_none()
            && self.kind.is_none()
    }
}

#[derive(Debug)]
pub struct BulkUpdateOutcome {
    pub matched_count: usize,
    pub modified_ids: Vec<String>,
    /// Pre-mutation snapshots backing the restore-undo: every targeted
    /// record on the id-list path, the modified subset on the filtered path.
    pub before: Vec<Slot>,
}

impl BulkUpdateOutcome {
    pub fn modified_count(&self) -> usize {
        self.modified_ids.len()
    }

    fn empty() -> Self {
        Self {
            matched_count: 0,
            modified_ids: vec![],
            before: vec![],
        }
    }
}

/// Creates the cartesian product of rooms × templates, expanding weekly
/// templates into per-week records first. Everything is validated before the
/// first write; each slot derives its own status from its template.
pub fn bulk_create(
    conn: &Connection,
    room_ids: &[String],
    templates: &[SlotTemplate],
) -> Result<Vec<Slot>, AppError> {
    if room_ids.is_empty() {
        return Err(AppError::Validation(
            "At least one room must be selected".to_string(),
        ));
    }
    if templates.is_empty() {
        return Err(AppError::Validation(
            "At least one slot template must be provided".to_string(),
        ));
    }

    struct Expanded {
        start_time: String,
        end_time: String,
        service_name: String,
        provider_name: String,
        kind: SlotType,
        days: Vec<NaiveDateTime>,
    }

    let mut expanded = Vec::with_capacity(templates.len());
    for template in templates {
        let (Some(start_time), Some(end_time), Some(date)) =
            (&template.start_time, &template.end_time, &template.date)
        else {
            return Err(AppError::Validation(
                "Each slot template must have startTime, endTime, and date".to_string(),
            ));
        };
        if !is_valid_time(start_time) || !is_valid_time(end_time) {
            return Err(AppError::Validation(format!(
                "Slot times must be HH:MM, got '{start_time}'-'{end_time}'"
            )));
        }

        let first_day = dates::required_day(date, "date")?;
        let kind = template.kind.unwrap_or(SlotType::Single);

        let mut days = vec![first_day];
        if kind == SlotType::Weekly {
            if let Some(until_raw) = &template.repeat_until {
                let until = dates::required_day(until_raw, "repeatUntil")?;
                if until < first_day {
                    return Err(AppError::Validation(
                        "repeatUntil must not be before date".to_string(),
                    ));
                }
                let mut day = first_day + Duration::days(7);
                while day <= until {
                    days.push(day);
                    day += Duration::days(7);
                }
            }
        }

        expanded.push(Expanded {
            start_time: start_time.clone(),
            end_time: end_time.clone(),
            service_name: template.service_name.clone().unwrap_or_default(),
            provider_name: template.provider_name.clone().unwrap_or_default(),
            kind,
            days,
        });
    }

    let now = dates::now();
    let mut slots = Vec::new();
    for room_id in room_ids {
        for template in &expanded {
            for day in &template.days {
                let (status, booked_by) =
                    Slot::derive_state(&template.service_name, &template.provider_name);
                slots.push(Slot {
                    id: uuid::Uuid::new_v4().to_string(),
                    room_id: room_id.clone(),
                    start_time: template.start_time.clone(),
                    end_time: template.end_time.clone(),
                    service_name: template.service_name.clone(),
                    provider_name: template.provider_name.clone(),
                    date: *day,
                    kind: template.kind,
                    status,
                    booked_by,
                    created_at: now,
                });
            }
        }
    }

    queries::insert_slots(conn, &slots)?;
    Ok(slots)
}

/// Narrow trusted path: applies exactly the given fields to the named
/// records. No invariant re-derivation; the caller owns the consequences.
pub fn bulk_update_by_ids(
    conn: &Connection,
    ids: &[String],
    updates: &SlotUpdates,
) -> Result<BulkUpdateOutcome, AppError> {
    if ids.is_empty() {
        return Err(AppError::Validation("slotIds must not be empty".to_string()));
    }
    if updates.is_empty() {
        return Err(AppError::Validation(
            "updates must set at least one field".to_string(),
        ));
    }

    let matched = queries::get_slots_by_ids(conn, ids)?;
    if matched.is_empty() {
        return Ok(BulkUpdateOutcome::empty());
    }

    let field_update = SlotFieldUpdate {
        service_name: updates.service_name.as_deref(),
        provider_name: updates.provider_name.as_deref(),
        kind: updates.kind,
        status: updates.status,
        booked_by: updates.booked_by.as_ref().map(|b| match b {
            None => BookedBy::Clear,
            Some(name) => BookedBy::Name(name.as_str()),
        }),
    };

    let modified_ids: Vec<String> = matched
        .iter()
        .filter(|slot| would_change(slot, &field_update))
        .map(|slot| slot.id.clone())
        .collect();

    queries::update_slot_fields(conn, &modified_ids, &field_update)?;

    Ok(BulkUpdateOutcome {
        matched_count: matched.len(),
        modified_ids,
        before: matched,
    })
}

/// Filtered path: resolves targets through the filter compiler, then derives
/// the update so the slot invariant holds: an explicit status wins,
/// otherwise a full service+provider assignment books and anything less
/// frees, with `bookedBy` following the provider.
pub fn bulk_update_by_filter(
    conn: &Connection,
    filter: &SlotFilter,
    updates: &SlotUpdates,
) -> Result<BulkUpdateOutcome, AppError> {
    if filter.is_empty() && updates.is_empty() {
        return Err(AppError::Validation(
            "Filters or updates are required; refusing to blank-update every slot".to_string(),
        ));
    }

    let compiled = filter.compile()?;
    let matched = compiled
        .apply_post_filters(queries::find_slots(conn, &compiled, SlotOrder::DateDescStartAsc)?);
    if matched.is_empty() {
        return Ok(BulkUpdateOutcome::empty());
    }

    let status = updates.status.unwrap_or_else(|| {
        let service = updates.service_name.as_deref().unwrap_or("");
        let provider = updates.provider_name.as_deref().unwrap_or("");
        if !service.is_empty() && !provider.is_empty() {
            SlotStatus::Booked
        } else {
            SlotStatus::Available
        }
    });
    let booked_by = if status == SlotStatus::Booked {
        match updates.provider_name.as_deref() {
            Some(p) if !p.is_empty() => BookedBy::Name(p),
            Some(_) => BookedBy::Clear,
            None => BookedBy::CurrentProvider,
        }
    } else {
        BookedBy::Clear
    };

    let field_update = SlotFieldUpdate {
        service_name: updates.service_name.as_deref(),
        provider_name: updates.provider_name.as_deref(),
        kind: updates.kind,
        status: Some(status),
        booked_by: Some(booked_by),
    };

    let modified: Vec<Slot> = matched
        .iter()
        .filter(|slot| would_change(slot, &field_update))
        .cloned()
        .collect();
    let modified_ids: Vec<String> = modified.iter().map(|slot| slot.id.clone()).collect();

    queries::update_slot_fields(conn, &modified_ids, &field_update)?;

    Ok(BulkUpdateOutcome {
        matched_count: matched.len(),
        modified_ids,
        before: modified,
    })
}

/// Deletes the filtered set and returns the full pre-delete snapshots for
/// the restore-undo.
pub fn bulk_delete_by_filter(
    conn: &Connection,
    filter: &SlotFilter,
) -> Result<Vec<Slot>, AppError> {
    let compiled = filter.compile()?;
    let matched = compiled
        .apply_post_filters(queries::find_slots(conn, &compiled, SlotOrder::DateDescStartAsc)?);
    if matched.is_empty() {
        return Ok(vec![]);
    }

    let ids: Vec<String> = matched.iter().map(|slot| slot.id.clone()).collect();
    queries::delete_slots_by_ids(conn, &ids)?;
    Ok(matched)
}

fn would_change(slot: &Slot, update: &SlotFieldUpdate) -> bool {
    if let Some(v) = update.service_name {
        if slot.service_name != v {
            return true;
        }
    }
    if let Some(v) = update.provider_name {
        if slot.provider_name != v {
            return true;
        }
    }
    if let Some(kind) = update.kind {
        if slot.kind != kind {
            return true;
        }
    }
    if let Some(status) = update.status {
        if slot.status != status {
            return true;
        }
    }
    match &update.booked_by {
        Some(BookedBy::Clear) => {
            if slot.booked_by.is_some() {
                return true;
            }
        }
        Some(BookedBy::Name(name)) => {
            if slot.booked_by.as_deref() != Some(*name) {
                return true;
            }
        }
        // Only reachable when the provider column is untouched, so the
        // target is the row's current provider.
        Some(BookedBy::CurrentProvider) => {
            if slot.booked_by.as_deref() != Some(slot.provider_name.as_str()) {
                return true;
            }
        }
        None => {}
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn template(start: &str, end: &str, date: &str) -> SlotTemplate {
        SlotTemplate {
            start_time: Some(start.to_string()),
            end_time: Some(end.to_string()),
            date: Some(date.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_cartesian_expansion() {
        let conn = setup_db();
        let rooms = vec!["r1".to_string(), "r2".to_string(), "r3".to_string()];
        let templates = vec![
            template("08:00", "10:00", "2024-06-03"),
            template("10:00", "12:00", "2024-06-03"),
        ];

        let slots = bulk_create(&conn, &rooms, &templates).unwrap();
        assert_eq!(slots.len(), 6);
        assert_eq!(
            slots.iter().filter(|s| s.room_id == "r2").count(),
            2
        );
    }

    #[test]
    fn test_each_slot_derives_its_own_status() {
        let conn = setup_db();
        let mut booked = template("08:00", "10:00", "2024-06-03");
        booked.service_name = Some("Choir".to_string());
        booked.provider_name = Some("Salma".to_string());
        let mut partial = template("10:00", "12:00", "2024-06-03");
        partial.service_name = Some("Choir".to_string());

        let slots = bulk_create(
            &conn,
            &["r1".to_string()],
            &[booked, partial, template("12:00", "14:00", "2024-06-03")],
        )
        .unwrap();

        assert_eq!(slots[0].status, SlotStatus::Booked);
        assert_eq!(slots[0].booked_by.as_deref(), Some("Salma"));
        assert_eq!(slots[1].status, SlotStatus::Available);
        assert_eq!(slots[1].booked_by, None);
        assert_eq!(slots[2].status, SlotStatus::Available);
    }

    #[test]
    fn test_weekly_template_expands_per_week() {
        let conn = setup_db();
        let mut weekly = template("08:00", "10:00", "2024-06-03"); // a Monday
        weekly.kind = Some(SlotType::Weekly);
        weekly.repeat_until = Some("2024-06-24".to_string());

        let slots = bulk_create(&conn, &["r1".to_string()], &[weekly]).unwrap();
        assert_eq!(slots.len(), 4);
        let days: Vec<String> = slots.iter().map(|s| s.date.to_string()).collect();
        assert_eq!(
            days,
            vec![
                "2024-06-03 00:00:00",
                "2024-06-10 00:00:00",
                "2024-06-17 00:00:00",
                "2024-06-24 00:00:00",
            ]
        );
        assert!(slots.iter().all(|s| s.kind == SlotType::Weekly));
    }

    #[test]
    fn test_empty_inputs_rejected_before_writing() {
        let conn = setup_db();
        assert!(matches!(
            bulk_create(&conn, &[], &[template("08:00", "10:00", "2024-06-03")]),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            bulk_create(&conn, &["r1".to_string()], &[]),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_incomplete_template_rejects_whole_batch() {
        let conn = setup_db();
        let mut incomplete = template("08:00", "10:00", "2024-06-03");
        incomplete.date = None;

        let result = bulk_create(
            &conn,
            &["r1".to_string()],
            &[template("06:00", "08:00", "2024-06-03"), incomplete],
        );
        assert!(matches!(result, Err(AppError::Validation(_))));

        // Nothing from the valid template may have been written.
        let compiled = SlotFilter::default().compile().unwrap();
        assert!(queries::find_slots(&conn, &compiled, SlotOrder::DateDescStartAsc)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_filtered_update_derives_booked() {
        let conn = setup_db();
        bulk_create(
            &conn,
            &["r1".to_string()],
            &[template("08:00", "10:00", "2024-06-03")],
        )
        .unwrap();

        let updates = SlotUpdates {
            service_name: Some("Piano".to_string()),
            provider_name: Some("Omar".to_string()),
            ..Default::default()
        };
        let outcome = bulk_update_by_filter(&conn, &SlotFilter::default(), &updates).unwrap();
        assert_eq!(outcome.matched_count, 1);
        assert_eq!(outcome.modified_count(), 1);

        let slot = &queries::get_slots_by_ids(&conn, &outcome.modified_ids).unwrap()[0];
        assert_eq!(slot.status, SlotStatus::Booked);
        assert_eq!(slot.booked_by.as_deref(), Some("Omar"));
    }

    #[test]
    fn test_filtered_update_partial_assignment_frees() {
        let conn = setup_db();
        let mut booked = template("08:00", "10:00", "2024-06-03");
        booked.service_name = Some("Choir".to_string());
        booked.provider_name = Some("Salma".to_string());
        bulk_create(&conn, &["r1".to_string()], &[booked]).unwrap();

        let updates = SlotUpdates {
            service_name: Some("Choir".to_string()),
            provider_name: Some(String::new()),
            ..Default::default()
        };
        let outcome = bulk_update_by_filter(&conn, &SlotFilter::default(), &updates).unwrap();
        assert_eq!(outcome.modified_count(), 1);

        let slot = &queries::get_slots_by_ids(&conn, &outcome.modified_ids).unwrap()[0];
        assert_eq!(slot.status, SlotStatus::Available);
        assert_eq!(slot.booked_by, None);
    }

    #[test]
    fn test_modified_strictly_less_than_matched_when_noop() {
        let conn = setup_db();
        let mut booked = template("08:00", "10:00", "2024-06-03");
        booked.service_name = Some("Choir".to_string());
        booked.provider_name = Some("Salma".to_string());
        bulk_create(
            &conn,
            &["r1".to_string()],
            &[booked, template("10:00", "12:00", "2024-06-03")],
        )
        .unwrap();

        // Clearing everything: the already-available slot is matched but
        // untouched.
        let updates = SlotUpdates {
            status: Some(SlotStatus::Available),
            service_name: Some(String::new()),
            provider_name: Some(String::new()),
            ..Default::default()
        };
        let outcome = bulk_update_by_filter(&conn, &SlotFilter::default(), &updates).unwrap();
        assert_eq!(outcome.matched_count, 2);
        assert_eq!(outcome.modified_count(), 1);
    }

    #[test]
    fn test_empty_filter_and_empty_updates_rejected() {
        let conn = setup_db();
        let result =
            bulk_update_by_filter(&conn, &SlotFilter::default(), &SlotUpdates::default());
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_id_path_trusts_caller_fields() {
        let conn = setup_db();
        let slots = bulk_create(
            &conn,
            &["r1".to_string()],
            &[template("08:00", "10:00", "2024-06-03")],
        )
        .unwrap();
        let ids = vec![slots[0].id.clone()];

        // Booked with no provider would never survive the derived path.
        let updates = SlotUpdates {
            status: Some(SlotStatus::Booked),
            kind: Some(SlotType::Weekly),
            ..Default::default()
        };
        let outcome = bulk_update_by_ids(&conn, &ids, &updates).unwrap();
        assert_eq!(outcome.matched_count, 1);
        assert_eq!(outcome.modified_count(), 1);
        assert_eq!(outcome.before.len(), 1);

        let slot = &queries::get_slots_by_ids(&conn, &ids).unwrap()[0];
        assert_eq!(slot.status, SlotStatus::Booked);
        assert_eq!(slot.kind, SlotType::Weekly);
        assert_eq!(slot.provider_name, "");
    }

    #[test]
    fn test_delete_by_filter_with_post_filters() {
        let conn = setup_db();
        // 2024-06-01 Saturday, 2024-06-02 Sunday, 2024-06-03 Monday.
        bulk_create(
            &conn,
            &["r1".to_string()],
            &[
                template("08:00", "10:00", "2024-06-01"),
                template("08:00", "10:00", "2024-06-02"),
                template("08:00", "10:00", "2024-06-03"),
            ],
        )
        .unwrap();

        let filter = SlotFilter {
            date_range_start: Some("2024-06-01".to_string()),
            date_range_end: Some("2024-06-07".to_string()),
            days_of_week: Some(vec![0, 6]),
            ..Default::default()
        };
        let deleted = bulk_delete_by_filter(&conn, &filter).unwrap();
        assert_eq!(deleted.len(), 2);

        let compiled = SlotFilter::default().compile().unwrap();
        let remaining = queries::find_slots(&conn, &compiled, SlotOrder::DateDescStartAsc).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].date.to_string(), "2024-06-03 00:00:00");
    }
}
