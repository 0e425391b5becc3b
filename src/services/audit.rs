use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{
    ActionStatus, ActionType, AdminAction, Booking, Collection, Room, Slot, UndoPayload, UndoStep,
};
use crate::services::dates;

/// Everything needed to record one mutating admin operation.
#[derive(Debug)]
pub struct ActionLog {
    pub admin_id: String,
    pub action_name: String,
    pub action_type: ActionType,
    pub target_collection: Collection,
    pub target_ids: Vec<String>,
    pub details: String,
    pub metadata: serde_json::Value,
    pub undo_payload: UndoPayload,
}

/// Persists the audit record for an already-applied mutation. Refuses to log
/// anything without an undo payload: an action that cannot be reversed must
/// not enter the history.
pub fn log_action(conn: &Connection, entry: ActionLog) -> Result<AdminAction, AppError> {
    if entry.undo_payload.steps.is_empty() {
        return Err(AppError::Validation(
            "An undo payload is required to log an admin action".to_string(),
        ));
    }

    let action = AdminAction {
        id: uuid::Uuid::new_v4().to_string(),
        admin_id: entry.admin_id,
        action_name: entry.action_name,
        action_type: entry.action_type,
        target_collection: entry.target_collection,
        target_ids: entry.target_ids,
        details: entry.details,
        metadata: entry.metadata,
        undo_payload: entry.undo_payload,
        status: ActionStatus::Completed,
        created_at: dates::now(),
        undone_at: None,
    };

    queries::insert_action(conn, &action)?;
    Ok(action)
}

/// The audit write runs after the primary mutation has already succeeded, so
/// a failure here must not unwind it: the mutation stands, the gap in the
/// history is reported through the log.
pub fn log_action_or_warn(conn: &Connection, entry: ActionLog) {
    let name = entry.action_name.clone();
    if let Err(e) = log_action(conn, entry) {
        tracing::error!(error = %e, action = %name, "failed to record admin action");
    }
}

/// Replays an action's undo steps in stored order and flips it to undone.
/// At most once per action. A failing step aborts the remaining ones and
/// surfaces the error; steps already applied stay applied, but the action is
/// only marked undone after a full replay, so a fixed-up store can be
/// re-run (restore and delete steps are idempotent).
pub fn undo_action(conn: &Connection, action_id: &str) -> Result<AdminAction, AppError> {
    let mut action = queries::get_action(conn, action_id)?
        .ok_or_else(|| AppError::NotFound("Action not found".to_string()))?;

    if action.status == ActionStatus::Undone {
        return Err(AppError::Undo("Action already undone".to_string()));
    }

    for step in &action.undo_payload.steps {
        run_step(conn, step)?;
    }

    let now = dates::now();
    queries::mark_action_undone(conn, &action.id, &now)?;
    action.status = ActionStatus::Undone;
    action.undone_at = Some(now);
    Ok(action)
}

fn run_step(conn: &Connection, step: &UndoStep) -> Result<(), AppError> {
    match step {
        UndoStep::Delete { collection, ids } => {
            if ids.is_empty() {
                return Err(AppError::Undo(
                    "Delete step requires a non-empty id list".to_string(),
                ));
            }
            match collection {
                Collection::Rooms => queries::delete_rooms_by_ids(conn, ids)?,
                Collection::Slots => queries::delete_slots_by_ids(conn, ids)?,
                Collection::Bookings => queries::delete_bookings_by_ids(conn, ids)?,
            };
            Ok(())
        }
        UndoStep::Restore {
            collection,
            documents,
        } => {
            if documents.is_empty() {
                return Err(AppError::Undo(
                    "Restore step requires a non-empty document list".to_string(),
                ));
            }
            for document in documents {
                restore_document(conn, *collection, document.clone())?;
            }
            Ok(())
        }
        UndoStep::Update {
            collection,
            id,
            set,
            unset,
        } => {
            if set.is_empty() && unset.is_empty() {
                return Ok(());
            }

            let mut document = load_document(conn, *collection, id)?.ok_or_else(|| {
                AppError::Undo(format!(
                    "Cannot apply field update: {} document {id} no longer exists",
                    collection.as_str()
                ))
            })?;

            let serde_json::Value::Object(ref mut fields) = document else {
                return Err(AppError::Undo("Document snapshot is not an object".to_string()));
            };
            for (key, value) in set {
                fields.insert(key.clone(), value.clone());
            }
            for key in unset {
                fields.remove(key);
            }

            restore_document(conn, *collection, document)
        }
    }
}

/// Upsert-by-id of a whole document: replaces the record, creating it when
/// absent.
fn restore_document(
    conn: &Connection,
    collection: Collection,
    document: serde_json::Value,
) -> Result<(), AppError> {
    let malformed = |e: serde_json::Error| {
        AppError::Undo(format!(
            "Malformed {} snapshot in undo payload: {e}",
            collection.as_str()
        ))
    };

    match collection {
        Collection::Rooms => {
            let room: Room = serde_json::from_value(document).map_err(malformed)?;
            queries::upsert_room(conn, &room)?;
        }
        Collection::Slots => {
            let slot: Slot = serde_json::from_value(document).map_err(malformed)?;
            queries::upsert_slot(conn, &slot)?;
        }
        Collection::Bookings => {
            let booking: Booking = serde_json::from_value(document).map_err(malformed)?;
            queries::upsert_booking(conn, &booking)?;
        }
    }
    Ok(())
}

fn load_document(
    conn: &Connection,
    collection: Collection,
    id: &str,
) -> Result<Option<serde_json::Value>, AppError> {
    let to_value = |e: serde_json::Error| {
        AppError::Undo(format!("Failed to serialize current document: {e}"))
    };

    let document = match collection {
        Collection::Rooms => queries::get_room(conn, id)?
            .map(|r| serde_json::to_value(r).map_err(to_value))
            .transpose()?,
        Collection::Slots => queries::get_slot(conn, id)?
            .map(|s| serde_json::to_value(s).map_err(to_value))
            .transpose()?,
        Collection::Bookings => queries::get_booking(conn, id)?
            .map(|b| serde_json::to_value(b).map_err(to_value))
            .transpose()?,
    };
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{SlotStatus, SlotType};

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn sample_slot(id: &str) -> Slot {
        let day = dates::day_bounds("2024-06-03").unwrap().start;
        Slot {
            id: id.to_string(),
            room_id: "r1".to_string(),
            start_time: "08:00".to_string(),
            end_time: "10:00".to_string(),
            service_name: String::new(),
            provider_name: String::new(),
            date: day,
            kind: SlotType::Single,
            status: SlotStatus::Available,
            booked_by: None,
            created_at: day,
        }
    }

    fn log_delete_action(conn: &Connection, slot: &Slot) -> AdminAction {
        log_action(
            conn,
            ActionLog {
                admin_id: "admin".to_string(),
                action_name: "Delete slot".to_string(),
                action_type: ActionType::Delete,
                target_collection: Collection::Slots,
                target_ids: vec![slot.id.clone()],
                details: String::new(),
                metadata: serde_json::json!({}),
                undo_payload: UndoPayload::single(UndoStep::Restore {
                    collection: Collection::Slots,
                    documents: vec![serde_json::to_value(slot).unwrap()],
                }),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_log_refuses_empty_undo_payload() {
        let conn = setup_db();
        let result = log_action(
            &conn,
            ActionLog {
                admin_id: "admin".to_string(),
                action_name: "Mystery".to_string(),
                action_type: ActionType::Custom,
                target_collection: Collection::Slots,
                target_ids: vec![],
                details: String::new(),
                metadata: serde_json::json!({}),
                undo_payload: UndoPayload::default(),
            },
        );
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_undo_restore_recreates_deleted_record() {
        let conn = setup_db();
        let slot = sample_slot("s1");
        queries::insert_slot(&conn, &slot).unwrap();

        let action = log_delete_action(&conn, &slot);
        queries::delete_slots_by_ids(&conn, &[slot.id.clone()]).unwrap();
        assert!(queries::get_slot(&conn, "s1").unwrap().is_none());

        let undone = undo_action(&conn, &action.id).unwrap();
        assert_eq!(undone.status, ActionStatus::Undone);
        assert!(undone.undone_at.is_some());

        let restored = queries::get_slot(&conn, "s1").unwrap().unwrap();
        assert_eq!(restored, slot);
    }

    #[test]
    fn test_undo_is_at_most_once() {
        let conn = setup_db();
        let slot = sample_slot("s1");
        queries::insert_slot(&conn, &slot).unwrap();
        let action = log_delete_action(&conn, &slot);

        undo_action(&conn, &action.id).unwrap();
        let second = undo_action(&conn, &action.id);
        assert!(matches!(second, Err(AppError::Undo(_))));
    }

    #[test]
    fn test_undo_unknown_action() {
        let conn = setup_db();
        assert!(matches!(
            undo_action(&conn, "missing"),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_undo_delete_step_removes_created_records() {
        let conn = setup_db();
        let slot = sample_slot("s1");
        queries::insert_slot(&conn, &slot).unwrap();

        let action = log_action(
            &conn,
            ActionLog {
                admin_id: "admin".to_string(),
                action_name: "Create slot".to_string(),
                action_type: ActionType::Create,
                target_collection: Collection::Slots,
                target_ids: vec!["s1".to_string()],
                details: String::new(),
                metadata: serde_json::json!({}),
                undo_payload: UndoPayload::single(UndoStep::Delete {
                    collection: Collection::Slots,
                    ids: vec!["s1".to_string()],
                }),
            },
        )
        .unwrap();

        undo_action(&conn, &action.id).unwrap();
        assert!(queries::get_slot(&conn, "s1").unwrap().is_none());
    }

    #[test]
    fn test_undo_field_update_step() {
        let conn = setup_db();
        let mut slot = sample_slot("s1");
        slot.service_name = "Piano".to_string();
        slot.provider_name = "Omar".to_string();
        slot.rederive();
        queries::insert_slot(&conn, &slot).unwrap();

        let mut set = serde_json::Map::new();
        set.insert("serviceName".to_string(), serde_json::json!(""));
        set.insert("providerName".to_string(), serde_json::json!(""));
        set.insert("status".to_string(), serde_json::json!("available"));
        set.insert("bookedBy".to_string(), serde_json::json!(null));

        let action = log_action(
            &conn,
            ActionLog {
                admin_id: "admin".to_string(),
                action_name: "Assign provider".to_string(),
                action_type: ActionType::Update,
                target_collection: Collection::Slots,
                target_ids: vec!["s1".to_string()],
                details: String::new(),
                metadata: serde_json::json!({}),
                undo_payload: UndoPayload::single(UndoStep::Update {
                    collection: Collection::Slots,
                    id: "s1".to_string(),
                    set,
                    unset: vec![],
                }),
            },
        )
        .unwrap();

        undo_action(&conn, &action.id).unwrap();
        let reverted = queries::get_slot(&conn, "s1").unwrap().unwrap();
        assert_eq!(reverted.service_name, "");
        assert_eq!(reverted.status, SlotStatus::Available);
        assert_eq!(reverted.booked_by, None);
    }

    #[test]
    fn test_failing_step_keeps_action_completed() {
        let conn = setup_db();
        let slot = sample_slot("s1");
        queries::insert_slot(&conn, &slot).unwrap();

        // Second step targets a document that no longer exists, so the
        // replay aborts after the first step.
        let action = log_action(
            &conn,
            ActionLog {
                admin_id: "admin".to_string(),
                action_name: "Compound".to_string(),
                action_type: ActionType::Custom,
                target_collection: Collection::Slots,
                target_ids: vec!["s1".to_string()],
                details: String::new(),
                metadata: serde_json::json!({}),
                undo_payload: UndoPayload {
                    steps: vec![
                        UndoStep::Delete {
                            collection: Collection::Slots,
                            ids: vec!["s1".to_string()],
                        },
                        UndoStep::Update {
                            collection: Collection::Slots,
                            id: "ghost".to_string(),
                            set: serde_json::Map::from_iter([(
                                "status".to_string(),
                                serde_json::json!("available"),
                            )]),
                            unset: vec![],
                        },
                    ],
                },
            },
        )
        .unwrap();

        let result = undo_action(&conn, &action.id);
        assert!(matches!(result, Err(AppError::Undo(_))));

        // First step applied, action still marked completed so it can be
        // re-run once the cause is fixed.
        assert!(queries::get_slot(&conn, "s1").unwrap().is_none());
        let reloaded = queries::get_action(&conn, &action.id).unwrap().unwrap();
        assert_eq!(reloaded.status, ActionStatus::Completed);
    }
}
