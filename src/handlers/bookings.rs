use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use super::require_admin;
use crate::db::queries;
use crate::errors::AppError;
use crate::models::{
    is_valid_phone_number, ActionType, Booking, BookingStatus, Collection, SlotStatus,
    UndoPayload, UndoStep,
};
use crate::services::audit::{self, ActionLog};
use crate::services::dates;
use crate::services::notify::{self, EventKind};
use crate::services::recurring;
use crate::state::AppState;

// GET /api/bookings
pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Booking>>, AppError> {
    require_admin(&headers, &state.config)?;

    let bookings = {
        let db = state.db.lock().unwrap();
        queries::list_bookings(&db, None)?
    };
    Ok(Json(bookings))
}

// GET /api/bookings/pending
pub async fn pending_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Booking>>, AppError> {
    require_admin(&headers, &state.config)?;

    let bookings = {
        let db = state.db.lock().unwrap();
        queries::list_bookings(&db, Some(BookingStatus::Pending))?
    };
    Ok(Json(bookings))
}

// POST /api/bookings: public request, single or recurring.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateBookingRequest {
    pub user_name: Option<String>,
    pub phone_number: Option<String>,
    pub room_id: Option<String>,
    pub slot_id: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub service_name: Option<String>,
    pub provider_name: Option<String>,
    pub date: Option<String>,
    #[serde(default)]
    pub is_recurring: bool,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let required = |v: &Option<String>| v.as_deref().filter(|s| !s.is_empty()).map(str::to_string);

    let (
        Some(user_name),
        Some(phone_number),
        Some(room_id),
        Some(start_time),
        Some(end_time),
        Some(service_name),
        Some(provider_name),
    ) = (
        required(&body.user_name),
        required(&body.phone_number),
        required(&body.room_id),
        required(&body.start_time),
        required(&body.end_time),
        required(&body.service_name),
        required(&body.provider_name),
    )
    else {
        return Err(AppError::Validation("All fields are required".to_string()));
    };

    if !is_valid_phone_number(&phone_number) {
        return Err(AppError::Validation(
            "Phone number must be 11 digits and start with 010, 011, 012, or 015".to_string(),
        ));
    }

    let now = dates::now();
    let booking = if body.is_recurring {
        let start_raw = required(&body.start_date).ok_or_else(|| {
            AppError::Validation("startDate and endDate are required for recurring bookings".to_string())
        })?;
        let end_raw = required(&body.end_date).ok_or_else(|| {
            AppError::Validation("startDate and endDate are required for recurring bookings".to_string())
        })?;
        let start_date = dates::required_day(&start_raw, "startDate")?;
        let end_date = dates::required_day(&end_raw, "endDate")?;

        let booking = {
            let db = state.db.lock().unwrap();
            // All-or-nothing: the whole request is rejected before anything
            // is written if a single occurrence has no free slot.
            recurring::validate_occurrences(
                &db,
                &room_id,
                &start_time,
                &end_time,
                start_date,
                end_date,
            )?;

            let booking = Booking {
                id: uuid::Uuid::new_v4().to_string(),
                user_name,
                phone_number,
                slot_id: None,
                room_id,
                start_time,
                end_time,
                service_name,
                provider_name,
                status: BookingStatus::Pending,
                date: None,
                is_recurring: true,
                start_date: Some(start_date),
                end_date: Some(end_date),
                recurring_day_of_week: Some(dates::day_of_week(&start_date)),
                created_at: now,
                updated_at: now,
            };
            queries::insert_booking(&db, &booking)?;
            booking
        };
        booking
    } else {
        let slot_id = required(&body.slot_id)
            .ok_or_else(|| AppError::Validation("All fields are required".to_string()))?;

        let booking = {
            let db = state.db.lock().unwrap();

            let slot = queries::get_slot(&db, &slot_id)?
                .ok_or_else(|| AppError::NotFound("Slot not found".to_string()))?;
            if slot.status == SlotStatus::Booked {
                return Err(AppError::Conflict("This slot is already booked".to_string()));
            }

            // Times and date come from the slot record, not the request.
            let booking = Booking {
                id: uuid::Uuid::new_v4().to_string(),
                user_name,
                phone_number,
                slot_id: Some(slot.id.clone()),
                room_id: slot.room_id.clone(),
                start_time: slot.start_time.clone(),
                end_time: slot.end_time.clone(),
                service_name,
                provider_name,
                status: BookingStatus::Pending,
                date: Some(slot.date),
                is_recurring: false,
                start_date: None,
                end_date: None,
                recurring_day_of_week: None,
                created_at: now,
                updated_at: now,
            };
            queries::insert_booking(&db, &booking)?;
            booking
        };
        booking
    };

    notify::emit(
        &state,
        EventKind::NewBookingRequest,
        serde_json::to_value(&booking).map_err(anyhow::Error::from)?,
    );

    Ok((StatusCode::CREATED, Json(booking)))
}

// PUT /api/bookings/:id/approve
//
// Recurring parents materialize here: one concrete booking per occurrence
// whose slot is still free. Occurrences that drifted since request time are
// skipped, never errors; the asymmetry with request-time validation is
// deliberate.
pub async fn approve_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let admin_id = require_admin(&headers, &state.config)?;

    let (response, events) = {
        let db = state.db.lock().unwrap();

        let mut booking = queries::get_booking(&db, &id)?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;
        if booking.status != BookingStatus::Pending {
            return Err(AppError::Conflict(format!(
                "Booking already {}",
                booking.status.as_str()
            )));
        }
        let before = serde_json::to_value(&booking).map_err(anyhow::Error::from)?;

        let mut steps = vec![UndoStep::Restore {
            collection: Collection::Bookings,
            documents: vec![before],
        }];
        let mut events: Vec<(EventKind, serde_json::Value)> = Vec::new();

        let response = if booking.is_recurring {
            let outcome = recurring::approve_occurrences(&db, &booking)?;

            booking.status = BookingStatus::Approved;
            booking.updated_at = dates::now();
            queries::update_booking(&db, &booking)?;

            if !outcome.slots_before.is_empty() {
                let documents = outcome
                    .slots_before
                    .iter()
                    .map(serde_json::to_value)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(anyhow::Error::from)?;
                steps.push(UndoStep::Restore {
                    collection: Collection::Slots,
                    documents,
                });
            }
            if !outcome.created.is_empty() {
                steps.push(UndoStep::Delete {
                    collection: Collection::Bookings,
                    ids: outcome.created.iter().map(|b| b.id.clone()).collect(),
                });
            }

            audit::log_action_or_warn(
                &db,
                ActionLog {
                    admin_id,
                    action_name: "Approve recurring booking".to_string(),
                    action_type: ActionType::StatusChange,
                    target_collection: Collection::Bookings,
                    target_ids: vec![booking.id.clone()],
                    details: format!(
                        "Approved recurring booking for {}: {} occurrences created, {} skipped",
                        booking.user_name,
                        outcome.created.len(),
                        outcome.skipped
                    ),
                    metadata: serde_json::json!({
                        "createdCount": outcome.created.len(),
                        "skipped": outcome.skipped,
                    }),
                    undo_payload: UndoPayload { steps },
                },
            );

            for slot in &outcome.slots_after {
                events.push((
                    EventKind::SlotUpdated,
                    serde_json::to_value(slot).map_err(anyhow::Error::from)?,
                ));
            }
            events.push((
                EventKind::BookingApproved,
                serde_json::to_value(&booking).map_err(anyhow::Error::from)?,
            ));

            serde_json::json!({
                "booking": booking,
                "createdCount": outcome.created.len(),
                "skipped": outcome.skipped,
            })
        } else {
            // The slot may have been deleted since the request; approval
            // still goes through and only flips the slot when present.
            if let Some(slot_id) = booking.slot_id.clone() {
                if let Some(mut slot) = queries::get_slot(&db, &slot_id)? {
                    let slot_before =
                        serde_json::to_value(&slot).map_err(anyhow::Error::from)?;
                    slot.service_name = booking.service_name.clone();
                    slot.provider_name = booking.provider_name.clone();
                    slot.rederive();
                    queries::update_slot(&db, &slot)?;

                    steps.push(UndoStep::Restore {
                        collection: Collection::Slots,
                        documents: vec![slot_before],
                    });
                    events.push((
                        EventKind::SlotUpdated,
                        serde_json::to_value(&slot).map_err(anyhow::Error::from)?,
                    ));
                }
            }

            booking.status = BookingStatus::Approved;
            booking.updated_at = dates::now();
            queries::update_booking(&db, &booking)?;

            audit::log_action_or_warn(
                &db,
                ActionLog {
                    admin_id,
                    action_name: "Approve booking".to_string(),
                    action_type: ActionType::StatusChange,
                    target_collection: Collection::Bookings,
                    target_ids: vec![booking.id.clone()],
                    details: format!("Approved booking for {}", booking.user_name),
                    metadata: serde_json::json!({}),
                    undo_payload: UndoPayload { steps },
                },
            );

            events.push((
                EventKind::BookingApproved,
                serde_json::to_value(&booking).map_err(anyhow::Error::from)?,
            ));

            serde_json::to_value(&booking).map_err(anyhow::Error::from)?
        };

        (response, events)
    };

    for (kind, payload) in events {
        notify::emit(&state, kind, payload);
    }

    Ok(Json(response))
}

// PUT /api/bookings/:id/reject flips the parent only, slots untouched.
pub async fn reject_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    let admin_id = require_admin(&headers, &state.config)?;

    let booking = {
        let db = state.db.lock().unwrap();

        let mut booking = queries::get_booking(&db, &id)?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;
        if booking.status != BookingStatus::Pending {
            return Err(AppError::Conflict(format!(
                "Booking already {}",
                booking.status.as_str()
            )));
        }
        let before = serde_json::to_value(&booking).map_err(anyhow::Error::from)?;

        booking.status = BookingStatus::Rejected;
        booking.updated_at = dates::now();
        queries::update_booking(&db, &booking)?;

        audit::log_action_or_warn(
            &db,
            ActionLog {
                admin_id,
                action_name: "Reject booking".to_string(),
                action_type: ActionType::StatusChange,
                target_collection: Collection::Bookings,
                target_ids: vec![booking.id.clone()],
                details: format!("Rejected booking for {}", booking.user_name),
                metadata: serde_json::json!({}),
                undo_payload: UndoPayload::single(UndoStep::Restore {
                    collection: Collection::Bookings,
                    documents: vec![before],
                }),
            },
        );

        booking
    };

    notify::emit(
        &state,
        EventKind::BookingRejected,
        serde_json::to_value(&booking).map_err(anyhow::Error::from)?,
    );

    Ok(Json(booking))
}

// DELETE /api/bookings/:id
pub async fn delete_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let admin_id = require_admin(&headers, &state.config)?;

    {
        let db = state.db.lock().unwrap();

        let booking = queries::get_booking(&db, &id)?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        queries::delete_bookings_by_ids(&db, std::slice::from_ref(&id))?;

        audit::log_action_or_warn(
            &db,
            ActionLog {
                admin_id,
                action_name: "Delete booking".to_string(),
                action_type: ActionType::Delete,
                target_collection: Collection::Bookings,
                target_ids: vec![booking.id.clone()],
                details: format!("Deleted booking for {}", booking.user_name),
                metadata: serde_json::json!({}),
                undo_payload: UndoPayload::single(UndoStep::Restore {
                    collection: Collection::Bookings,
                    documents: vec![serde_json::to_value(&booking).map_err(anyhow::Error::from)?],
                }),
            },
        );
    }

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Booking deleted successfully"
    })))
}
