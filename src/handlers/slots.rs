use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use super::require_admin;
use crate::db::queries::{self, SlotOrder};
use crate::errors::AppError;
use crate::models::{ActionType, Collection, Slot, SlotStatus, SlotType, UndoPayload, UndoStep};
use crate::services::audit::{self, ActionLog};
use crate::services::bulk::{self, SlotTemplate, SlotUpdates};
use crate::services::dates;
use crate::services::filter::SlotFilter;
use crate::state::AppState;

// GET /api/slots
//
// The full filter option set as query parameters; list-valued options come
// comma-separated. Post-filters run before pagination so a page never
// contains excluded rows.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSlotsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub room_id: Option<String>,
    pub room_ids: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub service_name: Option<String>,
    pub provider_name: Option<String>,
    pub date: Option<String>,
    pub date_range_start: Option<String>,
    pub date_range_end: Option<String>,
    pub days_of_week: Option<String>,
    pub time_ranges: Option<String>,
    pub status: Option<String>,
}

impl ListSlotsQuery {
    fn into_filter(self) -> Result<SlotFilter, AppError> {
        let kind = match self.kind.as_deref() {
            None | Some("") => None,
            Some("single") => Some(SlotType::Single),
            Some("weekly") => Some(SlotType::Weekly),
            Some(other) => {
                return Err(AppError::Validation(format!(
                    "type must be 'single' or 'weekly', got '{other}'"
                )))
            }
        };
        let status = match self.status.as_deref() {
            None | Some("") => None,
            Some("available") => Some(SlotStatus::Available),
            Some("booked") => Some(SlotStatus::Booked),
            Some(other) => {
                return Err(AppError::Validation(format!(
                    "status must be 'available' or 'booked', got '{other}'"
                )))
            }
        };

        let days_of_week = match &self.days_of_week {
            None => None,
            Some(raw) => {
                let mut days = Vec::new();
                for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                    let day: u8 = part.parse().map_err(|_| {
                        AppError::Validation(format!("daysOfWeek must be integers, got '{part}'"))
                    })?;
                    days.push(day);
                }
                Some(days)
            }
        };
        let time_ranges = self.time_ranges.map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect()
        });
        let room_ids = self.room_ids.map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect()
        });

        Ok(SlotFilter {
            room_id: self.room_id,
            room_ids,
            kind,
            start_time: self.start_time,
            end_time: self.end_time,
            service_name: self.service_name,
            provider_name: self.provider_name,
            date: self.date,
            date_range_start: self.date_range_start,
            date_range_end: self.date_range_end,
            days_of_week,
            time_ranges,
            status,
        })
    }
}

pub async fn list_slots(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListSlotsQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_admin(&headers, &state.config)?;

    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(50).max(1);

    let filter = query.into_filter()?;
    let compiled = filter.compile()?;

    let slots = {
        let db = state.db.lock().unwrap();
        compiled.apply_post_filters(queries::find_slots(&db, &compiled, SlotOrder::DateDescStartAsc)?)
    };

    let total = slots.len() as i64;
    let total_pages = (total + limit - 1) / limit;
    let start = ((page - 1) * limit) as usize;
    let page_slots: Vec<&Slot> = slots.iter().skip(start).take(limit as usize).collect();

    Ok(Json(serde_json::json!({
        "slots": page_slots,
        "pagination": {
            "total": total,
            "page": page,
            "limit": limit,
            "totalPages": total_pages,
        }
    })))
}

// GET /api/slots/room/:roomId, the public browse listing, chronological.
#[derive(Deserialize)]
pub struct RoomSlotsQuery {
    pub date: Option<String>,
}

pub async fn slots_for_room(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    Query(query): Query<RoomSlotsQuery>,
) -> Result<Json<Vec<Slot>>, AppError> {
    let day = query.date.as_deref().and_then(dates::day_bounds);

    let slots = {
        let db = state.db.lock().unwrap();
        queries::slots_for_room(&db, &room_id, day.as_ref())?
    };
    Ok(Json(slots))
}

// POST /api/slots
#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateSlotRequest {
    pub room_id: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub date: Option<String>,
    pub service_name: Option<String>,
    pub provider_name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<SlotType>,
}

pub async fn create_slot(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateSlotRequest>,
) -> Result<(StatusCode, Json<Slot>), AppError> {
    let admin_id = require_admin(&headers, &state.config)?;

    let (Some(room_id), Some(start_time), Some(end_time), Some(date)) = (
        body.room_id.filter(|v| !v.is_empty()),
        body.start_time.filter(|v| !v.is_empty()),
        body.end_time.filter(|v| !v.is_empty()),
        body.date.filter(|v| !v.is_empty()),
    ) else {
        return Err(AppError::Validation(
            "Room, time, and date are required".to_string(),
        ));
    };

    if !crate::services::filter::is_valid_time(&start_time)
        || !crate::services::filter::is_valid_time(&end_time)
    {
        return Err(AppError::Validation(format!(
            "Slot times must be HH:MM, got '{start_time}'-'{end_time}'"
        )));
    }

    let day = dates::required_day(&date, "date")?;
    let service_name = body.service_name.unwrap_or_default();
    let provider_name = body.provider_name.unwrap_or_default();
    let (status, booked_by) = Slot::derive_state(&service_name, &provider_name);

    let slot = Slot {
        id: uuid::Uuid::new_v4().to_string(),
        room_id,
        start_time,
        end_time,
        service_name,
        provider_name,
        date: day,
        kind: body.kind.unwrap_or(SlotType::Single),
        status,
        booked_by,
        created_at: dates::now(),
    };

    {
        let db = state.db.lock().unwrap();
        if queries::get_room(&db, &slot.room_id)?.is_none() {
            return Err(AppError::NotFound("Room not found".to_string()));
        }
        queries::insert_slot(&db, &slot)?;

        audit::log_action_or_warn(
            &db,
            ActionLog {
                admin_id,
                action_name: "Create slot".to_string(),
                action_type: ActionType::Create,
                target_collection: Collection::Slots,
                target_ids: vec![slot.id.clone()],
                details: format!(
                    "Created {} slot {}-{} on {}",
                    slot.kind.as_str(),
                    slot.start_time,
                    slot.end_time,
                    slot.date.format("%Y-%m-%d"),
                ),
                metadata: serde_json::json!({}),
                undo_payload: UndoPayload::single(UndoStep::Delete {
                    collection: Collection::Slots,
                    ids: vec![slot.id.clone()],
                }),
            },
        );
    }

    Ok((StatusCode::CREATED, Json(slot)))
}

// PUT /api/slots/:id
#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateSlotRequest {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub date: Option<String>,
    pub service_name: Option<String>,
    pub provider_name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<SlotType>,
}

pub async fn update_slot(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpdateSlotRequest>,
) -> Result<Json<Slot>, AppError> {
    let admin_id = require_admin(&headers, &state.config)?;

    let slot = {
        let db = state.db.lock().unwrap();

        let mut slot = queries::get_slot(&db, &id)?
            .ok_or_else(|| AppError::NotFound("Slot not found".to_string()))?;
        let before = serde_json::to_value(&slot).map_err(anyhow::Error::from)?;

        if let Some(start_time) = body.start_time.filter(|v| !v.is_empty()) {
            slot.start_time = start_time;
        }
        if let Some(end_time) = body.end_time.filter(|v| !v.is_empty()) {
            slot.end_time = end_time;
        }
        if let Some(date) = body.date.filter(|v| !v.is_empty()) {
            slot.date = dates::required_day(&date, "date")?;
        }
        if let Some(service_name) = body.service_name {
            slot.service_name = service_name;
        }
        if let Some(provider_name) = body.provider_name {
            slot.provider_name = provider_name;
        }
        if let Some(kind) = body.kind {
            slot.kind = kind;
        }
        slot.rederive();

        queries::update_slot(&db, &slot)?;

        audit::log_action_or_warn(
            &db,
            ActionLog {
                admin_id,
                action_name: "Update slot".to_string(),
                action_type: ActionType::Update,
                target_collection: Collection::Slots,
                target_ids: vec![slot.id.clone()],
                details: format!(
                    "Updated slot {}-{} on {}",
                    slot.start_time,
                    slot.end_time,
                    slot.date.format("%Y-%m-%d"),
                ),
                metadata: serde_json::json!({}),
                undo_payload: UndoPayload::single(UndoStep::Restore {
                    collection: Collection::Slots,
                    documents: vec![before],
                }),
            },
        );

        slot
    };

    Ok(Json(slot))
}

// DELETE /api/slots/:id
pub async fn delete_slot(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let admin_id = require_admin(&headers, &state.config)?;

    {
        let db = state.db.lock().unwrap();

        let slot = queries::get_slot(&db, &id)?
            .ok_or_else(|| AppError::NotFound("Slot not found".to_string()))?;

        queries::delete_slots_by_ids(&db, std::slice::from_ref(&id))?;

        audit::log_action_or_warn(
            &db,
            ActionLog {
                admin_id,
                action_name: "Delete slot".to_string(),
                action_type: ActionType::Delete,
                target_collection: Collection::Slots,
                target_ids: vec![slot.id.clone()],
                details: format!(
                    "Deleted slot {}-{} on {}",
                    slot.start_time,
                    slot.end_time,
                    slot.date.format("%Y-%m-%d"),
                ),
                metadata: serde_json::json!({}),
                undo_payload: UndoPayload::single(UndoStep::Restore {
                    collection: Collection::Slots,
                    documents: vec![serde_json::to_value(&slot).map_err(anyhow::Error::from)?],
                }),
            },
        );
    }

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Slot deleted successfully"
    })))
}

// POST /api/slots/bulk
#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BulkCreateRequest {
    pub room_ids: Option<Vec<String>>,
    pub slots: Option<Vec<SlotTemplate>>,
}

pub async fn bulk_create_slots(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<BulkCreateRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let admin_id = require_admin(&headers, &state.config)?;

    let room_ids = body.room_ids.unwrap_or_default();
    let templates = body.slots.unwrap_or_default();

    let created = {
        let db = state.db.lock().unwrap();
        let created = bulk::bulk_create(&db, &room_ids, &templates)?;

        let ids: Vec<String> = created.iter().map(|s| s.id.clone()).collect();
        audit::log_action_or_warn(
            &db,
            ActionLog {
                admin_id,
                action_name: "Bulk create slots".to_string(),
                action_type: ActionType::BulkCreate,
                target_collection: Collection::Slots,
                target_ids: ids.clone(),
                details: format!(
                    "Created {} slots across {} rooms",
                    created.len(),
                    room_ids.len()
                ),
                metadata: serde_json::json!({
                    "count": created.len(),
                    "slots": created,
                }),
                undo_payload: UndoPayload::single(UndoStep::Delete {
                    collection: Collection::Slots,
                    ids,
                }),
            },
        );

        created
    };

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "success": true,
            "count": created.len(),
            "slots": created,
        })),
    ))
}

// PUT /api/slots/bulk-update
//
// Two mutually exclusive target selectors: an explicit id list (trusted
// fields, no re-derivation) or a filter (derived status/bookedBy). The
// response always distinguishes matched, modified, and no-op outcomes.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BulkUpdateRequest {
    pub slot_ids: Option<Vec<String>>,
    pub filters: Option<SlotFilter>,
    pub updates: Option<SlotUpdates>,
}

pub async fn bulk_update_slots(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<BulkUpdateRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let admin_id = require_admin(&headers, &state.config)?;

    let updates = body.updates.unwrap_or_default();

    let outcome = {
        let db = state.db.lock().unwrap();

        let outcome = match &body.slot_ids {
            Some(ids) => bulk::bulk_update_by_ids(&db, ids, &updates)?,
            None => {
                let filter = body.filters.unwrap_or_default();
                bulk::bulk_update_by_filter(&db, &filter, &updates)?
            }
        };

        if outcome.matched_count == 0 {
            return Err(AppError::NotFound("No slots matched".to_string()));
        }

        if outcome.modified_count() > 0 {
            let documents = outcome
                .before
                .iter()
                .map(serde_json::to_value)
                .collect::<Result<Vec<_>, _>>()
                .map_err(anyhow::Error::from)?;

            audit::log_action_or_warn(
                &db,
                ActionLog {
                    admin_id,
                    action_name: "Bulk update slots".to_string(),
                    action_type: ActionType::BulkUpdate,
                    target_collection: Collection::Slots,
                    target_ids: outcome.modified_ids.clone(),
                    details: format!(
                        "Updated {} of {} matched slots",
                        outcome.modified_count(),
                        outcome.matched_count
                    ),
                    metadata: serde_json::json!({
                        "matchedCount": outcome.matched_count,
                        "modifiedCount": outcome.modified_count(),
                    }),
                    undo_payload: UndoPayload::single(UndoStep::Restore {
                        collection: Collection::Slots,
                        documents,
                    }),
                },
            );
        }

        outcome
    };

    Ok(Json(serde_json::json!({
        "matchedCount": outcome.matched_count,
        "modifiedCount": outcome.modified_count(),
        "count": outcome.modified_count(),
    })))
}

// POST /api/slots/bulk-delete
#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BulkDeleteRequest {
    pub filters: Option<SlotFilter>,
}

pub async fn bulk_delete_slots(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<BulkDeleteRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let admin_id = require_admin(&headers, &state.config)?;

    let filter = body.filters.unwrap_or_default();

    let deleted = {
        let db = state.db.lock().unwrap();
        let deleted = bulk::bulk_delete_by_filter(&db, &filter)?;

        if deleted.is_empty() {
            return Err(AppError::NotFound("No slots matched".to_string()));
        }

        let documents = deleted
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(anyhow::Error::from)?;

        audit::log_action_or_warn(
            &db,
            ActionLog {
                admin_id,
                action_name: "Bulk delete slots".to_string(),
                action_type: ActionType::BulkDelete,
                target_collection: Collection::Slots,
                target_ids: deleted.iter().map(|s| s.id.clone()).collect(),
                details: format!("Deleted {} slots", deleted.len()),
                metadata: serde_json::json!({ "count": deleted.len() }),
                undo_payload: UndoPayload::single(UndoStep::Restore {
                    collection: Collection::Slots,
                    documents,
                }),
            },
        );

        deleted
    };

    Ok(Json(serde_json::json!({
        "success": true,
        "count": deleted.len(),
    })))
}
