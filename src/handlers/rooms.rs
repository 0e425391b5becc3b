use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use super::require_admin;
use crate::db::queries;
use crate::errors::AppError;
use crate::models::{ActionType, Collection, Room, UndoPayload, UndoStep};
use crate::services::audit::{self, ActionLog};
use crate::services::dates;
use crate::state::AppState;

// GET /api/rooms
pub async fn list_rooms(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Room>>, AppError> {
    let rooms = {
        let db = state.db.lock().unwrap();
        queries::list_rooms(&db)?
    };
    Ok(Json(rooms))
}

// POST /api/rooms
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub name: Option<String>,
}

pub async fn create_room(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<Room>), AppError> {
    let admin_id = require_admin(&headers, &state.config)?;

    let name = body.name.unwrap_or_default().trim().to_string();
    if name.is_empty() {
        return Err(AppError::Validation("Room name is required".to_string()));
    }

    let room = Room::new(name, dates::now());
    {
        let db = state.db.lock().unwrap();
        queries::insert_room(&db, &room)?;

        audit::log_action_or_warn(
            &db,
            ActionLog {
                admin_id,
                action_name: "Create room".to_string(),
                action_type: ActionType::Create,
                target_collection: Collection::Rooms,
                target_ids: vec![room.id.clone()],
                details: format!("Created room '{}'", room.name),
                metadata: serde_json::json!({}),
                undo_payload: UndoPayload::single(UndoStep::Delete {
                    collection: Collection::Rooms,
                    ids: vec![room.id.clone()],
                }),
            },
        );
    }

    Ok((StatusCode::CREATED, Json(room)))
}

// PUT /api/rooms/:id
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoomRequest {
    pub name: Option<String>,
    pub is_enabled: Option<bool>,
}

pub async fn update_room(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpdateRoomRequest>,
) -> Result<Json<Room>, AppError> {
    let admin_id = require_admin(&headers, &state.config)?;

    let room = {
        let db = state.db.lock().unwrap();

        let mut room = queries::get_room(&db, &id)?
            .ok_or_else(|| AppError::NotFound("Room not found".to_string()))?;
        let before = serde_json::to_value(&room).map_err(anyhow::Error::from)?;

        if let Some(name) = body.name {
            if !name.trim().is_empty() {
                room.name = name.trim().to_string();
            }
        }
        if let Some(is_enabled) = body.is_enabled {
            room.is_enabled = is_enabled;
        }
        room.updated_at = dates::now();
        queries::update_room(&db, &room)?;

        audit::log_action_or_warn(
            &db,
            ActionLog {
                admin_id,
                action_name: "Update room".to_string(),
                action_type: ActionType::Update,
                target_collection: Collection::Rooms,
                target_ids: vec![room.id.clone()],
                details: format!("Updated room '{}'", room.name),
                metadata: serde_json::json!({}),
                undo_payload: UndoPayload::single(UndoStep::Restore {
                    collection: Collection::Rooms,
                    documents: vec![before],
                }),
            },
        );

        room
    };

    Ok(Json(room))
}

// DELETE /api/rooms/:id
//
// Slots cascade inside the same logical action: one audit record, ordered
// undo steps restoring the room first and its slots after it.
pub async fn delete_room(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let admin_id = require_admin(&headers, &state.config)?;

    {
        let db = state.db.lock().unwrap();

        let room = queries::get_room(&db, &id)?
            .ok_or_else(|| AppError::NotFound("Room not found".to_string()))?;
        let slots = queries::slots_for_room(&db, &id, None)?;

        queries::delete_slots_by_room(&db, &id)?;
        queries::delete_rooms_by_ids(&db, std::slice::from_ref(&id))?;

        let mut steps = vec![UndoStep::Restore {
            collection: Collection::Rooms,
            documents: vec![serde_json::to_value(&room).map_err(anyhow::Error::from)?],
        }];
        if !slots.is_empty() {
            let documents = slots
                .iter()
                .map(serde_json::to_value)
                .collect::<Result<Vec<_>, _>>()
                .map_err(anyhow::Error::from)?;
            steps.push(UndoStep::Restore {
                collection: Collection::Slots,
                documents,
            });
        }

        audit::log_action_or_warn(
            &db,
            ActionLog {
                admin_id,
                action_name: "Delete room".to_string(),
                action_type: ActionType::Delete,
                target_collection: Collection::Rooms,
                target_ids: vec![room.id.clone()],
                details: format!("Deleted room '{}' and {} slots", room.name, slots.len()),
                metadata: serde_json::json!({ "slotCount": slots.len() }),
                undo_payload: UndoPayload { steps },
            },
        );
    }

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Room deleted successfully"
    })))
}
