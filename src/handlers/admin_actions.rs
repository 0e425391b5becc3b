use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use super::require_admin;
use crate::db::queries;
use crate::errors::AppError;
use crate::models::ActionStatus;
use crate::services::audit;
use crate::state::AppState;

// GET /api/admin-actions
#[derive(Deserialize)]
pub struct ActionsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
}

pub async fn list_actions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ActionsQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_admin(&headers, &state.config)?;

    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let status = match query.status.as_deref() {
        None | Some("") => None,
        Some("completed") => Some(ActionStatus::Completed),
        Some("undone") => Some(ActionStatus::Undone),
        Some(other) => {
            return Err(AppError::Validation(format!(
                "status must be 'completed' or 'undone', got '{other}'"
            )))
        }
    };

    let (actions, total) = {
        let db = state.db.lock().unwrap();
        (
            queries::list_actions(&db, (page - 1) * limit, limit, status)?,
            queries::count_actions(&db, status)?,
        )
    };

    let total_pages = (total + limit - 1) / limit;
    Ok(Json(serde_json::json!({
        "actions": actions,
        "pagination": {
            "total": total,
            "page": page,
            "limit": limit,
            "totalPages": total_pages,
        }
    })))
}

// POST /api/admin-actions/:id/undo
pub async fn undo_action(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_admin(&headers, &state.config)?;

    let action = {
        let db = state.db.lock().unwrap();
        audit::undo_action(&db, &id)?
    };

    tracing::info!(action_id = %action.id, action = %action.action_name, "admin action undone");

    Ok(Json(serde_json::json!({
        "success": true,
        "action": action,
    })))
}
