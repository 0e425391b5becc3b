pub mod admin_actions;
pub mod bookings;
pub mod events;
pub mod health;
pub mod rooms;
pub mod slots;

use axum::http::HeaderMap;

use crate::config::AppConfig;
use crate::errors::AppError;

/// The gate consumed from the auth collaborator: a valid bearer token yields
/// the acting admin id, anything else refuses the operation. The id is
/// plumbed into every audit-log call.
pub(crate) fn require_admin(headers: &HeaderMap, config: &AppConfig) -> Result<String, AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token.is_empty() || token != config.admin_token {
        return Err(AppError::Unauthorized);
    }
    Ok(config.admin_id.clone())
}
