//! Room-access token API endpoint

use axum::{extract::State, Json};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState};
use crate::services::RoomToken;

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub session_id: String,
    pub identity: String,
}

/// Issue a room-access token for an active session participant
pub async fn create_token(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> Result<Json<RoomToken>, ApiError> {
    let token = state
        .room_tokens
        .issue(&req.session_id, &req.identity)
        .await?;
    Ok(Json(token))
}
