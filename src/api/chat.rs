//! In-call chat API endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::{MessageListResponse, MessageResponse};
use crate::models::CreateChatMessageInput;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub identity: String,
}

/// Post a chat message into an active session
pub async fn post_message(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(input): Json<CreateChatMessageInput>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let message = state.chat.post(&session_id, input).await?;
    Ok((StatusCode::CREATED, Json(MessageResponse { message })))
}

/// Chat history for a participant
pub async fn list_messages(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<MessageListResponse>, ApiError> {
    let messages = state.chat.history(&session_id, &query.identity).await?;
    Ok(Json(MessageListResponse { messages }))
}
