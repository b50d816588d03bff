//! Call session API endpoints

use std::convert::Infallible;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::Stream;
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::{SessionListResponse, SessionResponse};
use crate::models::{CreateSessionInput, SessionStatus};

/// Body for transition endpoints naming the acting participant
#[derive(Debug, Deserialize)]
pub struct IdentityBody {
    pub identity: String,
}

#[derive(Debug, Deserialize)]
pub struct SessionListQuery {
    pub participant: Option<String>,
    pub status: Option<String>,
    pub role: Option<String>,
}

/// Create a session request
pub async fn create_session(
    State(state): State<AppState>,
    Json(input): Json<CreateSessionInput>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let session = state.sessions.create(input).await?;
    Ok((StatusCode::CREATED, Json(SessionResponse { session })))
}

/// Get a session by id
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.sessions.get(&id).await?;
    Ok(Json(SessionResponse { session }))
}

/// Dashboard listing: sessions for a participant, newest first
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<SessionListQuery>,
) -> Result<Json<SessionListResponse>, ApiError> {
    let participant = query
        .participant
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::validation_error("participant query parameter is required"))?;

    let status = match query.status.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(
            raw.parse::<SessionStatus>()
                .map_err(|_| ApiError::validation_error(format!("Unknown status: {}", raw)))?,
        ),
    };

    let mut sessions = state.sessions.list_for_participant(participant, status).await?;
    match query.role.as_deref() {
        None | Some("") => {}
        Some("user") => sessions.retain(|s| s.user_id == participant),
        Some("astro") => sessions.retain(|s| s.astro_id == participant),
        Some(other) => {
            return Err(ApiError::validation_error(format!(
                "Unknown role: {} (expected user or astro)",
                other
            )));
        }
    }
    Ok(Json(SessionListResponse { sessions }))
}

/// Accept a pending session (astrologer only)
pub async fn accept_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<IdentityBody>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.sessions.accept(&id, &body.identity).await?;
    Ok(Json(SessionResponse { session }))
}

/// Decline a pending session (astrologer side)
pub async fn decline_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<IdentityBody>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.sessions.decline(&id, &body.identity).await?;
    Ok(Json(SessionResponse { session }))
}

/// Cancel a pending session (client side)
pub async fn cancel_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<IdentityBody>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.sessions.cancel(&id, &body.identity).await?;
    Ok(Json(SessionResponse { session }))
}

/// End an active session (either participant)
pub async fn end_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<IdentityBody>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.sessions.end(&id, &body.identity).await?;
    Ok(Json(SessionResponse { session }))
}

/// SSE stream of session state changes.
///
/// Emits the current state immediately, then every subsequent change. The
/// stream closes after a terminal state is delivered.
pub async fn session_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let receiver = state.sessions.subscribe(&id).await?;

    let stream = futures::stream::unfold(
        (receiver, true, false),
        |(mut rx, first, done)| async move {
            if done {
                return None;
            }
            if !first && rx.changed().await.is_err() {
                return None;
            }
            let session = rx.borrow_and_update().clone();
            let terminal = session.status.is_terminal();
            let event = Event::default().event("session").json_data(&session).ok()?;
            Some((Ok(event), (rx, false, terminal)))
        },
    );

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
