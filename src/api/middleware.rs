//! API middleware and shared state
//!
//! `AppState` carries the wired services into handlers. `ApiError` is the
//! uniform error envelope; every service error converts into it and the
//! code string decides the HTTP status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::services::{
    AstrologerService, AstrologerServiceError, ChatService, ChatServiceError, ReviewService,
    ReviewServiceError, RoomTokenError, RoomTokenService, SessionService, SessionServiceError,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionService>,
    pub chat: Arc<ChatService>,
    pub reviews: Arc<ReviewService>,
    pub astrologers: Arc<AstrologerService>,
    pub room_tokens: Arc<RoomTokenService>,
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn illegal_transition(message: impl Into<String>) -> Self {
        Self::new("ILLEGAL_TRANSITION", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.code.as_str() {
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "UNAUTHORIZED" => StatusCode::FORBIDDEN,
            "ILLEGAL_TRANSITION" => StatusCode::CONFLICT,
            "CONFLICT" => StatusCode::CONFLICT,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "UNCONFIGURED" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

impl From<SessionServiceError> for ApiError {
    fn from(e: SessionServiceError) -> Self {
        match &e {
            SessionServiceError::NotFound(_) | SessionServiceError::AstrologerNotFound(_) => {
                Self::not_found(e.to_string())
            }
            SessionServiceError::IllegalTransition { .. } => Self::illegal_transition(e.to_string()),
            SessionServiceError::Unauthorized(_) => Self::unauthorized(e.to_string()),
            SessionServiceError::Validation(_) => Self::validation_error(e.to_string()),
            SessionServiceError::Internal(inner) => {
                tracing::error!("Session service failure: {:#}", inner);
                Self::internal_error("Internal server error")
            }
        }
    }
}

impl From<ReviewServiceError> for ApiError {
    fn from(e: ReviewServiceError) -> Self {
        match &e {
            ReviewServiceError::SessionNotFound(_) => Self::not_found(e.to_string()),
            ReviewServiceError::SessionNotEnded(_) => Self::illegal_transition(e.to_string()),
            ReviewServiceError::Unauthorized(_) => Self::unauthorized(e.to_string()),
            ReviewServiceError::Validation(_) => Self::validation_error(e.to_string()),
            ReviewServiceError::TransientConflict => Self::new("CONFLICT", e.to_string()),
            ReviewServiceError::Internal(inner) => {
                tracing::error!("Review service failure: {:#}", inner);
                Self::internal_error("Internal server error")
            }
        }
    }
}

impl From<ChatServiceError> for ApiError {
    fn from(e: ChatServiceError) -> Self {
        match &e {
            ChatServiceError::SessionNotFound(_) => Self::not_found(e.to_string()),
            ChatServiceError::SessionNotActive(_) => Self::illegal_transition(e.to_string()),
            ChatServiceError::Unauthorized(_) => Self::unauthorized(e.to_string()),
            ChatServiceError::Validation(_) => Self::validation_error(e.to_string()),
            ChatServiceError::Internal(inner) => {
                tracing::error!("Chat service failure: {:#}", inner);
                Self::internal_error("Internal server error")
            }
        }
    }
}

impl From<RoomTokenError> for ApiError {
    fn from(e: RoomTokenError) -> Self {
        match &e {
            RoomTokenError::Unconfigured => Self::new("UNCONFIGURED", e.to_string()),
            RoomTokenError::SessionNotFound(_) => Self::not_found(e.to_string()),
            RoomTokenError::Unauthorized => Self::unauthorized(e.to_string()),
            RoomTokenError::SessionNotActive { .. } => Self::illegal_transition(e.to_string()),
            RoomTokenError::Internal(inner) => {
                tracing::error!("Room token failure: {:#}", inner);
                Self::internal_error("Internal server error")
            }
        }
    }
}

impl From<AstrologerServiceError> for ApiError {
    fn from(e: AstrologerServiceError) -> Self {
        match &e {
            AstrologerServiceError::NotFound(_) => Self::not_found(e.to_string()),
            AstrologerServiceError::Validation(_) => Self::validation_error(e.to_string()),
            AstrologerServiceError::Internal(inner) => {
                tracing::error!("Astrologer service failure: {:#}", inner);
                Self::internal_error("Internal server error")
            }
        }
    }
}
