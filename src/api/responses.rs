//! Shared API response types
//!
//! Small envelope structs so list and detail endpoints stay consistent.

use serde::Serialize;

use crate::models::{Astrologer, CallSession, ChatMessage, Review};

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session: CallSession,
}

#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<CallSession>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: ChatMessage,
}

#[derive(Debug, Serialize)]
pub struct MessageListResponse {
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct AstrologerResponse {
    pub astrologer: Astrologer,
}

#[derive(Debug, Serialize)]
pub struct AstrologerListResponse {
    pub astrologers: Vec<Astrologer>,
}

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub review: Review,
}

#[derive(Debug, Serialize)]
pub struct PaginatedReviewsResponse {
    pub reviews: Vec<Review>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}
