//! Review model

use serde::{Deserialize, Serialize};

/// A client's review of an ended session, 1-5 stars plus free text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub session_id: String,
    pub user_id: String,
    pub user_name: String,
    pub astro_id: String,
    pub rating: i64,
    pub comment: String,
    pub created_at: i64,
}

/// Input for submitting a review. The reviewed astrologer and the
/// reviewing client are taken from the session itself.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateReviewInput {
    pub session_id: String,
    pub user_name: String,
    pub rating: i64,
    #[serde(default)]
    pub comment: String,
}
