//! Astrologer profile model

use serde::{Deserialize, Serialize};

/// Astrologer profile entity
///
/// `rating` is a running average rounded to one decimal place and
/// `total_reviews` its sample count; both are mutated only by the review
/// aggregation transaction. `total_calls` is bumped when a session ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Astrologer {
    pub id: String,
    pub name: String,
    pub bio: String,
    pub photo_url: String,
    pub languages: Vec<String>,
    pub specialties: Vec<String>,
    pub is_online: bool,
    pub rating: f64,
    pub total_reviews: i64,
    pub total_calls: i64,
    pub rate_per_minute: i64,
    pub created_at: i64,
}

/// Input for registering an astrologer profile
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAstrologerInput {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub photo_url: String,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub specialties: Vec<String>,
    #[serde(default)]
    pub rate_per_minute: i64,
}
