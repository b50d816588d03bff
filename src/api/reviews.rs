//! Review submission API endpoint

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::ReviewResponse;
use crate::models::CreateReviewInput;

#[derive(Debug, Deserialize)]
pub struct SubmitReviewRequest {
    pub session_id: String,
    pub identity: String,
    pub user_name: String,
    pub rating: i64,
    #[serde(default)]
    pub comment: String,
}

/// Submit a review for an ended session
pub async fn submit_review(
    State(state): State<AppState>,
    Json(req): Json<SubmitReviewRequest>,
) -> Result<(StatusCode, Json<ReviewResponse>), ApiError> {
    let input = CreateReviewInput {
        session_id: req.session_id,
        user_name: req.user_name,
        rating: req.rating,
        comment: req.comment,
    };
    let review = state.reviews.submit(input, &req.identity).await?;
    Ok((StatusCode::CREATED, Json(ReviewResponse { review })))
}
