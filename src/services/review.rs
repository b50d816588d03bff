//! Review service
//!
//! Validates review submissions against the originating session and hands
//! them to the repository's transactional aggregate update. Transient lock
//! conflicts are retried a few times with a short backoff before giving up.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::db::repositories::{
    is_transient_conflict, CallSessionRepository, ReviewRepository,
};
use crate::models::{CreateReviewInput, Review, SessionStatus};

const MAX_COMMENT_LENGTH: usize = 2000;
const AGGREGATE_RETRIES: u32 = 3;

/// Review service errors
#[derive(Debug, thiserror::Error)]
pub enum ReviewServiceError {
    /// Session id does not exist
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Only ended sessions can be reviewed
    #[error("Session {0} has not ended")]
    SessionNotEnded(String),

    /// The reviewer must be the session's client
    #[error("{0}")]
    Unauthorized(String),

    /// Input validation failed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Aggregate update kept conflicting after retries
    #[error("Review could not be recorded, please retry")]
    TransientConflict,

    /// Database or other internal failure
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Review submission and listing
pub struct ReviewService {
    reviews: Arc<dyn ReviewRepository>,
    sessions: Arc<dyn CallSessionRepository>,
}

impl ReviewService {
    pub fn new(
        reviews: Arc<dyn ReviewRepository>,
        sessions: Arc<dyn CallSessionRepository>,
    ) -> Self {
        Self { reviews, sessions }
    }

    /// Submit a review for an ended session.
    ///
    /// The rating folds into the astrologer's aggregate inside one
    /// transaction. Duplicate reviews for the same session are accepted;
    /// each one counts.
    pub async fn submit(
        &self,
        input: CreateReviewInput,
        actor: &str,
    ) -> Result<Review, ReviewServiceError> {
        if !(1..=5).contains(&input.rating) {
            return Err(ReviewServiceError::Validation(
                "Rating must be between 1 and 5".to_string(),
            ));
        }
        if input.comment.len() > MAX_COMMENT_LENGTH {
            return Err(ReviewServiceError::Validation(format!(
                "Comment exceeds {} characters",
                MAX_COMMENT_LENGTH
            )));
        }

        let session = self
            .sessions
            .get_by_id(&input.session_id)
            .await?
            .ok_or_else(|| ReviewServiceError::SessionNotFound(input.session_id.clone()))?;

        if actor != session.user_id {
            return Err(ReviewServiceError::Unauthorized(
                "Only the session's client may leave a review".to_string(),
            ));
        }
        if session.status != SessionStatus::Ended {
            return Err(ReviewServiceError::SessionNotEnded(session.id));
        }

        let review = Review {
            id: Uuid::new_v4().to_string(),
            session_id: session.id,
            user_id: session.user_id,
            user_name: input.user_name,
            astro_id: session.astro_id,
            rating: input.rating,
            comment: input.comment,
            created_at: Utc::now().timestamp_millis(),
        };

        let mut attempt = 0;
        loop {
            match self.reviews.create_with_aggregate(&review).await {
                Ok(()) => break,
                Err(e) if is_transient_conflict(&e) && attempt < AGGREGATE_RETRIES => {
                    attempt += 1;
                    tracing::debug!(
                        review_id = %review.id,
                        attempt,
                        "Retrying review aggregate after conflict"
                    );
                    tokio::time::sleep(Duration::from_millis(20 * u64::from(attempt))).await;
                }
                Err(e) if is_transient_conflict(&e) => {
                    return Err(ReviewServiceError::TransientConflict);
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::info!(
            review_id = %review.id,
            astro_id = %review.astro_id,
            rating = review.rating,
            "Review recorded"
        );
        Ok(review)
    }

    /// Reviews for an astrologer, newest first, with the total count.
    pub async fn list_for_astro(
        &self,
        astro_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Review>, i64), ReviewServiceError> {
        let reviews = self.reviews.list_by_astro(astro_id, limit, offset).await?;
        let total = self.reviews.count_by_astro(astro_id).await?;
        Ok((reviews, total))
    }
}
