//! Astrologer directory API endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::api::common::PaginationQuery;
use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::{
    AstrologerListResponse, AstrologerResponse, PaginatedReviewsResponse,
};
use crate::models::CreateAstrologerInput;

#[derive(Debug, Deserialize)]
pub struct DirectoryQuery {
    #[serde(default)]
    pub online: bool,
}

#[derive(Debug, Deserialize)]
pub struct PresenceBody {
    pub is_online: bool,
}

#[derive(Debug, Deserialize)]
pub struct BioBody {
    pub bio: String,
}

/// Register or update an astrologer profile
pub async fn register_astrologer(
    State(state): State<AppState>,
    Json(input): Json<CreateAstrologerInput>,
) -> Result<(StatusCode, Json<AstrologerResponse>), ApiError> {
    let astrologer = state.astrologers.register(input).await?;
    Ok((StatusCode::CREATED, Json(AstrologerResponse { astrologer })))
}

/// Directory listing, online first
pub async fn list_astrologers(
    State(state): State<AppState>,
    Query(query): Query<DirectoryQuery>,
) -> Result<Json<AstrologerListResponse>, ApiError> {
    let listing = state.astrologers.list(query.online).await?;
    Ok(Json(AstrologerListResponse {
        astrologers: listing.as_ref().clone(),
    }))
}

/// Get one astrologer profile
pub async fn get_astrologer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AstrologerResponse>, ApiError> {
    let astrologer = state.astrologers.get(&id).await?;
    Ok(Json(AstrologerResponse { astrologer }))
}

/// Set online/offline presence
pub async fn set_presence(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<PresenceBody>,
) -> Result<Json<AstrologerResponse>, ApiError> {
    let astrologer = state.astrologers.set_online(&id, body.is_online).await?;
    Ok(Json(AstrologerResponse { astrologer }))
}

/// Update the profile bio
pub async fn set_bio(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<BioBody>,
) -> Result<Json<AstrologerResponse>, ApiError> {
    let astrologer = state.astrologers.set_bio(&id, &body.bio).await?;
    Ok(Json(AstrologerResponse { astrologer }))
}

/// Paginated reviews for an astrologer, newest first
pub async fn list_reviews(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<PaginatedReviewsResponse>, ApiError> {
    // 404 for unknown astrologers rather than an empty page.
    state.astrologers.get(&id).await?;

    let (limit, offset) = pagination.limit_offset();
    let (reviews, total) = state.reviews.list_for_astro(&id, limit, offset).await?;
    Ok(Json(PaginatedReviewsResponse {
        reviews,
        total,
        page: pagination.page.max(1),
        per_page: limit,
    }))
}
