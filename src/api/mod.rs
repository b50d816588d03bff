//! API layer - HTTP handlers and routing
//!
//! All endpoints live under `/api/v1`:
//! - Call session lifecycle (create, accept, decline, cancel, end)
//! - Session change feed (SSE)
//! - In-call chat
//! - Room-access tokens
//! - Astrologer directory, presence and reviews

pub mod astrologers;
pub mod chat;
pub mod common;
pub mod middleware;
pub mod responses;
pub mod reviews;
pub mod sessions;
pub mod token;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use middleware::{ApiError, AppState};

/// Build the main API router
pub fn build_api_router() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(sessions::create_session))
        .route("/sessions", get(sessions::list_sessions))
        .route("/sessions/{id}", get(sessions::get_session))
        .route("/sessions/{id}/accept", post(sessions::accept_session))
        .route("/sessions/{id}/decline", post(sessions::decline_session))
        .route("/sessions/{id}/cancel", post(sessions::cancel_session))
        .route("/sessions/{id}/end", post(sessions::end_session))
        .route("/sessions/{id}/events", get(sessions::session_events))
        .route("/sessions/{id}/messages", post(chat::post_message))
        .route("/sessions/{id}/messages", get(chat::list_messages))
        .route("/token", post(token::create_token))
        .route("/astrologers", post(astrologers::register_astrologer))
        .route("/astrologers", get(astrologers::list_astrologers))
        .route("/astrologers/{id}", get(astrologers::get_astrologer))
        .route("/astrologers/{id}/presence", put(astrologers::set_presence))
        .route("/astrologers/{id}/bio", put(astrologers::set_bio))
        .route("/astrologers/{id}/reviews", get(astrologers::list_reviews))
        .route("/reviews", post(reviews::submit_review))
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    let cors = build_cors(cors_origin);

    Router::new()
        .nest("/api/v1", build_api_router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn build_cors(cors_origin: &str) -> CorsLayer {
    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::CONTENT_TYPE]);
    if let Ok(origin) = cors_origin.parse::<HeaderValue>() {
        cors = cors.allow_origin(origin);
    }
    cors
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::{json, Value};

    use crate::config::LiveKitConfig;
    use crate::db::repositories::{
        SqlxAstrologerRepository, SqlxCallSessionRepository, SqlxChatMessageRepository,
        SqlxReviewRepository,
    };
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::services::{
        AstrologerService, ChatService, ReviewService, RoomTokenService, SessionNotifier,
        SessionService,
    };

    async fn test_server() -> (TestServer, DynDatabasePool) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let session_repo = SqlxCallSessionRepository::boxed(pool.clone());
        let astro_repo = SqlxAstrologerRepository::boxed(pool.clone());
        let livekit = LiveKitConfig {
            api_key: Some("APItest".to_string()),
            api_secret: Some("test-signing-secret".to_string()),
            ws_url: Some("wss://test.livekit.cloud".to_string()),
        };

        let state = AppState {
            sessions: Arc::new(SessionService::new(
                session_repo.clone(),
                astro_repo.clone(),
                Arc::new(SessionNotifier::new()),
            )),
            chat: Arc::new(ChatService::new(
                SqlxChatMessageRepository::boxed(pool.clone()),
                session_repo.clone(),
            )),
            reviews: Arc::new(ReviewService::new(
                SqlxReviewRepository::boxed(pool.clone()),
                session_repo.clone(),
            )),
            astrologers: Arc::new(AstrologerService::new(astro_repo)),
            room_tokens: Arc::new(RoomTokenService::new(livekit, session_repo)),
        };

        let server = TestServer::new(build_router(state, "http://localhost:3000"))
            .expect("Failed to build test server");
        (server, pool)
    }

    async fn register_astrologer(server: &TestServer, id: &str, name: &str) {
        let response = server
            .post("/api/v1/astrologers")
            .json(&json!({
                "id": id,
                "name": name,
                "bio": "Vedic astrology",
                "languages": ["Hindi", "English"],
                "specialties": ["Kundali"],
                "rate_per_minute": 15
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
    }

    async fn create_session(server: &TestServer) -> String {
        let response = server
            .post("/api/v1/sessions")
            .json(&json!({
                "user_id": "u1",
                "user_name": "Asha",
                "astro_id": "a1",
                "astro_name": "Pandit Vikram"
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();
        body["session"]["id"].as_str().expect("session id").to_string()
    }

    async fn backdate_started_at(pool: &DynDatabasePool, session_id: &str, seconds: i64) {
        let started_at = chrono::Utc::now().timestamp_millis() - seconds * 1000;
        sqlx::query("UPDATE call_sessions SET started_at = ? WHERE id = ?")
            .bind(started_at)
            .bind(session_id)
            .execute(pool.as_sqlite().unwrap())
            .await
            .expect("backdate");
    }

    #[tokio::test]
    async fn test_full_call_flow_with_duration() {
        let (server, pool) = test_server().await;
        register_astrologer(&server, "a1", "Pandit Vikram").await;
        let id = create_session(&server).await;

        let response = server
            .post(&format!("/api/v1/sessions/{}/accept", id))
            .json(&json!({"identity": "a1"}))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["session"]["status"], "active");
        assert!(body["session"]["started_at"].is_i64());

        // Simulate a call that ran for 125 seconds.
        backdate_started_at(&pool, &id, 125).await;

        let response = server
            .post(&format!("/api/v1/sessions/{}/end", id))
            .json(&json!({"identity": "u1"}))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["session"]["status"], "ended");
        assert_eq!(body["session"]["duration_seconds"], 125);

        // The astrologer's call counter moved.
        let response = server.get("/api/v1/astrologers/a1").await;
        let body: Value = response.json();
        assert_eq!(body["astrologer"]["total_calls"], 1);
    }

    #[tokio::test]
    async fn test_declined_session_blocks_accept_and_token() {
        let (server, _pool) = test_server().await;
        register_astrologer(&server, "a1", "Pandit Vikram").await;
        let id = create_session(&server).await;

        let response = server
            .post(&format!("/api/v1/sessions/{}/decline", id))
            .json(&json!({"identity": "a1"}))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["session"]["status"], "declined");

        let response = server
            .post(&format!("/api/v1/sessions/{}/accept", id))
            .json(&json!({"identity": "a1"}))
            .await;
        response.assert_status(StatusCode::CONFLICT);
        let body: Value = response.json();
        assert_eq!(body["error"]["code"], "ILLEGAL_TRANSITION");

        let response = server
            .post("/api/v1/token")
            .json(&json!({"session_id": id, "identity": "u1"}))
            .await;
        response.assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_token_for_active_session() {
        let (server, _pool) = test_server().await;
        register_astrologer(&server, "a1", "Pandit Vikram").await;
        let id = create_session(&server).await;

        // No token before accept.
        let response = server
            .post("/api/v1/token")
            .json(&json!({"session_id": id, "identity": "u1"}))
            .await;
        response.assert_status(StatusCode::CONFLICT);

        server
            .post(&format!("/api/v1/sessions/{}/accept", id))
            .json(&json!({"identity": "a1"}))
            .await
            .assert_status_ok();

        let response = server
            .post("/api/v1/token")
            .json(&json!({"session_id": id, "identity": "u1"}))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["ws_url"], "wss://test.livekit.cloud");
        assert_eq!(body["token"].as_str().unwrap().split('.').count(), 3);

        // Outsiders are refused.
        let response = server
            .post("/api/v1/token")
            .json(&json!({"session_id": id, "identity": "stranger"}))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_chat_requires_active_session() {
        let (server, _pool) = test_server().await;
        register_astrologer(&server, "a1", "Pandit Vikram").await;
        let id = create_session(&server).await;

        let response = server
            .post(&format!("/api/v1/sessions/{}/messages", id))
            .json(&json!({"sender_id": "u1", "sender_name": "Asha", "text": "hello"}))
            .await;
        response.assert_status(StatusCode::CONFLICT);

        server
            .post(&format!("/api/v1/sessions/{}/accept", id))
            .json(&json!({"identity": "a1"}))
            .await
            .assert_status_ok();

        let response = server
            .post(&format!("/api/v1/sessions/{}/messages", id))
            .json(&json!({"sender_id": "u1", "sender_name": "Asha", "text": "hello"}))
            .await;
        response.assert_status(StatusCode::CREATED);

        let response = server
            .get(&format!("/api/v1/sessions/{}/messages", id))
            .add_query_param("identity", "a1")
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_review_flow_updates_aggregate() {
        let (server, pool) = test_server().await;
        register_astrologer(&server, "a1", "Pandit Vikram").await;
        let id = create_session(&server).await;

        server
            .post(&format!("/api/v1/sessions/{}/accept", id))
            .json(&json!({"identity": "a1"}))
            .await
            .assert_status_ok();
        backdate_started_at(&pool, &id, 60).await;
        server
            .post(&format!("/api/v1/sessions/{}/end", id))
            .json(&json!({"identity": "a1"}))
            .await
            .assert_status_ok();

        let response = server
            .post("/api/v1/reviews")
            .json(&json!({
                "session_id": id,
                "identity": "u1",
                "user_name": "Asha",
                "rating": 5,
                "comment": "Very insightful"
            }))
            .await;
        response.assert_status(StatusCode::CREATED);

        let response = server.get("/api/v1/astrologers/a1").await;
        let body: Value = response.json();
        assert_eq!(body["astrologer"]["rating"], 5.0);
        assert_eq!(body["astrologer"]["total_reviews"], 1);

        let response = server.get("/api/v1/astrologers/a1/reviews").await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["total"], 1);
        assert_eq!(body["reviews"][0]["rating"], 5);
    }

    #[tokio::test]
    async fn test_session_listing_by_participant() {
        let (server, _pool) = test_server().await;
        register_astrologer(&server, "a1", "Pandit Vikram").await;
        let id = create_session(&server).await;

        let response = server
            .get("/api/v1/sessions")
            .add_query_param("participant", "a1")
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["sessions"][0]["id"], id.as_str());

        // Missing participant is a validation error.
        let response = server.get("/api/v1/sessions").await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_astrologer_rejected_on_create() {
        let (server, _pool) = test_server().await;

        let response = server
            .post("/api/v1/sessions")
            .json(&json!({
                "user_id": "u1",
                "user_name": "Asha",
                "astro_id": "ghost",
                "astro_name": "Nobody"
            }))
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
        let body: Value = response.json();
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_presence_toggle() {
        let (server, _pool) = test_server().await;
        register_astrologer(&server, "a1", "Pandit Vikram").await;

        let response = server
            .put("/api/v1/astrologers/a1/presence")
            .json(&json!({"is_online": true}))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["astrologer"]["is_online"], true);

        let response = server
            .get("/api/v1/astrologers")
            .add_query_param("online", "true")
            .await;
        let body: Value = response.json();
        assert_eq!(body["astrologers"].as_array().unwrap().len(), 1);
    }
}
