//! Room-access token issuance
//!
//! Mints LiveKit-compatible access tokens: HS256 JWTs whose `video` claim
//! grants join/publish/subscribe on the session's room. A credential is
//! only ever issued to one of the session's two participants, and only
//! while the session is active.

use std::sync::Arc;

use chrono::Utc;
use data_encoding::BASE64URL_NOPAD;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

use crate::config::LiveKitConfig;
use crate::db::repositories::CallSessionRepository;
use crate::models::SessionStatus;

/// Token lifetime, matching the LiveKit default used by the frontend.
const TOKEN_TTL_SECONDS: i64 = 2 * 60 * 60;

/// Room token service errors
#[derive(Debug, thiserror::Error)]
pub enum RoomTokenError {
    /// LiveKit credentials missing from config
    #[error("LiveKit is not configured")]
    Unconfigured,

    /// Session id does not exist
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Identity is not a participant of the session
    #[error("Not a participant in this session")]
    Unauthorized,

    /// Tokens are only issued for active sessions
    #[error("Session {id} is {status}, token refused")]
    SessionNotActive { id: String, status: SessionStatus },

    /// Signing or database failure
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Issued credential plus the endpoint to connect it to
#[derive(Debug, Clone, Serialize)]
pub struct RoomToken {
    pub token: String,
    pub ws_url: String,
}

#[derive(Serialize)]
struct JwtHeader {
    alg: &'static str,
    typ: &'static str,
}

#[derive(Serialize)]
struct VideoGrant<'a> {
    room: &'a str,
    #[serde(rename = "roomJoin")]
    room_join: bool,
    #[serde(rename = "canPublish")]
    can_publish: bool,
    #[serde(rename = "canSubscribe")]
    can_subscribe: bool,
    #[serde(rename = "canPublishData")]
    can_publish_data: bool,
}

#[derive(Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    sub: &'a str,
    nbf: i64,
    exp: i64,
    video: VideoGrant<'a>,
}

/// LiveKit room-token issuance
pub struct RoomTokenService {
    livekit: LiveKitConfig,
    sessions: Arc<dyn CallSessionRepository>,
}

impl RoomTokenService {
    pub fn new(livekit: LiveKitConfig, sessions: Arc<dyn CallSessionRepository>) -> Self {
        Self { livekit, sessions }
    }

    /// Issue a token for `identity` to join the session's room.
    pub async fn issue(
        &self,
        session_id: &str,
        identity: &str,
    ) -> Result<RoomToken, RoomTokenError> {
        let creds = self
            .livekit
            .credentials()
            .ok_or(RoomTokenError::Unconfigured)?;

        let session = self
            .sessions
            .get_by_id(session_id)
            .await
            .map_err(RoomTokenError::Internal)?
            .ok_or_else(|| RoomTokenError::SessionNotFound(session_id.to_string()))?;

        if !session.is_participant(identity) {
            return Err(RoomTokenError::Unauthorized);
        }
        if session.status != SessionStatus::Active {
            return Err(RoomTokenError::SessionNotActive {
                id: session.id,
                status: session.status,
            });
        }

        let now = Utc::now().timestamp();
        let claims = JwtClaims {
            iss: &creds.api_key,
            sub: identity,
            nbf: now,
            exp: now + TOKEN_TTL_SECONDS,
            video: VideoGrant {
                room: &session.room_name,
                room_join: true,
                can_publish: true,
                can_subscribe: true,
                can_publish_data: true,
            },
        };

        let token = sign_hs256(&claims, creds.api_secret.as_bytes())?;
        tracing::info!(session_id = %session.id, identity, "Room token issued");
        Ok(RoomToken {
            token,
            ws_url: creds.ws_url,
        })
    }
}

fn sign_hs256<T: Serialize>(claims: &T, secret: &[u8]) -> Result<String, RoomTokenError> {
    let header = serde_json::to_vec(&JwtHeader {
        alg: "HS256",
        typ: "JWT",
    })
    .map_err(|e| RoomTokenError::Internal(e.into()))?;
    let payload = serde_json::to_vec(claims).map_err(|e| RoomTokenError::Internal(e.into()))?;

    let signing_input = format!(
        "{}.{}",
        BASE64URL_NOPAD.encode(&header),
        BASE64URL_NOPAD.encode(&payload)
    );

    let mut mac = Hmac::<Sha256>::new_from_slice(secret)
        .map_err(|e| RoomTokenError::Internal(anyhow::anyhow!("HMAC key error: {}", e)))?;
    mac.update(signing_input.as_bytes());
    let signature = mac.finalize().into_bytes();

    Ok(format!(
        "{}.{}",
        signing_input,
        BASE64URL_NOPAD.encode(&signature)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxCallSessionRepository;
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::CallSession;

    fn configured() -> LiveKitConfig {
        LiveKitConfig {
            api_key: Some("APIxyz".to_string()),
            api_secret: Some("secret-signing-key".to_string()),
            ws_url: Some("wss://astro.livekit.cloud".to_string()),
        }
    }

    async fn setup(livekit: LiveKitConfig) -> (DynDatabasePool, RoomTokenService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let service = RoomTokenService::new(livekit, SqlxCallSessionRepository::boxed(pool.clone()));
        (pool, service)
    }

    async fn seed_session(pool: &DynDatabasePool, id: &str, status: SessionStatus) {
        let repo = SqlxCallSessionRepository::new(pool.clone());
        let session = CallSession {
            id: id.to_string(),
            user_id: "u1".to_string(),
            user_name: "Asha".to_string(),
            astro_id: "a1".to_string(),
            astro_name: "Pandit Vikram".to_string(),
            status: SessionStatus::Pending,
            started_at: None,
            ended_at: None,
            duration_seconds: 0,
            room_name: format!("room_u1_a1_{}", id),
            created_at: 0,
        };
        repo.create(&session).await.expect("seed session");
        match status {
            SessionStatus::Pending => {}
            SessionStatus::Active => {
                repo.mark_active(id, 1_000).await.unwrap();
            }
            SessionStatus::Ended => {
                repo.mark_active(id, 1_000).await.unwrap();
                repo.mark_ended(id, 61_000, 60).await.unwrap();
            }
            SessionStatus::Declined => {
                repo.mark_declined(id).await.unwrap();
            }
        }
    }

    fn decode_claims(token: &str) -> serde_json::Value {
        let payload = token.split('.').nth(1).expect("payload segment");
        let bytes = BASE64URL_NOPAD.decode(payload.as_bytes()).expect("base64url");
        serde_json::from_slice(&bytes).expect("claims json")
    }

    #[tokio::test]
    async fn test_issues_token_for_active_participant() {
        let (pool, service) = setup(configured()).await;
        seed_session(&pool, "s1", SessionStatus::Active).await;

        let issued = service.issue("s1", "u1").await.unwrap();
        assert_eq!(issued.ws_url, "wss://astro.livekit.cloud");
        assert_eq!(issued.token.split('.').count(), 3);

        let claims = decode_claims(&issued.token);
        assert_eq!(claims["iss"], "APIxyz");
        assert_eq!(claims["sub"], "u1");
        assert_eq!(claims["video"]["room"], "room_u1_a1_s1");
        assert_eq!(claims["video"]["roomJoin"], true);
        assert_eq!(claims["video"]["canPublishData"], true);
        let ttl = claims["exp"].as_i64().unwrap() - claims["nbf"].as_i64().unwrap();
        assert_eq!(ttl, TOKEN_TTL_SECONDS);
    }

    #[tokio::test]
    async fn test_both_participants_can_get_tokens() {
        let (pool, service) = setup(configured()).await;
        seed_session(&pool, "s1", SessionStatus::Active).await;

        assert!(service.issue("s1", "u1").await.is_ok());
        assert!(service.issue("s1", "a1").await.is_ok());
    }

    #[tokio::test]
    async fn test_rejects_outsider() {
        let (pool, service) = setup(configured()).await;
        seed_session(&pool, "s1", SessionStatus::Active).await;

        let err = service.issue("s1", "stranger").await.unwrap_err();
        assert!(matches!(err, RoomTokenError::Unauthorized));
    }

    #[tokio::test]
    async fn test_rejects_inactive_session() {
        let (pool, service) = setup(configured()).await;
        seed_session(&pool, "pending", SessionStatus::Pending).await;
        seed_session(&pool, "declined", SessionStatus::Declined).await;
        seed_session(&pool, "ended", SessionStatus::Ended).await;

        for id in ["pending", "declined", "ended"] {
            let err = service.issue(id, "u1").await.unwrap_err();
            assert!(
                matches!(err, RoomTokenError::SessionNotActive { .. }),
                "expected refusal for {}",
                id
            );
        }
    }

    #[tokio::test]
    async fn test_unconfigured() {
        let (pool, service) = setup(LiveKitConfig::default()).await;
        seed_session(&pool, "s1", SessionStatus::Active).await;

        let err = service.issue("s1", "u1").await.unwrap_err();
        assert!(matches!(err, RoomTokenError::Unconfigured));
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let (_pool, service) = setup(configured()).await;
        let err = service.issue("ghost", "u1").await.unwrap_err();
        assert!(matches!(err, RoomTokenError::SessionNotFound(_)));
    }

    #[test]
    fn test_signature_verifies() {
        let claims = JwtClaims {
            iss: "APIxyz",
            sub: "u1",
            nbf: 1_000,
            exp: 8_200,
            video: VideoGrant {
                room: "room_u1_a1_x",
                room_join: true,
                can_publish: true,
                can_subscribe: true,
                can_publish_data: true,
            },
        };
        let token = sign_hs256(&claims, b"secret-signing-key").unwrap();

        let mut parts = token.rsplitn(2, '.');
        let signature = parts.next().unwrap();
        let signing_input = parts.next().unwrap();

        let mut mac = Hmac::<Sha256>::new_from_slice(b"secret-signing-key").unwrap();
        mac.update(signing_input.as_bytes());
        let expected = BASE64URL_NOPAD.encode(&mac.finalize().into_bytes());
        assert_eq!(signature, expected);
    }
}
