//! In-call chat service
//!
//! Append-only messages scoped to a session. Posting is limited to the
//! session's two participants while the call is active; history stays
//! readable to participants after the call ends.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::db::repositories::{CallSessionRepository, ChatMessageRepository};
use crate::models::{ChatMessage, CreateChatMessageInput, SessionStatus};

const MAX_TEXT_LENGTH: usize = 4000;

/// Chat service errors
#[derive(Debug, thiserror::Error)]
pub enum ChatServiceError {
    /// Session id does not exist
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Messages may only be posted while the call is active
    #[error("Session {0} is not active")]
    SessionNotActive(String),

    /// Sender is not a participant
    #[error("{0}")]
    Unauthorized(String),

    /// Input validation failed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Database or other internal failure
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Session-scoped chat
pub struct ChatService {
    messages: Arc<dyn ChatMessageRepository>,
    sessions: Arc<dyn CallSessionRepository>,
}

impl ChatService {
    pub fn new(
        messages: Arc<dyn ChatMessageRepository>,
        sessions: Arc<dyn CallSessionRepository>,
    ) -> Self {
        Self { messages, sessions }
    }

    /// Post a message into an active session.
    pub async fn post(
        &self,
        session_id: &str,
        input: CreateChatMessageInput,
    ) -> Result<ChatMessage, ChatServiceError> {
        let text = input.text.trim();
        if text.is_empty() {
            return Err(ChatServiceError::Validation(
                "Message text is required".to_string(),
            ));
        }
        if text.len() > MAX_TEXT_LENGTH {
            return Err(ChatServiceError::Validation(format!(
                "Message exceeds {} characters",
                MAX_TEXT_LENGTH
            )));
        }

        let session = self
            .sessions
            .get_by_id(session_id)
            .await?
            .ok_or_else(|| ChatServiceError::SessionNotFound(session_id.to_string()))?;

        if !session.is_participant(&input.sender_id) {
            return Err(ChatServiceError::Unauthorized(
                "Not a participant in this session".to_string(),
            ));
        }
        if session.status != SessionStatus::Active {
            return Err(ChatServiceError::SessionNotActive(session.id));
        }

        let message = ChatMessage {
            id: Uuid::new_v4().to_string(),
            session_id: session.id,
            sender_id: input.sender_id,
            sender_name: input.sender_name,
            text: text.to_string(),
            created_at: Utc::now().timestamp_millis(),
        };
        self.messages.create(&message).await?;
        Ok(message)
    }

    /// Message history for a participant, in send order.
    pub async fn history(
        &self,
        session_id: &str,
        actor: &str,
    ) -> Result<Vec<ChatMessage>, ChatServiceError> {
        let session = self
            .sessions
            .get_by_id(session_id)
            .await?
            .ok_or_else(|| ChatServiceError::SessionNotFound(session_id.to_string()))?;

        if !session.is_participant(actor) {
            return Err(ChatServiceError::Unauthorized(
                "Not a participant in this session".to_string(),
            ));
        }
        Ok(self.messages.list_by_session(&session.id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxCallSessionRepository, SqlxChatMessageRepository};
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::CallSession;

    async fn setup() -> (DynDatabasePool, ChatService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let service = ChatService::new(
            SqlxChatMessageRepository::boxed(pool.clone()),
            SqlxCallSessionRepository::boxed(pool.clone()),
        );
        (pool, service)
    }

    async fn seed_session(pool: &DynDatabasePool, id: &str, status: SessionStatus) {
        let repo = SqlxCallSessionRepository::new(pool.clone());
        let session = CallSession {
            id: id.to_string(),
            user_id: "u1".to_string(),
            user_name: "Asha".to_string(),
            astro_id: "a1".to_string(),
            astro_name: "Sunita Rao".to_string(),
            status: SessionStatus::Pending,
            started_at: None,
            ended_at: None,
            duration_seconds: 0,
            room_name: format!("room_u1_a1_{}", id),
            created_at: 0,
        };
        repo.create(&session).await.expect("seed session");
        if status == SessionStatus::Active {
            repo.mark_active(id, 1_000).await.unwrap();
        }
    }

    fn input(sender_id: &str, text: &str) -> CreateChatMessageInput {
        CreateChatMessageInput {
            sender_id: sender_id.to_string(),
            sender_name: format!("sender {}", sender_id),
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_post_and_read_history() {
        let (pool, service) = setup().await;
        seed_session(&pool, "s1", SessionStatus::Active).await;

        service.post("s1", input("u1", "hello")).await.unwrap();
        service.post("s1", input("a1", "namaste")).await.unwrap();

        let history = service.history("s1", "u1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].text, "hello");
        assert_eq!(history[1].text, "namaste");
    }

    #[tokio::test]
    async fn test_post_requires_active_session() {
        let (pool, service) = setup().await;
        seed_session(&pool, "s1", SessionStatus::Pending).await;

        let err = service.post("s1", input("u1", "early")).await.unwrap_err();
        assert!(matches!(err, ChatServiceError::SessionNotActive(_)));
    }

    #[tokio::test]
    async fn test_post_rejects_outsider() {
        let (pool, service) = setup().await;
        seed_session(&pool, "s1", SessionStatus::Active).await;

        let err = service.post("s1", input("stranger", "hi")).await.unwrap_err();
        assert!(matches!(err, ChatServiceError::Unauthorized(_)));

        let err = service.history("s1", "stranger").await.unwrap_err();
        assert!(matches!(err, ChatServiceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_post_rejects_blank_text() {
        let (pool, service) = setup().await;
        seed_session(&pool, "s1", SessionStatus::Active).await;

        let err = service.post("s1", input("u1", "   ")).await.unwrap_err();
        assert!(matches!(err, ChatServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let (_pool, service) = setup().await;
        let err = service.post("ghost", input("u1", "hi")).await.unwrap_err();
        assert!(matches!(err, ChatServiceError::SessionNotFound(_)));
    }
}
