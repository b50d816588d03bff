//! Chat message repository
//!
//! Append-only storage for in-call chat. No update or delete paths exist.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::ChatMessage;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

/// Chat message repository trait
#[async_trait]
pub trait ChatMessageRepository: Send + Sync {
    /// Append a message
    async fn create(&self, message: &ChatMessage) -> Result<()>;

    /// Messages for a session in send order
    async fn list_by_session(&self, session_id: &str) -> Result<Vec<ChatMessage>>;
}

/// SQLx-based chat message repository for SQLite and MySQL
pub struct SqlxChatMessageRepository {
    pool: DynDatabasePool,
}

impl SqlxChatMessageRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ChatMessageRepository> {
        Arc::new(Self::new(pool))
    }
}

const INSERT_SQL: &str = r#"
    INSERT INTO chat_messages (id, session_id, sender_id, sender_name, text, created_at)
    VALUES (?, ?, ?, ?, ?, ?)
"#;

// seq is assigned by the database at insert, so it breaks created_at ties
// in send order.
const LIST_SQL: &str = r#"
    SELECT id, session_id, sender_id, sender_name, text, created_at
    FROM chat_messages
    WHERE session_id = ?
    ORDER BY created_at ASC, seq ASC
"#;

#[async_trait]
impl ChatMessageRepository for SqlxChatMessageRepository {
    async fn create(&self, message: &ChatMessage) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(INSERT_SQL)
                    .bind(&message.id)
                    .bind(&message.session_id)
                    .bind(&message.sender_id)
                    .bind(&message.sender_name)
                    .bind(&message.text)
                    .bind(message.created_at)
                    .execute(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to create chat message")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(INSERT_SQL)
                    .bind(&message.id)
                    .bind(&message.session_id)
                    .bind(&message.sender_id)
                    .bind(&message.sender_name)
                    .bind(&message.text)
                    .bind(message.created_at)
                    .execute(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to create chat message")?;
            }
        }
        Ok(())
    }

    async fn list_by_session(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(LIST_SQL)
                    .bind(session_id)
                    .fetch_all(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to list chat messages")?;
                Ok(rows
                    .iter()
                    .map(|row| ChatMessage {
                        id: row.get("id"),
                        session_id: row.get("session_id"),
                        sender_id: row.get("sender_id"),
                        sender_name: row.get("sender_name"),
                        text: row.get("text"),
                        created_at: row.get("created_at"),
                    })
                    .collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(LIST_SQL)
                    .bind(session_id)
                    .fetch_all(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to list chat messages")?;
                Ok(rows
                    .iter()
                    .map(|row| ChatMessage {
                        id: row.get("id"),
                        session_id: row.get("session_id"),
                        sender_id: row.get("sender_id"),
                        sender_name: row.get("sender_name"),
                        text: row.get("text"),
                        created_at: row.get("created_at"),
                    })
                    .collect())
            }
        }
    }
}
