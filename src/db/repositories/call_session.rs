//! Call session repository
//!
//! Database operations for consultation call sessions. Every status
//! transition is a guarded single-row update (`WHERE id = ? AND status = ?`)
//! so the database is the concurrency boundary: when two participants race
//! on the same transition exactly one update applies and the other observes
//! `false`, with no field ever double-written.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{CallSession, SessionStatus};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// Call session repository trait
#[async_trait]
pub trait CallSessionRepository: Send + Sync {
    /// Persist a new session
    async fn create(&self, session: &CallSession) -> Result<()>;

    /// Get a session by id
    async fn get_by_id(&self, id: &str) -> Result<Option<CallSession>>;

    /// Sessions where `participant` is the user or the astrologer,
    /// newest first, optionally filtered by status
    async fn list_for_participant(
        &self,
        participant: &str,
        status: Option<SessionStatus>,
    ) -> Result<Vec<CallSession>>;

    /// pending → active, setting `started_at`. Returns whether this call
    /// applied the transition.
    async fn mark_active(&self, id: &str, started_at: i64) -> Result<bool>;

    /// pending → declined. Returns whether this call applied the transition.
    async fn mark_declined(&self, id: &str) -> Result<bool>;

    /// active → ended, setting `ended_at` and `duration_seconds`. Returns
    /// whether this call applied the transition.
    async fn mark_ended(&self, id: &str, ended_at: i64, duration_seconds: i64) -> Result<bool>;

    /// Ids of sessions still pending and created before `cutoff_ms`
    async fn stale_pending_ids(&self, cutoff_ms: i64) -> Result<Vec<String>>;
}

/// SQLx-based call session repository for SQLite and MySQL
pub struct SqlxCallSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxCallSessionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CallSessionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CallSessionRepository for SqlxCallSessionRepository {
    async fn create(&self, session: &CallSession) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_sqlite(self.pool.as_sqlite().unwrap(), session).await
            }
            DatabaseDriver::Mysql => create_mysql(self.pool.as_mysql().unwrap(), session).await,
        }
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<CallSession>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_id_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => get_by_id_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn list_for_participant(
        &self,
        participant: &str,
        status: Option<SessionStatus>,
    ) -> Result<Vec<CallSession>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_for_participant_sqlite(self.pool.as_sqlite().unwrap(), participant, status)
                    .await
            }
            DatabaseDriver::Mysql => {
                list_for_participant_mysql(self.pool.as_mysql().unwrap(), participant, status)
                    .await
            }
        }
    }

    async fn mark_active(&self, id: &str, started_at: i64) -> Result<bool> {
        let query = "UPDATE call_sessions SET status = 'active', started_at = ? \
                     WHERE id = ? AND status = 'pending'";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(query)
                .bind(started_at)
                .bind(id)
                .execute(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to mark session active")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(query)
                .bind(started_at)
                .bind(id)
                .execute(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to mark session active")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn mark_declined(&self, id: &str) -> Result<bool> {
        let query = "UPDATE call_sessions SET status = 'declined' \
                     WHERE id = ? AND status = 'pending'";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(query)
                .bind(id)
                .execute(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to mark session declined")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(query)
                .bind(id)
                .execute(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to mark session declined")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn mark_ended(&self, id: &str, ended_at: i64, duration_seconds: i64) -> Result<bool> {
        let query = "UPDATE call_sessions \
                     SET status = 'ended', ended_at = ?, duration_seconds = ? \
                     WHERE id = ? AND status = 'active'";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(query)
                .bind(ended_at)
                .bind(duration_seconds)
                .bind(id)
                .execute(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to mark session ended")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(query)
                .bind(ended_at)
                .bind(duration_seconds)
                .bind(id)
                .execute(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to mark session ended")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn stale_pending_ids(&self, cutoff_ms: i64) -> Result<Vec<String>> {
        let query = "SELECT id FROM call_sessions \
                     WHERE status = 'pending' AND created_at < ?";
        let ids = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(query)
                .bind(cutoff_ms)
                .fetch_all(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to query stale pending sessions")?
                .iter()
                .map(|row| row.get::<String, _>("id"))
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(query)
                .bind(cutoff_ms)
                .fetch_all(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to query stale pending sessions")?
                .iter()
                .map(|row| row.get::<String, _>("id"))
                .collect(),
        };
        Ok(ids)
    }
}

const INSERT_SQL: &str = r#"
    INSERT INTO call_sessions
        (id, user_id, user_name, astro_id, astro_name, status,
         started_at, ended_at, duration_seconds, room_name, created_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

const SELECT_FIELDS: &str = "id, user_id, user_name, astro_id, astro_name, status, \
     started_at, ended_at, duration_seconds, room_name, created_at";

async fn create_sqlite(pool: &SqlitePool, session: &CallSession) -> Result<()> {
    sqlx::query(INSERT_SQL)
        .bind(&session.id)
        .bind(&session.user_id)
        .bind(&session.user_name)
        .bind(&session.astro_id)
        .bind(&session.astro_name)
        .bind(session.status.to_string())
        .bind(session.started_at)
        .bind(session.ended_at)
        .bind(session.duration_seconds)
        .bind(&session.room_name)
        .bind(session.created_at)
        .execute(pool)
        .await
        .context("Failed to create call session")?;
    Ok(())
}

async fn create_mysql(pool: &MySqlPool, session: &CallSession) -> Result<()> {
    sqlx::query(INSERT_SQL)
        .bind(&session.id)
        .bind(&session.user_id)
        .bind(&session.user_name)
        .bind(&session.astro_id)
        .bind(&session.astro_name)
        .bind(session.status.to_string())
        .bind(session.started_at)
        .bind(session.ended_at)
        .bind(session.duration_seconds)
        .bind(&session.room_name)
        .bind(session.created_at)
        .execute(pool)
        .await
        .context("Failed to create call session")?;
    Ok(())
}

async fn get_by_id_sqlite(pool: &SqlitePool, id: &str) -> Result<Option<CallSession>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM call_sessions WHERE id = ?",
        SELECT_FIELDS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get call session by id")?;

    row.map(|row| row_to_session_sqlite(&row)).transpose()
}

async fn get_by_id_mysql(pool: &MySqlPool, id: &str) -> Result<Option<CallSession>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM call_sessions WHERE id = ?",
        SELECT_FIELDS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get call session by id")?;

    row.map(|row| row_to_session_mysql(&row)).transpose()
}

fn list_query(status: Option<SessionStatus>) -> String {
    let status_filter = match status {
        Some(s) => format!("AND status = '{}'", s),
        None => String::new(),
    };
    format!(
        "SELECT {} FROM call_sessions \
         WHERE (user_id = ? OR astro_id = ?) {} \
         ORDER BY created_at DESC",
        SELECT_FIELDS, status_filter
    )
}

async fn list_for_participant_sqlite(
    pool: &SqlitePool,
    participant: &str,
    status: Option<SessionStatus>,
) -> Result<Vec<CallSession>> {
    let rows = sqlx::query(&list_query(status))
        .bind(participant)
        .bind(participant)
        .fetch_all(pool)
        .await
        .context("Failed to list sessions for participant")?;

    rows.iter().map(row_to_session_sqlite).collect()
}

async fn list_for_participant_mysql(
    pool: &MySqlPool,
    participant: &str,
    status: Option<SessionStatus>,
) -> Result<Vec<CallSession>> {
    let rows = sqlx::query(&list_query(status))
        .bind(participant)
        .bind(participant)
        .fetch_all(pool)
        .await
        .context("Failed to list sessions for participant")?;

    rows.iter().map(row_to_session_mysql).collect()
}

fn parse_status(raw: &str) -> Result<SessionStatus> {
    SessionStatus::from_str(raw).map_err(|e| anyhow!(e))
}

fn row_to_session_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<CallSession> {
    Ok(CallSession {
        id: row.get("id"),
        user_id: row.get("user_id"),
        user_name: row.get("user_name"),
        astro_id: row.get("astro_id"),
        astro_name: row.get("astro_name"),
        status: parse_status(&row.get::<String, _>("status"))?,
        started_at: row.get("started_at"),
        ended_at: row.get("ended_at"),
        duration_seconds: row.get("duration_seconds"),
        room_name: row.get("room_name"),
        created_at: row.get("created_at"),
    })
}

fn row_to_session_mysql(row: &sqlx::mysql::MySqlRow) -> Result<CallSession> {
    Ok(CallSession {
        id: row.get("id"),
        user_id: row.get("user_id"),
        user_name: row.get("user_name"),
        astro_id: row.get("astro_id"),
        astro_name: row.get("astro_name"),
        status: parse_status(&row.get::<String, _>("status"))?,
        started_at: row.get("started_at"),
        ended_at: row.get("ended_at"),
        duration_seconds: row.get("duration_seconds"),
        room_name: row.get("room_name"),
        created_at: row.get("created_at"),
    })
}
