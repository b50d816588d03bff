//! Database migrations
//!
//! Code-based migrations for the AstroCall backend, embedded as SQL strings
//! so the service ships as a single binary. Each migration carries SQL for
//! both SQLite and MySQL; applied versions are tracked in `_migrations`.

use anyhow::{Context, Result};
use sqlx::{MySqlPool, Row, SqlitePool};

use super::DynDatabasePool;
use crate::config::DatabaseDriver;

/// A database migration with SQL for both supported drivers
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (unique, sequential)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements for SQLite
    pub up_sqlite: &'static str,
    /// SQL statements for MySQL
    pub up_mysql: &'static str,
}

/// All migrations for the AstroCall backend.
pub const MIGRATIONS: &[Migration] = &[
    // Astrologer profiles. Languages and specialties are JSON arrays;
    // rating/total_reviews are owned by the review aggregation transaction.
    Migration {
        version: 1,
        name: "create_astrologers",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS astrologers (
                id VARCHAR(64) PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                bio TEXT NOT NULL DEFAULT '',
                photo_url TEXT NOT NULL DEFAULT '',
                languages TEXT NOT NULL DEFAULT '[]',
                specialties TEXT NOT NULL DEFAULT '[]',
                is_online INTEGER NOT NULL DEFAULT 0,
                rating REAL NOT NULL DEFAULT 0,
                total_reviews INTEGER NOT NULL DEFAULT 0,
                total_calls INTEGER NOT NULL DEFAULT 0,
                rate_per_minute INTEGER NOT NULL DEFAULT 0,
                created_at BIGINT NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_astrologers_online ON astrologers(is_online);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS astrologers (
                id VARCHAR(64) PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                bio TEXT NOT NULL,
                photo_url TEXT NOT NULL,
                languages TEXT NOT NULL,
                specialties TEXT NOT NULL,
                is_online TINYINT NOT NULL DEFAULT 0,
                rating DOUBLE NOT NULL DEFAULT 0,
                total_reviews BIGINT NOT NULL DEFAULT 0,
                total_calls BIGINT NOT NULL DEFAULT 0,
                rate_per_minute BIGINT NOT NULL DEFAULT 0,
                created_at BIGINT NOT NULL DEFAULT 0
            );
            CREATE INDEX idx_astrologers_online ON astrologers(is_online);
        "#,
    },
    // Call sessions. Timestamps are epoch milliseconds; started_at/ended_at
    // stay NULL until the matching transition. room_name is unique for the
    // life of the system, never reused.
    Migration {
        version: 2,
        name: "create_call_sessions",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS call_sessions (
                id VARCHAR(64) PRIMARY KEY,
                user_id VARCHAR(64) NOT NULL,
                user_name VARCHAR(255) NOT NULL,
                astro_id VARCHAR(64) NOT NULL,
                astro_name VARCHAR(255) NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'pending',
                started_at BIGINT,
                ended_at BIGINT,
                duration_seconds INTEGER NOT NULL DEFAULT 0,
                room_name VARCHAR(255) NOT NULL UNIQUE,
                created_at BIGINT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_call_sessions_user ON call_sessions(user_id, status);
            CREATE INDEX IF NOT EXISTS idx_call_sessions_astro ON call_sessions(astro_id, status);
            CREATE INDEX IF NOT EXISTS idx_call_sessions_created ON call_sessions(created_at);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS call_sessions (
                id VARCHAR(64) PRIMARY KEY,
                user_id VARCHAR(64) NOT NULL,
                user_name VARCHAR(255) NOT NULL,
                astro_id VARCHAR(64) NOT NULL,
                astro_name VARCHAR(255) NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'pending',
                started_at BIGINT,
                ended_at BIGINT,
                duration_seconds BIGINT NOT NULL DEFAULT 0,
                room_name VARCHAR(255) NOT NULL UNIQUE,
                created_at BIGINT NOT NULL
            );
            CREATE INDEX idx_call_sessions_user ON call_sessions(user_id, status);
            CREATE INDEX idx_call_sessions_astro ON call_sessions(astro_id, status);
            CREATE INDEX idx_call_sessions_created ON call_sessions(created_at);
        "#,
    },
    // In-call chat messages, append-only. seq records insert order, so
    // messages landing within the same created_at millisecond still read
    // back in send order.
    Migration {
        version: 3,
        name: "create_chat_messages",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS chat_messages (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id VARCHAR(64) NOT NULL UNIQUE,
                session_id VARCHAR(64) NOT NULL,
                sender_id VARCHAR(64) NOT NULL,
                sender_name VARCHAR(255) NOT NULL,
                text TEXT NOT NULL,
                created_at BIGINT NOT NULL,
                FOREIGN KEY (session_id) REFERENCES call_sessions(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_chat_messages_session ON chat_messages(session_id, created_at);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS chat_messages (
                seq BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
                id VARCHAR(64) NOT NULL UNIQUE,
                session_id VARCHAR(64) NOT NULL,
                sender_id VARCHAR(64) NOT NULL,
                sender_name VARCHAR(255) NOT NULL,
                text TEXT NOT NULL,
                created_at BIGINT NOT NULL,
                FOREIGN KEY (session_id) REFERENCES call_sessions(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_chat_messages_session ON chat_messages(session_id, created_at);
        "#,
    },
    // Session reviews. One row per submit call; the astrologer aggregate is
    // recomputed in the same transaction that inserts the row.
    Migration {
        version: 4,
        name: "create_reviews",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS reviews (
                id VARCHAR(64) PRIMARY KEY,
                session_id VARCHAR(64) NOT NULL,
                user_id VARCHAR(64) NOT NULL,
                user_name VARCHAR(255) NOT NULL,
                astro_id VARCHAR(64) NOT NULL,
                rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
                comment TEXT NOT NULL DEFAULT '',
                created_at BIGINT NOT NULL,
                FOREIGN KEY (session_id) REFERENCES call_sessions(id)
            );
            CREATE INDEX IF NOT EXISTS idx_reviews_astro ON reviews(astro_id, created_at);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS reviews (
                id VARCHAR(64) PRIMARY KEY,
                session_id VARCHAR(64) NOT NULL,
                user_id VARCHAR(64) NOT NULL,
                user_name VARCHAR(255) NOT NULL,
                astro_id VARCHAR(64) NOT NULL,
                rating BIGINT NOT NULL,
                comment TEXT NOT NULL,
                created_at BIGINT NOT NULL,
                FOREIGN KEY (session_id) REFERENCES call_sessions(id)
            );
            CREATE INDEX idx_reviews_astro ON reviews(astro_id, created_at);
        "#,
    },
];

/// Run all pending migrations in order.
///
/// Returns the number of migrations applied.
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;
    let applied = applied_versions(pool).await?;

    let mut count = 0;
    for migration in MIGRATIONS {
        if !applied.contains(&migration.version) {
            tracing::info!(
                "Applying migration {}: {}",
                migration.version,
                migration.name
            );
            apply_migration(pool, migration)
                .await
                .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

async fn create_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => {
            r#"CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )"#
        }
        DatabaseDriver::Mysql => {
            r#"CREATE TABLE IF NOT EXISTS _migrations (
                version INT PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )"#
        }
    };

    match pool.driver() {
        DatabaseDriver::Sqlite => {
            sqlx::query(sql)
                .execute(pool.as_sqlite().expect("sqlite pool"))
                .await
                .context("Failed to create migrations table")?;
        }
        DatabaseDriver::Mysql => {
            sqlx::query(sql)
                .execute(pool.as_mysql().expect("mysql pool"))
                .await
                .context("Failed to create migrations table")?;
        }
    }
    Ok(())
}

async fn applied_versions(pool: &DynDatabasePool) -> Result<Vec<i32>> {
    let query = "SELECT version FROM _migrations ORDER BY version";
    let versions = match pool.driver() {
        DatabaseDriver::Sqlite => sqlx::query(query)
            .fetch_all(pool.as_sqlite().expect("sqlite pool"))
            .await?
            .iter()
            .map(|row| row.get::<i32, _>("version"))
            .collect(),
        DatabaseDriver::Mysql => sqlx::query(query)
            .fetch_all(pool.as_mysql().expect("mysql pool"))
            .await?
            .iter()
            .map(|row| row.get::<i32, _>("version"))
            .collect(),
    };
    Ok(versions)
}

async fn apply_migration(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    match pool.driver() {
        DatabaseDriver::Sqlite => {
            let sqlite = pool.as_sqlite().expect("sqlite pool");
            for statement in split_statements(migration.up_sqlite) {
                sqlx::query(statement)
                    .execute(sqlite)
                    .await
                    .with_context(|| format!("Failed to execute: {}", statement))?;
            }
            sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
                .bind(migration.version)
                .bind(migration.name)
                .execute(sqlite)
                .await?;
        }
        DatabaseDriver::Mysql => {
            let mysql = pool.as_mysql().expect("mysql pool");
            for statement in split_statements(migration.up_mysql) {
                sqlx::query(statement)
                    .execute(mysql)
                    .await
                    .with_context(|| format!("Failed to execute: {}", statement))?;
            }
            sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
                .bind(migration.version)
                .bind(migration.name)
                .execute(mysql)
                .await?;
        }
    }
    Ok(())
}

/// Split a migration body into executable statements.
fn split_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.lines().all(|l| l.trim().starts_with("--") || l.trim().is_empty()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    #[tokio::test]
    async fn test_run_migrations_is_idempotent() {
        let pool = create_test_pool().await.expect("Failed to create test pool");

        let count = run_migrations(&pool).await.expect("Failed to run migrations");
        assert_eq!(count, MIGRATIONS.len());

        let count = run_migrations(&pool).await.expect("Failed to run migrations");
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_tables_created() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        let sqlite = pool.as_sqlite().unwrap();

        for table in ["astrologers", "call_sessions", "chat_messages", "reviews"] {
            let row = sqlx::query("SELECT name FROM sqlite_master WHERE type='table' AND name=?")
                .bind(table)
                .fetch_optional(sqlite)
                .await
                .expect("Failed to query sqlite_master");
            assert!(row.is_some(), "table {} missing", table);
        }
    }

    #[tokio::test]
    async fn test_room_name_unique() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        let sqlite = pool.as_sqlite().unwrap();

        let insert = "INSERT INTO call_sessions \
            (id, user_id, user_name, astro_id, astro_name, status, room_name, created_at) \
            VALUES (?, 'u1', 'U', 'a1', 'A', 'pending', ?, 0)";
        sqlx::query(insert)
            .bind("s1")
            .bind("room_x")
            .execute(sqlite)
            .await
            .expect("first insert");
        let dup = sqlx::query(insert)
            .bind("s2")
            .bind("room_x")
            .execute(sqlite)
            .await;
        assert!(dup.is_err(), "duplicate room_name must be rejected");
    }

    #[tokio::test]
    async fn test_rating_check_constraint() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        let sqlite = pool.as_sqlite().unwrap();

        sqlx::query(
            "INSERT INTO call_sessions \
             (id, user_id, user_name, astro_id, astro_name, status, room_name, created_at) \
             VALUES ('s1', 'u1', 'U', 'a1', 'A', 'ended', 'room_1', 0)",
        )
        .execute(sqlite)
        .await
        .expect("session insert");

        let result = sqlx::query(
            "INSERT INTO reviews (id, session_id, user_id, user_name, astro_id, rating, comment, created_at) \
             VALUES ('r1', 's1', 'u1', 'U', 'a1', 6, '', 0)",
        )
        .execute(sqlite)
        .await;
        assert!(result.is_err(), "rating above 5 must be rejected");
    }
}
