//! Astrologer repository
//!
//! Database operations for astrologer profiles. The rating average and
//! review count columns are deliberately not writable here; they are owned
//! by the review repository's aggregation transaction.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Astrologer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Astrologer repository trait
#[async_trait]
pub trait AstrologerRepository: Send + Sync {
    /// Insert or replace an astrologer profile
    async fn upsert(&self, astro: &Astrologer) -> Result<()>;

    /// Get an astrologer by id
    async fn get_by_id(&self, id: &str) -> Result<Option<Astrologer>>;

    /// List astrologers, online first, best rated first within each group
    async fn list(&self, online_only: bool) -> Result<Vec<Astrologer>>;

    /// Set the online/offline flag. Returns false when the id is unknown.
    async fn set_online(&self, id: &str, is_online: bool) -> Result<bool>;

    /// Update the bio. Returns false when the id is unknown.
    async fn set_bio(&self, id: &str, bio: &str) -> Result<bool>;

    /// Bump the completed-call counter
    async fn increment_total_calls(&self, id: &str) -> Result<()>;
}

/// SQLx-based astrologer repository for SQLite and MySQL
pub struct SqlxAstrologerRepository {
    pool: DynDatabasePool,
}

impl SqlxAstrologerRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AstrologerRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl AstrologerRepository for SqlxAstrologerRepository {
    async fn upsert(&self, astro: &Astrologer) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => upsert_sqlite(self.pool.as_sqlite().unwrap(), astro).await,
            DatabaseDriver::Mysql => upsert_mysql(self.pool.as_mysql().unwrap(), astro).await,
        }
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Astrologer>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_id_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => get_by_id_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn list(&self, online_only: bool) -> Result<Vec<Astrologer>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_sqlite(self.pool.as_sqlite().unwrap(), online_only).await
            }
            DatabaseDriver::Mysql => list_mysql(self.pool.as_mysql().unwrap(), online_only).await,
        }
    }

    async fn set_online(&self, id: &str, is_online: bool) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                set_online_sqlite(self.pool.as_sqlite().unwrap(), id, is_online).await
            }
            DatabaseDriver::Mysql => {
                set_online_mysql(self.pool.as_mysql().unwrap(), id, is_online).await
            }
        }
    }

    async fn set_bio(&self, id: &str, bio: &str) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => set_bio_sqlite(self.pool.as_sqlite().unwrap(), id, bio).await,
            DatabaseDriver::Mysql => set_bio_mysql(self.pool.as_mysql().unwrap(), id, bio).await,
        }
    }

    async fn increment_total_calls(&self, id: &str) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                increment_calls_sqlite(self.pool.as_sqlite().unwrap(), id).await
            }
            DatabaseDriver::Mysql => increment_calls_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }
}

const UPSERT_SQLITE: &str = r#"
    INSERT INTO astrologers
        (id, name, bio, photo_url, languages, specialties, is_online,
         rating, total_reviews, total_calls, rate_per_minute, created_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(id) DO UPDATE SET
        name = excluded.name,
        bio = excluded.bio,
        photo_url = excluded.photo_url,
        languages = excluded.languages,
        specialties = excluded.specialties,
        rate_per_minute = excluded.rate_per_minute
"#;

const UPSERT_MYSQL: &str = r#"
    INSERT INTO astrologers
        (id, name, bio, photo_url, languages, specialties, is_online,
         rating, total_reviews, total_calls, rate_per_minute, created_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON DUPLICATE KEY UPDATE
        name = VALUES(name),
        bio = VALUES(bio),
        photo_url = VALUES(photo_url),
        languages = VALUES(languages),
        specialties = VALUES(specialties),
        rate_per_minute = VALUES(rate_per_minute)
"#;

const SELECT_FIELDS: &str = "id, name, bio, photo_url, languages, specialties, is_online, \
     rating, total_reviews, total_calls, rate_per_minute, created_at";

async fn upsert_sqlite(pool: &SqlitePool, astro: &Astrologer) -> Result<()> {
    sqlx::query(UPSERT_SQLITE)
        .bind(&astro.id)
        .bind(&astro.name)
        .bind(&astro.bio)
        .bind(&astro.photo_url)
        .bind(serde_json::to_string(&astro.languages)?)
        .bind(serde_json::to_string(&astro.specialties)?)
        .bind(astro.is_online)
        .bind(astro.rating)
        .bind(astro.total_reviews)
        .bind(astro.total_calls)
        .bind(astro.rate_per_minute)
        .bind(astro.created_at)
        .execute(pool)
        .await
        .context("Failed to upsert astrologer")?;
    Ok(())
}

async fn upsert_mysql(pool: &MySqlPool, astro: &Astrologer) -> Result<()> {
    sqlx::query(UPSERT_MYSQL)
        .bind(&astro.id)
        .bind(&astro.name)
        .bind(&astro.bio)
        .bind(&astro.photo_url)
        .bind(serde_json::to_string(&astro.languages)?)
        .bind(serde_json::to_string(&astro.specialties)?)
        .bind(astro.is_online)
        .bind(astro.rating)
        .bind(astro.total_reviews)
        .bind(astro.total_calls)
        .bind(astro.rate_per_minute)
        .bind(astro.created_at)
        .execute(pool)
        .await
        .context("Failed to upsert astrologer")?;
    Ok(())
}

async fn get_by_id_sqlite(pool: &SqlitePool, id: &str) -> Result<Option<Astrologer>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM astrologers WHERE id = ?",
        SELECT_FIELDS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get astrologer by id")?;

    row.map(|row| row_to_astrologer_sqlite(&row)).transpose()
}

async fn get_by_id_mysql(pool: &MySqlPool, id: &str) -> Result<Option<Astrologer>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM astrologers WHERE id = ?",
        SELECT_FIELDS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get astrologer by id")?;

    row.map(|row| row_to_astrologer_mysql(&row)).transpose()
}

async fn list_sqlite(pool: &SqlitePool, online_only: bool) -> Result<Vec<Astrologer>> {
    let filter = if online_only { "WHERE is_online = 1" } else { "" };
    let rows = sqlx::query(&format!(
        "SELECT {} FROM astrologers {} ORDER BY is_online DESC, rating DESC, name ASC",
        SELECT_FIELDS, filter
    ))
    .fetch_all(pool)
    .await
    .context("Failed to list astrologers")?;

    rows.iter().map(row_to_astrologer_sqlite).collect()
}

async fn list_mysql(pool: &MySqlPool, online_only: bool) -> Result<Vec<Astrologer>> {
    let filter = if online_only { "WHERE is_online = 1" } else { "" };
    let rows = sqlx::query(&format!(
        "SELECT {} FROM astrologers {} ORDER BY is_online DESC, rating DESC, name ASC",
        SELECT_FIELDS, filter
    ))
    .fetch_all(pool)
    .await
    .context("Failed to list astrologers")?;

    rows.iter().map(row_to_astrologer_mysql).collect()
}

async fn set_online_sqlite(pool: &SqlitePool, id: &str, is_online: bool) -> Result<bool> {
    let result = sqlx::query("UPDATE astrologers SET is_online = ? WHERE id = ?")
        .bind(is_online)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to set online flag")?;
    Ok(result.rows_affected() > 0)
}

async fn set_online_mysql(pool: &MySqlPool, id: &str, is_online: bool) -> Result<bool> {
    let result = sqlx::query("UPDATE astrologers SET is_online = ? WHERE id = ?")
        .bind(is_online)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to set online flag")?;
    Ok(result.rows_affected() > 0)
}

async fn set_bio_sqlite(pool: &SqlitePool, id: &str, bio: &str) -> Result<bool> {
    let result = sqlx::query("UPDATE astrologers SET bio = ? WHERE id = ?")
        .bind(bio)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to set bio")?;
    Ok(result.rows_affected() > 0)
}

async fn set_bio_mysql(pool: &MySqlPool, id: &str, bio: &str) -> Result<bool> {
    let result = sqlx::query("UPDATE astrologers SET bio = ? WHERE id = ?")
        .bind(bio)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to set bio")?;
    Ok(result.rows_affected() > 0)
}

async fn increment_calls_sqlite(pool: &SqlitePool, id: &str) -> Result<()> {
    sqlx::query("UPDATE astrologers SET total_calls = total_calls + 1 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to increment total_calls")?;
    Ok(())
}

async fn increment_calls_mysql(pool: &MySqlPool, id: &str) -> Result<()> {
    sqlx::query("UPDATE astrologers SET total_calls = total_calls + 1 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to increment total_calls")?;
    Ok(())
}

fn parse_string_list(raw: String) -> Vec<String> {
    serde_json::from_str(&raw).unwrap_or_default()
}

fn row_to_astrologer_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Astrologer> {
    Ok(Astrologer {
        id: row.get("id"),
        name: row.get("name"),
        bio: row.get("bio"),
        photo_url: row.get("photo_url"),
        languages: parse_string_list(row.get("languages")),
        specialties: parse_string_list(row.get("specialties")),
        is_online: row.get("is_online"),
        rating: row.get("rating"),
        total_reviews: row.get("total_reviews"),
        total_calls: row.get("total_calls"),
        rate_per_minute: row.get("rate_per_minute"),
        created_at: row.get("created_at"),
    })
}

fn row_to_astrologer_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Astrologer> {
    Ok(Astrologer {
        id: row.get("id"),
        name: row.get("name"),
        bio: row.get("bio"),
        photo_url: row.get("photo_url"),
        languages: parse_string_list(row.get("languages")),
        specialties: parse_string_list(row.get("specialties")),
        is_online: row.get("is_online"),
        rating: row.get("rating"),
        total_reviews: row.get("total_reviews"),
        total_calls: row.get("total_calls"),
        rate_per_minute: row.get("rate_per_minute"),
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    pub(crate) async fn setup() -> (DynDatabasePool, SqlxAstrologerRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxAstrologerRepository::new(pool.clone());
        (pool, repo)
    }

    pub(crate) fn test_astrologer(id: &str, name: &str) -> Astrologer {
        Astrologer {
            id: id.to_string(),
            name: name.to_string(),
            bio: "Vedic astrology".to_string(),
            photo_url: String::new(),
            languages: vec!["Hindi".to_string(), "English".to_string()],
            specialties: vec!["Kundali".to_string()],
            is_online: false,
            rating: 0.0,
            total_reviews: 0,
            total_calls: 0,
            rate_per_minute: 15,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let (_pool, repo) = setup().await;
        let astro = test_astrologer("a1", "Pandit Vikram");
        repo.upsert(&astro).await.expect("upsert");

        let found = repo.get_by_id("a1").await.expect("get").expect("exists");
        assert_eq!(found.name, "Pandit Vikram");
        assert_eq!(found.languages, vec!["Hindi", "English"]);
        assert_eq!(found.rating, 0.0);
    }

    #[tokio::test]
    async fn test_upsert_preserves_aggregate_columns() {
        let (pool, repo) = setup().await;
        let astro = test_astrologer("a1", "Priya Nair");
        repo.upsert(&astro).await.expect("upsert");

        // Simulate aggregate writes that a profile re-upsert must not clobber.
        sqlx::query("UPDATE astrologers SET rating = 4.5, total_reviews = 7 WHERE id = 'a1'")
            .execute(pool.as_sqlite().unwrap())
            .await
            .expect("aggregate write");

        let mut updated = test_astrologer("a1", "Priya Nair");
        updated.bio = "Tarot and numerology".to_string();
        repo.upsert(&updated).await.expect("re-upsert");

        let found = repo.get_by_id("a1").await.expect("get").expect("exists");
        assert_eq!(found.bio, "Tarot and numerology");
        assert_eq!(found.rating, 4.5);
        assert_eq!(found.total_reviews, 7);
    }

    #[tokio::test]
    async fn test_list_orders_online_first() {
        let (_pool, repo) = setup().await;
        repo.upsert(&test_astrologer("a1", "Offline One")).await.unwrap();
        repo.upsert(&test_astrologer("a2", "Online One")).await.unwrap();
        repo.set_online("a2", true).await.unwrap();

        let all = repo.list(false).await.expect("list");
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, "a2");

        let online = repo.list(true).await.expect("list online");
        assert_eq!(online.len(), 1);
        assert_eq!(online[0].id, "a2");
    }

    #[tokio::test]
    async fn test_set_online_unknown_id() {
        let (_pool, repo) = setup().await;
        let updated = repo.set_online("missing", true).await.expect("set_online");
        assert!(!updated);
    }

    #[tokio::test]
    async fn test_increment_total_calls() {
        let (_pool, repo) = setup().await;
        repo.upsert(&test_astrologer("a1", "Sunita Rao")).await.unwrap();
        repo.increment_total_calls("a1").await.unwrap();
        repo.increment_total_calls("a1").await.unwrap();

        let found = repo.get_by_id("a1").await.unwrap().unwrap();
        assert_eq!(found.total_calls, 2);
    }
}
