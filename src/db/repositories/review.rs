//! Review repository
//!
//! Inserts reviews and recomputes the astrologer rating aggregate. The
//! insert and the read-modify-write of `rating`/`total_reviews` happen in
//! one database transaction so two simultaneous reviews can never both read
//! the same old count and silently drop one contribution.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Review;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

/// Review repository trait
#[async_trait]
pub trait ReviewRepository: Send + Sync {
    /// Append the review and recompute the astrologer aggregate atomically.
    ///
    /// A missing astrologer row skips the aggregate step (the review is
    /// still recorded). Write conflicts bubble up; callers retry.
    async fn create_with_aggregate(&self, review: &Review) -> Result<()>;

    /// Reviews for an astrologer, newest first
    async fn list_by_astro(&self, astro_id: &str, limit: i64, offset: i64) -> Result<Vec<Review>>;

    /// Total review rows for an astrologer
    async fn count_by_astro(&self, astro_id: &str) -> Result<i64>;
}

/// SQLx-based review repository for SQLite and MySQL
pub struct SqlxReviewRepository {
    pool: DynDatabasePool,
}

impl SqlxReviewRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ReviewRepository> {
        Arc::new(Self::new(pool))
    }
}

/// Whether an error from `create_with_aggregate` is a lock/serialization
/// conflict worth retrying rather than a hard failure.
pub fn is_transient_conflict(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::Database(db)) => {
            let message = db.message().to_lowercase();
            message.contains("locked")
                || message.contains("busy")
                || message.contains("deadlock")
                || message.contains("lock wait timeout")
        }
        Some(sqlx::Error::PoolTimedOut) => true,
        _ => false,
    }
}

/// New average after folding one rating into (avg, count), rounded to one
/// decimal place.
pub(crate) fn fold_rating(avg: f64, count: i64, rating: i64) -> f64 {
    let total = count + 1;
    let new_avg = (avg * count as f64 + rating as f64) / total as f64;
    (new_avg * 10.0).round() / 10.0
}

#[async_trait]
impl ReviewRepository for SqlxReviewRepository {
    async fn create_with_aggregate(&self, review: &Review) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_with_aggregate_sqlite(self.pool.as_sqlite().unwrap(), review).await
            }
            DatabaseDriver::Mysql => {
                create_with_aggregate_mysql(self.pool.as_mysql().unwrap(), review).await
            }
        }
    }

    async fn list_by_astro(&self, astro_id: &str, limit: i64, offset: i64) -> Result<Vec<Review>> {
        let query = format!(
            "SELECT {} FROM reviews WHERE astro_id = ? \
             ORDER BY created_at DESC LIMIT ? OFFSET ?",
            SELECT_FIELDS
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&query)
                    .bind(astro_id)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(self.pool.as_sqlite().unwrap())
                    .await
                    .context("Failed to list reviews")?;
                rows.iter().map(row_to_review_sqlite).collect()
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(&query)
                    .bind(astro_id)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(self.pool.as_mysql().unwrap())
                    .await
                    .context("Failed to list reviews")?;
                rows.iter().map(row_to_review_mysql).collect()
            }
        }
    }

    async fn count_by_astro(&self, astro_id: &str) -> Result<i64> {
        let query = "SELECT COUNT(*) AS n FROM reviews WHERE astro_id = ?";
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(query)
                .bind(astro_id)
                .fetch_one(self.pool.as_sqlite().unwrap())
                .await
                .context("Failed to count reviews")?
                .get::<i64, _>("n"),
            DatabaseDriver::Mysql => sqlx::query(query)
                .bind(astro_id)
                .fetch_one(self.pool.as_mysql().unwrap())
                .await
                .context("Failed to count reviews")?
                .get::<i64, _>("n"),
        };
        Ok(count)
    }
}

const INSERT_SQL: &str = r#"
    INSERT INTO reviews
        (id, session_id, user_id, user_name, astro_id, rating, comment, created_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
"#;

const SELECT_FIELDS: &str =
    "id, session_id, user_id, user_name, astro_id, rating, comment, created_at";

async fn create_with_aggregate_sqlite(pool: &SqlitePool, review: &Review) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(INSERT_SQL)
        .bind(&review.id)
        .bind(&review.session_id)
        .bind(&review.user_id)
        .bind(&review.user_name)
        .bind(&review.astro_id)
        .bind(review.rating)
        .bind(&review.comment)
        .bind(review.created_at)
        .execute(&mut *tx)
        .await?;

    let astro = sqlx::query("SELECT rating, total_reviews FROM astrologers WHERE id = ?")
        .bind(&review.astro_id)
        .fetch_optional(&mut *tx)
        .await?;

    if let Some(row) = astro {
        let avg: f64 = row.get("rating");
        let count: i64 = row.get("total_reviews");
        sqlx::query("UPDATE astrologers SET rating = ?, total_reviews = ? WHERE id = ?")
            .bind(fold_rating(avg, count, review.rating))
            .bind(count + 1)
            .bind(&review.astro_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(())
}

async fn create_with_aggregate_mysql(pool: &sqlx::MySqlPool, review: &Review) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(INSERT_SQL)
        .bind(&review.id)
        .bind(&review.session_id)
        .bind(&review.user_id)
        .bind(&review.user_name)
        .bind(&review.astro_id)
        .bind(review.rating)
        .bind(&review.comment)
        .bind(review.created_at)
        .execute(&mut *tx)
        .await?;

    // Row lock keeps concurrent aggregate updates serialized.
    let astro =
        sqlx::query("SELECT rating, total_reviews FROM astrologers WHERE id = ? FOR UPDATE")
            .bind(&review.astro_id)
            .fetch_optional(&mut *tx)
            .await?;

    if let Some(row) = astro {
        let avg: f64 = row.get("rating");
        let count: i64 = row.get("total_reviews");
        sqlx::query("UPDATE astrologers SET rating = ?, total_reviews = ? WHERE id = ?")
            .bind(fold_rating(avg, count, review.rating))
            .bind(count + 1)
            .bind(&review.astro_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(())
}

fn row_to_review_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Review> {
    Ok(Review {
        id: row.get("id"),
        session_id: row.get("session_id"),
        user_id: row.get("user_id"),
        user_name: row.get("user_name"),
        astro_id: row.get("astro_id"),
        rating: row.get("rating"),
        comment: row.get("comment"),
        created_at: row.get("created_at"),
    })
}

fn row_to_review_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Review> {
    Ok(Review {
        id: row.get("id"),
        session_id: row.get("session_id"),
        user_id: row.get("user_id"),
        user_name: row.get("user_name"),
        astro_id: row.get("astro_id"),
        rating: row.get("rating"),
        comment: row.get("comment"),
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod property_tests {
    use super::fold_rating;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn folded_rating_stays_in_range(
            avg in 1.0f64..=5.0,
            count in 0i64..=100_000,
            rating in 1i64..=5,
        ) {
            let avg = if count == 0 { 0.0 } else { avg };
            let folded = fold_rating(avg, count, rating);
            // Rounding to one decimal can nudge past the bounds by at most 0.05.
            prop_assert!(folded >= 0.95 && folded <= 5.05);
        }

        #[test]
        fn folded_rating_has_one_decimal(
            avg in 0.0f64..=5.0,
            count in 0i64..=10_000,
            rating in 1i64..=5,
        ) {
            let folded = fold_rating(avg, count, rating);
            prop_assert!(((folded * 10.0).round() - folded * 10.0).abs() < 1e-9);
        }
    }
}
