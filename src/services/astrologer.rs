//! Astrologer directory service
//!
//! Profile registration, presence toggling, and the public directory
//! listing. The listing is the hot read path, so it sits behind a short
//! TTL cache that presence and profile writes invalidate.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use moka::future::Cache;

use crate::db::repositories::AstrologerRepository;
use crate::models::{Astrologer, CreateAstrologerInput};

/// Astrologer service errors
#[derive(Debug, thiserror::Error)]
pub enum AstrologerServiceError {
    /// Astrologer id does not exist
    #[error("Astrologer not found: {0}")]
    NotFound(String),

    /// Input validation failed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Database or other internal failure
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Astrologer directory and presence
pub struct AstrologerService {
    astrologers: Arc<dyn AstrologerRepository>,
    // Keyed by the online_only flag; two entries at most.
    list_cache: Cache<bool, Arc<Vec<Astrologer>>>,
}

impl AstrologerService {
    pub fn new(astrologers: Arc<dyn AstrologerRepository>) -> Self {
        Self {
            astrologers,
            list_cache: Cache::builder()
                .max_capacity(4)
                .time_to_live(Duration::from_secs(10))
                .build(),
        }
    }

    /// Register or update an astrologer profile.
    ///
    /// Aggregate columns (rating, review and call counters, presence) are
    /// untouched when the profile already exists.
    pub async fn register(
        &self,
        input: CreateAstrologerInput,
    ) -> Result<Astrologer, AstrologerServiceError> {
        if input.id.trim().is_empty() || input.name.trim().is_empty() {
            return Err(AstrologerServiceError::Validation(
                "id and name are required".to_string(),
            ));
        }
        if input.rate_per_minute < 0 {
            return Err(AstrologerServiceError::Validation(
                "rate_per_minute cannot be negative".to_string(),
            ));
        }

        let astrologer = Astrologer {
            id: input.id,
            name: input.name,
            bio: input.bio,
            photo_url: input.photo_url,
            languages: input.languages,
            specialties: input.specialties,
            is_online: false,
            rating: 0.0,
            total_reviews: 0,
            total_calls: 0,
            rate_per_minute: input.rate_per_minute,
            created_at: Utc::now().timestamp_millis(),
        };
        self.astrologers.upsert(&astrologer).await?;
        self.list_cache.invalidate_all();

        // Re-read so an updated profile returns its preserved aggregates.
        self.get(&astrologer.id).await
    }

    /// Get one astrologer by id.
    pub async fn get(&self, id: &str) -> Result<Astrologer, AstrologerServiceError> {
        self.astrologers
            .get_by_id(id)
            .await?
            .ok_or_else(|| AstrologerServiceError::NotFound(id.to_string()))
    }

    /// Directory listing, online first then by rating.
    pub async fn list(&self, online_only: bool) -> Result<Arc<Vec<Astrologer>>, AstrologerServiceError> {
        if let Some(cached) = self.list_cache.get(&online_only).await {
            return Ok(cached);
        }
        let listing = Arc::new(self.astrologers.list(online_only).await?);
        self.list_cache.insert(online_only, listing.clone()).await;
        Ok(listing)
    }

    /// Set presence. Unknown ids are an error so clients notice typos.
    pub async fn set_online(
        &self,
        id: &str,
        is_online: bool,
    ) -> Result<Astrologer, AstrologerServiceError> {
        if !self.astrologers.set_online(id, is_online).await? {
            return Err(AstrologerServiceError::NotFound(id.to_string()));
        }
        self.list_cache.invalidate_all();
        tracing::debug!(astro_id = %id, is_online, "Presence updated");
        self.get(id).await
    }

    /// Update the profile bio text.
    pub async fn set_bio(&self, id: &str, bio: &str) -> Result<Astrologer, AstrologerServiceError> {
        if !self.astrologers.set_bio(id, bio).await? {
            return Err(AstrologerServiceError::NotFound(id.to_string()));
        }
        self.list_cache.invalidate_all();
        self.get(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxAstrologerRepository;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> AstrologerService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        AstrologerService::new(SqlxAstrologerRepository::boxed(pool))
    }

    fn input(id: &str, name: &str) -> CreateAstrologerInput {
        CreateAstrologerInput {
            id: id.to_string(),
            name: name.to_string(),
            bio: "Twenty years of Vedic practice".to_string(),
            photo_url: String::new(),
            languages: vec!["Hindi".to_string(), "English".to_string()],
            specialties: vec!["Vedic".to_string()],
            rate_per_minute: 25,
        }
    }

    #[tokio::test]
    async fn test_register_and_get() {
        let service = setup().await;
        let astro = service.register(input("a1", "Dr. Arjun Mehta")).await.unwrap();

        assert_eq!(astro.name, "Dr. Arjun Mehta");
        assert!(!astro.is_online);
        assert_eq!(astro.rating, 0.0);
        assert_eq!(service.get("a1").await.unwrap().id, "a1");
    }

    #[tokio::test]
    async fn test_register_validates_input() {
        let service = setup().await;

        let mut bad = input("", "Nameless");
        assert!(matches!(
            service.register(bad).await.unwrap_err(),
            AstrologerServiceError::Validation(_)
        ));

        bad = input("a1", "Sunita Rao");
        bad.rate_per_minute = -5;
        assert!(matches!(
            service.register(bad).await.unwrap_err(),
            AstrologerServiceError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_presence_toggle_invalidates_listing() {
        let service = setup().await;
        service.register(input("a1", "Priya Nair")).await.unwrap();

        let online = service.list(true).await.unwrap();
        assert!(online.is_empty());

        let astro = service.set_online("a1", true).await.unwrap();
        assert!(astro.is_online);

        // A fresh listing must not serve the stale cached result.
        let online = service.list(true).await.unwrap();
        assert_eq!(online.len(), 1);
    }

    #[tokio::test]
    async fn test_set_online_unknown_id() {
        let service = setup().await;
        assert!(matches!(
            service.set_online("ghost", true).await.unwrap_err(),
            AstrologerServiceError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_set_bio() {
        let service = setup().await;
        service.register(input("a1", "Priya Nair")).await.unwrap();

        let astro = service.set_bio("a1", "Updated bio").await.unwrap();
        assert_eq!(astro.bio, "Updated bio");
    }
}
