//! Demo data seeding (`demo` feature)
//!
//! Seeds a small astrologer directory so a fresh install has something to
//! browse. Existing profiles are updated in place; their review and call
//! counters survive re-seeding.

use chrono::Utc;

use crate::db::repositories::AstrologerRepository;
use crate::models::Astrologer;

struct DemoProfile {
    id: &'static str,
    name: &'static str,
    bio: &'static str,
    photo_seed: &'static str,
    languages: &'static [&'static str],
    specialties: &'static [&'static str],
    is_online: bool,
    rating: f64,
    total_reviews: i64,
    total_calls: i64,
    rate_per_minute: i64,
}

const DEMO_ASTROLOGERS: &[DemoProfile] = &[
    DemoProfile {
        id: "demo_astro_1",
        name: "Pandit Vikram Sharma",
        bio: "25+ years in Vedic astrology and Kundali analysis. Specializing in career and marriage predictions.",
        photo_seed: "vikram",
        languages: &["Hindi", "English"],
        specialties: &["Vedic Astrology", "Kundali", "Marriage"],
        is_online: true,
        rating: 4.8,
        total_reviews: 234,
        total_calls: 567,
        rate_per_minute: 15,
    },
    DemoProfile {
        id: "demo_astro_2",
        name: "Priya Nair",
        bio: "Expert in Tarot and numerology. Helps clients navigate life transitions and find their true path.",
        photo_seed: "priya",
        languages: &["English", "Malayalam"],
        specialties: &["Tarot", "Numerology", "Relationships"],
        is_online: true,
        rating: 4.9,
        total_reviews: 412,
        total_calls: 890,
        rate_per_minute: 12,
    },
    DemoProfile {
        id: "demo_astro_3",
        name: "Dr. Arjun Mehta",
        bio: "PhD in Sanskrit with 15 years of Jyotish practice. Expert in Lal Kitab and remedies.",
        photo_seed: "arjun",
        languages: &["English", "Hindi", "Gujarati"],
        specialties: &["Lal Kitab", "Jyotish", "Remedies"],
        is_online: false,
        rating: 4.7,
        total_reviews: 178,
        total_calls: 340,
        rate_per_minute: 20,
    },
    DemoProfile {
        id: "demo_astro_4",
        name: "Sunita Rao",
        bio: "Palmistry and face reading specialist. 20 years of experience helping clients understand their destiny.",
        photo_seed: "sunita",
        languages: &["Telugu", "English", "Hindi"],
        specialties: &["Palmistry", "Face Reading", "Destiny"],
        is_online: true,
        rating: 4.6,
        total_reviews: 95,
        total_calls: 210,
        rate_per_minute: 10,
    },
];

/// Seed the demo astrologer directory.
pub async fn seed_astrologers(repo: &dyn AstrologerRepository) -> anyhow::Result<()> {
    let now = Utc::now().timestamp_millis();
    for profile in DEMO_ASTROLOGERS {
        repo.upsert(&Astrologer {
            id: profile.id.to_string(),
            name: profile.name.to_string(),
            bio: profile.bio.to_string(),
            photo_url: format!(
                "https://api.dicebear.com/7.x/personas/svg?seed={}",
                profile.photo_seed
            ),
            languages: profile.languages.iter().map(|s| s.to_string()).collect(),
            specialties: profile.specialties.iter().map(|s| s.to_string()).collect(),
            is_online: profile.is_online,
            rating: profile.rating,
            total_reviews: profile.total_reviews,
            total_calls: profile.total_calls,
            rate_per_minute: profile.rate_per_minute,
            created_at: now,
        })
        .await?;
    }
    tracing::info!(count = DEMO_ASTROLOGERS.len(), "Seeded demo astrologers");
    Ok(())
}
