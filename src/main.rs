//! AstroCall - call-session backend for a video astrology marketplace

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use astrocall::{
    api::{self, AppState},
    config::Config,
    db::{
        self,
        repositories::{
            SqlxAstrologerRepository, SqlxCallSessionRepository, SqlxChatMessageRepository,
            SqlxReviewRepository,
        },
    },
    services::{
        AstrologerService, ChatService, ReviewService, RoomTokenService, SessionNotifier,
        SessionService,
    },
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "astrocall=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting AstroCall backend...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Create repositories
    let session_repo = SqlxCallSessionRepository::boxed(pool.clone());
    let astro_repo = SqlxAstrologerRepository::boxed(pool.clone());
    let review_repo = SqlxReviewRepository::boxed(pool.clone());
    let chat_repo = SqlxChatMessageRepository::boxed(pool.clone());

    // Demo mode: seed the astrologer directory
    #[cfg(feature = "demo")]
    {
        astrocall::services::demo::seed_astrologers(astro_repo.as_ref()).await?;
    }

    // Wire services
    let notifier = Arc::new(SessionNotifier::new());
    let session_service = Arc::new(SessionService::new(
        session_repo.clone(),
        astro_repo.clone(),
        notifier.clone(),
    ));
    let chat_service = Arc::new(ChatService::new(chat_repo, session_repo.clone()));
    let review_service = Arc::new(ReviewService::new(review_repo, session_repo.clone()));
    let astrologer_service = Arc::new(AstrologerService::new(astro_repo));
    let room_token_service = Arc::new(RoomTokenService::new(
        config.livekit.clone(),
        session_repo,
    ));

    if config.livekit.credentials().is_none() {
        tracing::warn!("LiveKit credentials not configured, token issuance disabled");
    }

    // Periodic sweep of stale pending sessions
    session_service.spawn_sweeper(&config.sessions);

    let state = AppState {
        sessions: session_service,
        chat: chat_service,
        reviews: review_service,
        astrologers: astrologer_service,
        room_tokens: room_token_service,
    };

    // Build router
    let app = api::build_router(state, &config.server.cors_origin);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
