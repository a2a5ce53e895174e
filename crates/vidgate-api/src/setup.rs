//! Application wiring: repositories, video store, services, routes.

use anyhow::{Context, Result};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use vidgate_core::Config;
use vidgate_db::{
    InMemoryRateLimitRepository, InMemorySessionRepository, InMemoryVideoRecordRepository,
    PgRateLimitRepository, PgSessionRepository, PgVideoRecordRepository, RateLimitRepository,
    SessionRepository, VideoRecordRepository,
};
use vidgate_services::{
    ChunkTransport, Clock, ConfirmationService, PlaybackService, Sleeper, StaleUploadReaper,
    SystemClock, TokioSleeper, UploadSessionService,
};
use vidgate_storage::build_video_store;

use crate::routes::build_router;
use crate::state::AppState;

struct Repositories {
    sessions: Arc<dyn SessionRepository>,
    records: Arc<dyn VideoRecordRepository>,
    rate_limits: Arc<dyn RateLimitRepository>,
}

async fn setup_repositories(config: &Config) -> Result<Repositories> {
    match config.server.database_url {
        Some(ref database_url) => {
            tracing::info!("Connecting to database...");
            let pool = PgPoolOptions::new()
                .max_connections(config.server.db_max_connections)
                .acquire_timeout(Duration::from_secs(30))
                .idle_timeout(Duration::from_secs(600))
                .max_lifetime(Duration::from_secs(1800))
                .connect(database_url)
                .await?;

            // Run pending migrations on startup (path: workspace migrations/
            // from crate root)
            let migrations_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../migrations");
            let migrator = sqlx::migrate::Migrator::new(migrations_dir)
                .await
                .context("Failed to load migrations")?;
            migrator
                .run(&pool)
                .await
                .context("Failed to run database migrations")?;
            tracing::info!("Database connected and migrations applied");

            Ok(Repositories {
                sessions: Arc::new(PgSessionRepository::new(pool.clone())),
                records: Arc::new(PgVideoRecordRepository::new(pool.clone())),
                rate_limits: Arc::new(PgRateLimitRepository::new(pool)),
            })
        }
        None => {
            tracing::warn!(
                "DATABASE_URL not set; using in-memory repositories (state is lost on restart)"
            );
            Ok(Repositories {
                sessions: Arc::new(InMemorySessionRepository::new()),
                records: Arc::new(InMemoryVideoRecordRepository::new()),
                rate_limits: Arc::new(InMemoryRateLimitRepository::new()),
            })
        }
    }
}

/// Initialize repositories, services, and the router.
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, Router)> {
    let repos = setup_repositories(&config).await?;
    let store = build_video_store(&config)
        .map_err(|e| anyhow::anyhow!("Failed to build video store: {}", e))?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let sleeper: Arc<dyn Sleeper> = Arc::new(TokioSleeper);

    let sessions = UploadSessionService::new(
        repos.sessions.clone(),
        repos.records.clone(),
        repos.rate_limits.clone(),
        store.clone(),
        clock.clone(),
        sleeper.clone(),
        &config,
    );
    let transport = ChunkTransport::new(
        repos.sessions.clone(),
        store.clone(),
        clock.clone(),
        sleeper.clone(),
        &config,
    );
    let confirmation = ConfirmationService::new(
        repos.sessions.clone(),
        repos.records.clone(),
        store.clone(),
        clock.clone(),
        sleeper.clone(),
        &config,
    );
    let playback = PlaybackService::new(
        repos.records.clone(),
        repos.rate_limits.clone(),
        store.clone(),
        clock.clone(),
        &config,
    )
    .map_err(|e| anyhow::anyhow!("Failed to build playback service: {}", e))?;
    let reaper = Arc::new(StaleUploadReaper::new(
        repos.sessions,
        repos.records,
        store,
        clock,
        &config,
    ));

    let state = Arc::new(AppState {
        config: config.clone(),
        sessions,
        transport,
        confirmation,
        playback,
        reaper,
    });

    let router = build_router(&config, state.clone())?;

    Ok((state, router))
}
