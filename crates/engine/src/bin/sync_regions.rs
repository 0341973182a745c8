//! Pull the Catalyst region catalog once and persist it.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use leaderboard_core::store::RegionRefresher;
use leaderboard_db::PgStatsStore;
use leaderboard_engine::catalyst::CatalystRegionSync;
use leaderboard_engine::EngineConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "leaderboard_engine=debug,leaderboard_db=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = EngineConfig::from_env();
    tracing::info!(
        db_timeout = ?config.db_timeout,
        catalyst_enabled = config.catalyst_region_url.is_some(),
        "Loaded engine configuration",
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    let pool = leaderboard_db::create_pool(&database_url, config.db_timeout)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connection pool created");

    leaderboard_db::health_check(&pool)
        .await
        .context("Database health check failed")?;

    leaderboard_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    // --- Sync ---
    let store = Arc::new(PgStatsStore::new(pool));
    let sync = CatalystRegionSync::new(Arc::clone(&store), config.catalyst_region_url.clone());
    let counts = sync.pull_and_persist_regions().await;
    tracing::info!(
        inserted = counts.inserted,
        processed = counts.processed,
        "Region sync complete",
    );

    store.close().await;
    Ok(())
}
