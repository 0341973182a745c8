//! PostgreSQL persistence for the leaderboard.
//!
//! Pool construction, migrations, and [`PgStatsStore`], the sqlx-backed
//! implementation of [`leaderboard_core::store::StatsStore`].

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;

pub mod filter;
pub mod models;
pub mod repositories;
pub mod store;

pub use store::PgStatsStore;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
///
/// `acquire_timeout` bounds how long a caller waits for a free connection.
pub async fn create_pool(
    database_url: &str,
    acquire_timeout: Duration,
) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(acquire_timeout)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to confirm the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply the embedded schema migrations.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
