//! Connection pool setup and migrations.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::error::StoreResult;

/// Connect to Postgres with sensible pool limits.
pub async fn connect(database_url: &str) -> StoreResult<PgPool> {
    let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(10);

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .connect(database_url)
        .await?;

    info!(max_connections, "Connected to Postgres");
    Ok(pool)
}

/// Connect using `DATABASE_URL`.
pub async fn connect_from_env() -> StoreResult<PgPool> {
    let url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://localhost:5432/tubemarks".to_string());
    connect(&url).await
}

/// Apply pending migrations.
pub async fn run_migrations(pool: &PgPool) -> StoreResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| sqlx::Error::Migrate(Box::new(e)))?;
    info!("Migrations applied");
    Ok(())
}
