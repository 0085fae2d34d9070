//! Application state.

use std::sync::Arc;

use sqlx::PgPool;

use tmark_queue::{JobQueue, ProgressChannel};

use crate::auth::TokenVerifier;
use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub pool: PgPool,
    pub queue: Arc<JobQueue>,
    pub progress: Arc<ProgressChannel>,
    pub verifier: Arc<TokenVerifier>,
}

impl AppState {
    /// Create new application state, connecting to Postgres and Redis.
    pub async fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let pool = tmark_store::connect_from_env().await?;
        tmark_store::run_migrations(&pool).await?;

        let queue = JobQueue::from_env()?;
        queue.init().await?;

        let progress = ProgressChannel::from_env()?;
        let verifier = TokenVerifier::from_env().map_err(anyhow::Error::msg)?;

        Ok(Self {
            config,
            pool,
            queue: Arc::new(queue),
            progress: Arc::new(progress),
            verifier: Arc::new(verifier),
        })
    }
}
