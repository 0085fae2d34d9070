//! Worker configuration.

use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Concurrency cap: enrichment runs in flight at once
    pub max_concurrent_jobs: usize,
    /// Per-stage retry budget
    pub stage_retries: u32,
    /// Wall-clock timeout for the metadata stage
    pub metadata_timeout: Duration,
    /// Wall-clock timeout for the captions stage (the speech-to-text
    /// fallback is slow)
    pub captions_timeout: Duration,
    /// Wall-clock timeout for the chapters stage
    pub chapters_timeout: Duration,
    /// Minimum spacing of non-terminal progress events per video
    pub progress_throttle: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 8,
            stage_retries: 3,
            metadata_timeout: Duration::from_secs(20),
            captions_timeout: Duration::from_secs(60),
            chapters_timeout: Duration::from_secs(20),
            progress_throttle: Duration::from_millis(250),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        fn env_u64(key: &str) -> Option<u64> {
            std::env::var(key).ok().and_then(|s| s.parse().ok())
        }

        Self {
            max_concurrent_jobs: env_u64("WORKER_CONCURRENCY")
                .map(|v| v as usize)
                .unwrap_or(defaults.max_concurrent_jobs),
            stage_retries: env_u64("STAGE_RETRIES")
                .map(|v| v as u32)
                .unwrap_or(defaults.stage_retries),
            metadata_timeout: env_u64("STAGE_TIMEOUT_METADATA_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.metadata_timeout),
            captions_timeout: env_u64("STAGE_TIMEOUT_CAPTIONS_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.captions_timeout),
            chapters_timeout: env_u64("STAGE_TIMEOUT_CHAPTERS_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.chapters_timeout),
            progress_throttle: env_u64("PROGRESS_THROTTLE_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.progress_throttle),
        }
    }
}
