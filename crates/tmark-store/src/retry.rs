//! Transaction conflict retry.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::{StoreError, StoreResult};

/// Conflict retries before giving up.
const MAX_TX_RETRIES: u32 = 3;

/// Base delay between conflict retries; doubles per attempt.
const TX_RETRY_BASE: Duration = Duration::from_millis(25);

/// Run a transactional operation, retrying on serialization conflicts and
/// deadlocks with a small backoff. Domain errors pass through untouched.
pub async fn with_tx_retry<F, Fut, T>(operation_name: &str, operation: F) -> StoreResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_tx_conflict() && attempt < MAX_TX_RETRIES => {
                attempt += 1;
                let delay = TX_RETRY_BASE * 2u32.pow(attempt - 1);
                debug!(
                    "{} hit a transaction conflict (attempt {}), retrying in {:?}",
                    operation_name, attempt, delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn passes_through_success() {
        let result = with_tx_retry("test", || async { Ok::<_, StoreError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn does_not_retry_domain_errors() {
        let calls = AtomicU32::new(0);
        let result: StoreResult<()> = with_tx_retry("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(StoreError::not_found("video")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
