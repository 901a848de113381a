use crate::domain_port::StoreError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Run one store call under `limit`. An elapsed timeout becomes
/// [`StoreError::Unavailable`]; the call itself may still have committed.
pub(crate) async fn bounded<T, F>(limit: Duration, op: &'static str, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!(op, timeout_ms = limit.as_millis() as u64, "store call timed out");
            Err(StoreError::Unavailable(format!("{op} timed out")))
        }
    }
}
