//! Retry loop: run an attempt until success or the policy says stop.

use super::classify::is_transient;
use super::policy::RetryConfig;
use crate::downloader::Handlers;
use crate::part::PartError;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Runs `op` until it succeeds, fails fatally, or the retry budget runs
/// out. `op` receives the 0-based attempt index; attempts after the
/// first must resume from the current byte count themselves.
///
/// Emits `retry` before each backoff sleep and `retry_exhausted` when
/// the budget is spent. Cancellation aborts immediately, including
/// mid-sleep.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryConfig,
    cancel: &CancellationToken,
    hash: &str,
    events: &Arc<dyn Handlers>,
    mut op: F,
) -> Result<T, PartError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, PartError>>,
{
    let mut retries = 0u32;
    loop {
        match op(retries).await {
            Ok(v) => return Ok(v),
            Err(e) if !is_transient(&e) => return Err(e),
            Err(e) => {
                retries += 1;
                if retries > policy.max_retries {
                    events.retry_exhausted(hash, retries - 1, &e);
                    return Err(PartError::RetryExhausted {
                        attempts: retries - 1,
                        last: Box::new(e),
                    });
                }
                let delay = policy.delay_for(retries);
                tracing::debug!(
                    part = hash,
                    attempt = retries,
                    max = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "segment attempt failed, backing off"
                );
                events.retry(hash, retries, policy.max_retries, delay, &e);
                tokio::select! {
                    _ = cancel.cancelled() => return Err(PartError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}
