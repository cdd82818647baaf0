//! Caller-side retry for throttled operations
//!
//! Neither the transport nor the pagination engine retries. Callers that want
//! to ride out a 429 wrap the whole operation here: only `RateLimited`
//! failures (including a partial collection whose failed page was throttled)
//! are retried, every other error is returned as-is.

use crate::error::{Error, Result};
use crate::types::Backoff;
use std::future::Future;
use tracing::warn;

/// Run `op`, retrying up to `max_retries` times when it fails with
/// `RateLimited`
pub async fn retry_rate_limited<T, E, F, Fut>(backoff: &Backoff, max_retries: u32, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Into<Error>,
{
    let mut attempt = 0;
    loop {
        let error: Error = match op().await {
            Ok(value) => return Ok(value),
            Err(e) => e.into(),
        };

        let Some(retry_after) = retry_after_seconds(&error) else {
            return Err(error);
        };
        if attempt >= max_retries {
            return Err(error);
        }

        let delay = backoff.delay_with_hint(attempt, retry_after);
        warn!(
            "Rate limited, attempt {}/{}, waiting {:?}",
            attempt + 1,
            max_retries,
            delay
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

fn retry_after_seconds(error: &Error) -> Option<u64> {
    match error {
        Error::RateLimited {
            retry_after_seconds,
        } => Some(*retry_after_seconds),
        Error::PartialPageFailure { source, .. } => retry_after_seconds(source),
        _ => None,
    }
}
