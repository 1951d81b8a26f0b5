//! Per-item retry loop
//!
//! Every work item drawn by a pool worker runs through [`run_with_retries`]:
//! the operation is attempted once, then retried immediately up to
//! `max_retries` more times. No backoff is applied between attempts.
//!
//! Cancellation is checked before every attempt and raced against the
//! attempt itself, so a cancelled run stops promptly without starting new work.
//!
//! # Example
//!
//! ```no_run
//! use nuget_assembly::retry::run_with_retries;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> nuget_assembly::Result<()> {
//! let cancel = CancellationToken::new();
//! let body = run_with_retries(3, &cancel, || async {
//!     // Your operation here
//!     Ok::<_, nuget_assembly::Error>("page body".to_string())
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use std::future::Future;
use tokio_util::sync::CancellationToken;

// TODO: optional jittered backoff between attempts (see config::PoolConfig).

/// Execute an async operation, retrying immediately on failure
///
/// # Arguments
///
/// * `max_retries` - Additional attempts after the first one (total = `max_retries + 1`)
/// * `cancel` - Shared cancellation token, checked before each attempt
/// * `operation` - Async closure producing one attempt
///
/// # Returns
///
/// The first successful result, [`Error::Cancelled`] if cancellation was
/// observed, or [`Error::RetriesExhausted`] wrapping the final attempt's error.
pub async fn run_with_retries<F, Fut, T>(
    max_retries: u32,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            result = operation() => result,
        };

        match result {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) if attempt < max_retries => {
                attempt += 1;

                tracing::warn!(
                    error = %e,
                    code = e.error_code(),
                    class = ?e.class(),
                    attempt = attempt,
                    max_retries = max_retries,
                    "Operation failed, retrying"
                );
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    code = e.error_code(),
                    attempts = attempt + 1,
                    "Operation failed after all retry attempts exhausted"
                );
                return Err(Error::RetriesExhausted {
                    attempts: attempt + 1,
                    source: Box::new(e),
                });
            }
        }
    }
}
