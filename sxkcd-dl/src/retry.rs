//! Retry with exponential backoff for upstream requests
//!
//! **Algorithm:**
//! 1. Attempt operation
//! 2. If successful, return result
//! 3. If the error is retryable and attempts remain:
//!    sleep `base * 2^(retry-1)` plus up to half that again as jitter, retry
//! 4. If the error is not retryable, or this was the last attempt, return it
//!
//! Cancellation is checked before every attempt and interrupts the backoff
//! sleep. An attempt already in flight is never interrupted.

use crate::error::FetchError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Attempt budget and backoff schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first try included
    pub max_attempts: u32,
    /// Sleep before the first retry
    pub base_delay: Duration,
    /// Add up to `delay / 2` of random jitter to each sleep
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(30))
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            jitter: true,
        }
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Sleep before retry number `retry` (1 = sleep before the second attempt)
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1u32 << exponent);
        if !self.jitter {
            return delay;
        }

        let max_jitter_ms = (delay.as_millis() / 2).min(u64::MAX as u128) as u64;
        let jitter_ms = rand::thread_rng().gen_range(0..=max_jitter_ms);
        delay.saturating_add(Duration::from_millis(jitter_ms))
    }
}

/// Run `operation` under `policy`.
///
/// Returns the first success, the first non-retryable error, `Cancelled`, or
/// the last error once the attempt budget is spent.
pub async fn retry<F, Fut, T>(
    operation_name: &str,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        attempt += 1;
        if attempt > 1 {
            tracing::debug!(operation = operation_name, attempt, "Retrying request");
        }

        let err = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        "Request succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if !err.is_retryable() {
            return Err(err);
        }

        if attempt >= max_attempts {
            tracing::warn!(
                operation = operation_name,
                attempt,
                error = %err,
                "Request failed: retry attempts exhausted"
            );
            return Err(err);
        }

        let backoff = policy.backoff(attempt);
        tracing::warn!(
            operation = operation_name,
            attempt,
            backoff_ms = backoff.as_millis() as u64,
            error = %err,
            "Request failed, will retry after backoff"
        );

        tokio::select! {
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            _ = tokio::time::sleep(backoff) => {}
        }
    }
}
