//! Rate-limited RPC call wrapper.
//!
//! The sole retry mechanism in the core: rate-limit responses are retried
//! with exponential backoff up to a fixed budget, any other error
//! propagates immediately. Backoff timers are local to each call site; two
//! monitors backing off at the same time is normal.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::RpcError;
use crate::metrics;

/// Backoff parameters for rate-limited calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Backoff duration for a given attempt (0-indexed), capped at
    /// `max_backoff`.
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let backoff_secs =
            self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        let capped = backoff_secs.min(self.max_backoff.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

/// Run `operation`, retrying only [`RpcError::RateLimited`] with exponential
/// backoff. Fatal errors and an exhausted budget propagate to the caller.
pub async fn with_backoff<F, T, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T, RpcError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RpcError>>,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(RpcError::RateLimited(message)) => {
                if !policy.should_retry(attempt) {
                    warn!(
                        attempt,
                        max = policy.max_retries,
                        error = %message,
                        "Rate-limit retry budget exhausted"
                    );
                    return Err(RpcError::RateLimited(message));
                }
                let backoff = policy.backoff_for_attempt(attempt);
                metrics::record_rpc_retry();
                warn!(
                    attempt,
                    max = policy.max_retries,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %message,
                    "Rate limited, backing off"
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(other) => return Err(other),
        }
    }
}
