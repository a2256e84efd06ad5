//! Exponential backoff for backend calls.

use crate::error::Result;
use biogate_core::constants::{DEFAULT_BACKEND_BACKOFF_MS, DEFAULT_BACKEND_MAX_ATTEMPTS};
use std::time::Duration;
use tracing::warn;

/// Retry policy for one logical backend call.
///
/// `max_attempts` counts the first try. Only errors for which
/// [`GatewayError::is_transient`](crate::GatewayError::is_transient) holds are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_BACKEND_MAX_ATTEMPTS,
            initial_backoff: Duration::from_millis(DEFAULT_BACKEND_BACKOFF_MS),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based).
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Run `call` until it succeeds, fails permanently or attempts run out.
    ///
    /// # Errors
    /// Returns the last error observed.
    pub async fn run<T, F>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: AsyncFnMut() -> Result<T>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < max_attempts && e.is_transient() => {
                    let delay = self.backoff(attempt);
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Backend call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
