//! Bounded waiting on the tokio monotonic clock.
//!
//! [`poll_until`] drives a probe at a fixed interval until it yields a value
//! or the deadline passes. A probe that hangs is abandoned at the deadline,
//! so the whole call never outlives `timeout` by more than scheduling jitter.

use std::time::Duration;
use tokio::time::{Instant, sleep_until, timeout_at};

/// Point in time after which a bounded operation gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Instant);

impl Deadline {
    #[must_use]
    pub fn after(timeout: Duration) -> Self {
        Deadline(Instant::now() + timeout)
    }

    #[must_use]
    pub fn instant(&self) -> Instant {
        self.0
    }

    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.0.saturating_duration_since(Instant::now())
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.0
    }
}

/// Result of a bounded poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Ready(T),
    Expired,
}

impl<T> PollOutcome<T> {
    pub fn ready(self) -> Option<T> {
        match self {
            PollOutcome::Ready(value) => Some(value),
            PollOutcome::Expired => None,
        }
    }
}

/// Call `probe` every `interval` until it returns `Some` or `timeout` elapses.
///
/// The probe runs at least once. Errors from the probe end polling
/// immediately.
///
/// # Errors
/// Propagates the first error returned by `probe`.
pub async fn poll_until<T, E, F>(
    timeout: Duration,
    interval: Duration,
    mut probe: F,
) -> Result<PollOutcome<T>, E>
where
    F: AsyncFnMut() -> Result<Option<T>, E>,
{
    let deadline = Deadline::after(timeout);
    loop {
        match timeout_at(deadline.instant(), probe()).await {
            Err(_elapsed) => return Ok(PollOutcome::Expired),
            Ok(result) => {
                if let Some(value) = result? {
                    return Ok(PollOutcome::Ready(value));
                }
            }
        }

        let next = Instant::now() + interval;
        if next >= deadline.instant() {
            sleep_until(deadline.instant()).await;
            return Ok(PollOutcome::Expired);
        }
        sleep_until(next).await;
    }
}
