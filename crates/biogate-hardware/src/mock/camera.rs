//! Mock still camera.

use crate::error::{HardwareError, Result};
use crate::traits::FrameSource;
use crate::types::ImageFrame;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug)]
struct State {
    queued: VecDeque<Result<Bytes>>,
    default_frame: Bytes,
    delay: Duration,
    captures: usize,
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Returns queued frames first, then a fixed default frame.
#[derive(Debug)]
pub struct MockCamera {
    state: Arc<Mutex<State>>,
}

impl MockCamera {
    pub fn new() -> (Self, MockCameraHandle) {
        let state = Arc::new(Mutex::new(State {
            queued: VecDeque::new(),
            default_frame: Bytes::from_static(b"\xFF\xD8mock-frame\xFF\xD9"),
            delay: Duration::ZERO,
            captures: 0,
        }));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockCameraHandle { state },
        )
    }
}

impl FrameSource for MockCamera {
    async fn capture(&mut self) -> Result<ImageFrame> {
        let delay = lock(&self.state).delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let mut state = lock(&self.state);
        state.captures += 1;
        let bytes = match state.queued.pop_front() {
            Some(result) => result?,
            None => state.default_frame.clone(),
        };
        Ok(ImageFrame::new(bytes))
    }
}

#[derive(Debug, Clone)]
pub struct MockCameraHandle {
    state: Arc<Mutex<State>>,
}

impl MockCameraHandle {
    pub fn queue_frame(&self, bytes: impl Into<Bytes>) {
        lock(&self.state).queued.push_back(Ok(bytes.into()));
    }

    /// Make the next capture fail.
    pub fn queue_failure(&self, message: impl Into<String>) {
        lock(&self.state)
            .queued
            .push_back(Err(HardwareError::capture_failed(message)));
    }

    /// Delay every capture (simulates a hung camera when long enough).
    pub fn set_delay(&self, delay: Duration) {
        lock(&self.state).delay = delay;
    }

    #[must_use]
    pub fn captures(&self) -> usize {
        lock(&self.state).captures
    }
}
