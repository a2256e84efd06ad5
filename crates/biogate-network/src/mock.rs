//! In-memory [`BackendGateway`] for tests.

use crate::error::{GatewayError, Result};
use crate::gateway::BackendGateway;
use biogate_core::{AuthOutcome, FaceEmbedding, SlotId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Default)]
struct State {
    references: HashMap<SlotId, FaceEmbedding>,
    fetches: Vec<SlotId>,
    submitted: Vec<AuthOutcome>,
    failing_fetches: u32,
    failing_submits: u32,
    submit_delay: Duration,
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Gateway backed by a map of references; records every submission.
#[derive(Debug, Clone)]
pub struct MockGateway {
    state: Arc<Mutex<State>>,
}

impl MockGateway {
    pub fn new() -> (Self, MockGatewayHandle) {
        let state = Arc::new(Mutex::new(State::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockGatewayHandle { state },
        )
    }
}

impl BackendGateway for MockGateway {
    async fn fetch_embedding(&self, slot: SlotId) -> Result<Option<FaceEmbedding>> {
        let mut state = lock(&self.state);
        state.fetches.push(slot);
        if state.failing_fetches > 0 {
            state.failing_fetches -= 1;
            return Err(GatewayError::status(503, "backend unavailable"));
        }
        Ok(state.references.get(&slot).cloned())
    }

    async fn submit_outcome(&self, outcome: &AuthOutcome) -> Result<()> {
        let delay = lock(&self.state).submit_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let mut state = lock(&self.state);
        if state.failing_submits > 0 {
            state.failing_submits -= 1;
            return Err(GatewayError::status(503, "backend unavailable"));
        }
        state.submitted.push(outcome.clone());
        Ok(())
    }
}

/// Handle for controlling a [`MockGateway`].
#[derive(Debug, Clone)]
pub struct MockGatewayHandle {
    state: Arc<Mutex<State>>,
}

impl MockGatewayHandle {
    pub fn set_reference(&self, slot: SlotId, embedding: FaceEmbedding) {
        lock(&self.state).references.insert(slot, embedding);
    }

    /// The next `count` fetches fail with a 503.
    pub fn fail_fetches(&self, count: u32) {
        lock(&self.state).failing_fetches = count;
    }

    /// The next `count` submissions fail with a 503.
    pub fn fail_submits(&self, count: u32) {
        lock(&self.state).failing_submits = count;
    }

    pub fn set_submit_delay(&self, delay: Duration) {
        lock(&self.state).submit_delay = delay;
    }

    pub fn fetches(&self) -> Vec<SlotId> {
        lock(&self.state).fetches.clone()
    }

    pub fn submitted(&self) -> Vec<AuthOutcome> {
        lock(&self.state).submitted.clone()
    }
}
