//! Mock output line recording every level it is driven to.

use crate::error::{HardwareError, Result};
use crate::traits::SignalLine;
use crate::types::SignalLevel;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct State {
    level: SignalLevel,
    history: Vec<SignalLevel>,
    fail_high: bool,
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
pub struct MockSignalLine {
    state: Arc<Mutex<State>>,
}

impl MockSignalLine {
    pub fn new() -> (Self, MockSignalLineHandle) {
        let state = Arc::new(Mutex::new(State {
            level: SignalLevel::Low,
            history: Vec::new(),
            fail_high: false,
        }));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockSignalLineHandle { state },
        )
    }
}

impl SignalLine for MockSignalLine {
    fn set_level(&mut self, level: SignalLevel) -> Result<()> {
        let mut state = lock(&self.state);
        if level.is_high() && state.fail_high {
            return Err(HardwareError::communication("mock line refused HIGH"));
        }
        state.level = level;
        state.history.push(level);
        Ok(())
    }

    fn level(&self) -> SignalLevel {
        lock(&self.state).level
    }
}

#[derive(Debug, Clone)]
pub struct MockSignalLineHandle {
    state: Arc<Mutex<State>>,
}

impl MockSignalLineHandle {
    #[must_use]
    pub fn level(&self) -> SignalLevel {
        lock(&self.state).level
    }

    /// Every level written, in order.
    #[must_use]
    pub fn history(&self) -> Vec<SignalLevel> {
        lock(&self.state).history.clone()
    }

    /// Number of times the line went HIGH.
    #[must_use]
    pub fn high_count(&self) -> usize {
        lock(&self.state)
            .history
            .iter()
            .filter(|l| l.is_high())
            .count()
    }

    /// Make HIGH writes fail.
    pub fn fail_high(&self, fail: bool) {
        lock(&self.state).fail_high = fail;
    }
}
