//! Mock face embedding model.

use crate::error::{HardwareError, Result};
use crate::traits::FaceEmbedder;
use crate::types::ImageFrame;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct State {
    queued: VecDeque<Result<Vec<Vec<f32>>>>,
    default_faces: Vec<Vec<f32>>,
    calls: usize,
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Answers with queued results, then with the default face list (initially
/// no face).
#[derive(Debug)]
pub struct MockEmbedder {
    state: Arc<Mutex<State>>,
}

impl MockEmbedder {
    pub fn new() -> (Self, MockEmbedderHandle) {
        let state = Arc::new(Mutex::new(State {
            queued: VecDeque::new(),
            default_faces: Vec::new(),
            calls: 0,
        }));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockEmbedderHandle { state },
        )
    }
}

impl FaceEmbedder for MockEmbedder {
    async fn embeddings(&mut self, _frame: &ImageFrame) -> Result<Vec<Vec<f32>>> {
        let mut state = lock(&self.state);
        state.calls += 1;
        match state.queued.pop_front() {
            Some(result) => result,
            None => Ok(state.default_faces.clone()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MockEmbedderHandle {
    state: Arc<Mutex<State>>,
}

impl MockEmbedderHandle {
    /// Next call detects one face with this vector.
    pub fn queue_face(&self, vector: Vec<f32>) {
        lock(&self.state).queued.push_back(Ok(vec![vector]));
    }

    /// Next call detects no face.
    pub fn queue_no_face(&self) {
        lock(&self.state).queued.push_back(Ok(Vec::new()));
    }

    /// Next call fails as if the model service were down.
    pub fn queue_unavailable(&self, message: impl Into<String>) {
        lock(&self.state)
            .queued
            .push_back(Err(HardwareError::embedder_unavailable(message)));
    }

    pub fn set_default_face(&self, vector: Vec<f32>) {
        lock(&self.state).default_faces = vec![vector];
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        lock(&self.state).calls
    }
}
