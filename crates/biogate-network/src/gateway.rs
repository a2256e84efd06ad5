//! Narrow interface to the user/log backend.

#![allow(async_fn_in_trait)]

use crate::error::Result;
use biogate_core::{AuthOutcome, FaceEmbedding, SlotId};

/// Read-only access to reference embeddings and write-only access to the
/// authentication log.
pub trait BackendGateway: Send {
    /// Reference embedding enrolled for `slot`, or `None` if there is none.
    async fn fetch_embedding(&self, slot: SlotId) -> Result<Option<FaceEmbedding>>;

    /// Record one decided attempt.
    async fn submit_outcome(&self, outcome: &AuthOutcome) -> Result<()>;
}
