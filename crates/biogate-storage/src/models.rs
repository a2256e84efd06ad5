use crate::error::{StorageError, StorageResult};
use biogate_core::{AuthOutcome, SlotId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One row of `auth_journal`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct JournalEntry {
    pub id: i64,
    pub attempt_id: String,
    pub slot_id: i64,
    pub matched: bool,
    pub distance: f64,
    /// Decision time.
    pub timestamp: DateTime<Utc>,
    pub uploaded: bool,
    /// Insertion time.
    pub created_at: DateTime<Utc>,
}

impl JournalEntry {
    /// Rebuild the outcome for re-submission.
    ///
    /// # Errors
    /// `CorruptRow` if the attempt id or slot id no longer parse.
    pub fn to_outcome(&self) -> StorageResult<AuthOutcome> {
        let attempt_id = Uuid::parse_str(&self.attempt_id).map_err(|e| StorageError::CorruptRow {
            id: self.id,
            reason: format!("attempt_id: {e}"),
        })?;
        let slot = u16::try_from(self.slot_id).map_err(|_| StorageError::CorruptRow {
            id: self.id,
            reason: format!("slot_id {} out of range", self.slot_id),
        })?;

        Ok(AuthOutcome {
            attempt_id,
            slot_id: SlotId::from_raw(slot),
            matched: self.matched,
            distance: self.distance,
            timestamp: self.timestamp,
        })
    }
}
