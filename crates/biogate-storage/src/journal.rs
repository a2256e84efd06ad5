#![allow(async_fn_in_trait)]

use crate::error::StorageResult;
use crate::models::JournalEntry;
use biogate_core::AuthOutcome;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

/// Store-and-forward journal of authentication outcomes.
pub trait AuthJournalRepository: Send + Sync {
    /// Journal a decided attempt. Recording the same attempt twice is a no-op.
    async fn record(&self, outcome: &AuthOutcome) -> StorageResult<()>;

    /// Flag an attempt as delivered. Returns `false` if it was unknown or
    /// already uploaded.
    async fn mark_uploaded(&self, attempt_id: Uuid) -> StorageResult<bool>;

    /// Undelivered attempts, oldest first.
    async fn pending(&self, limit: i64) -> StorageResult<Vec<JournalEntry>>;

    async fn count_pending(&self) -> StorageResult<i64>;

    /// Most recent attempts, newest first.
    async fn recent(&self, limit: i64) -> StorageResult<Vec<JournalEntry>>;
}

/// SQLite implementation of [`AuthJournalRepository`].
#[derive(Debug, Clone)]
pub struct SqliteAuthJournal {
    pool: SqlitePool,
}

impl SqliteAuthJournal {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl AuthJournalRepository for SqliteAuthJournal {
    async fn record(&self, outcome: &AuthOutcome) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO auth_journal (attempt_id, slot_id, matched, distance, timestamp)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (attempt_id) DO NOTHING
            "#,
        )
        .bind(outcome.attempt_id.to_string())
        .bind(i64::from(outcome.slot_id.as_u16()))
        .bind(outcome.matched)
        .bind(outcome.distance)
        .bind(outcome.timestamp)
        .execute(&self.pool)
        .await?;

        debug!(attempt_id = %outcome.attempt_id, "Outcome journaled");
        Ok(())
    }

    async fn mark_uploaded(&self, attempt_id: Uuid) -> StorageResult<bool> {
        let result = sqlx::query(
            "UPDATE auth_journal SET uploaded = 1 WHERE attempt_id = ? AND uploaded = 0",
        )
        .bind(attempt_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn pending(&self, limit: i64) -> StorageResult<Vec<JournalEntry>> {
        let entries = sqlx::query_as::<_, JournalEntry>(
            r#"
            SELECT id, attempt_id, slot_id, matched, distance,
                   timestamp, uploaded, created_at
            FROM auth_journal
            WHERE uploaded = 0
            ORDER BY id ASC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn count_pending(&self) -> StorageResult<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM auth_journal WHERE uploaded = 0")
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn recent(&self, limit: i64) -> StorageResult<Vec<JournalEntry>> {
        let entries = sqlx::query_as::<_, JournalEntry>(
            r#"
            SELECT id, attempt_id, slot_id, matched, distance,
                   timestamp, uploaded, created_at
            FROM auth_journal
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}
