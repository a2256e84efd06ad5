//! Local SQLite journal of authentication outcomes.
//!
//! Every decided attempt is written here before it is posted to the backend,
//! so an unreachable backend never loses a grant or deny record. Rows stay
//! pending until the post succeeds; pending rows are flushed oldest first on
//! the next successful submission.
//!
//! # Examples
//!
//! ```no_run
//! use biogate_core::{AuthOutcome, SlotId};
//! use biogate_storage::{AuthJournalRepository, Database, DatabaseConfig, SqliteAuthJournal};
//! use uuid::Uuid;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(DatabaseConfig::new("/var/lib/biogate/journal.db")).await?;
//! let journal = SqliteAuthJournal::new(db.pool().clone());
//!
//! let outcome = AuthOutcome::new(Uuid::new_v4(), SlotId::from_raw(7), true, 0.6);
//! journal.record(&outcome).await?;
//! assert_eq!(journal.count_pending().await?, 1);
//!
//! journal.mark_uploaded(outcome.attempt_id).await?;
//! # Ok(())
//! # }
//! ```
//!
//! All queries are parameterized; the schema lives in the workspace
//! `migrations/` directory and is embedded at compile time.

pub mod connection;
pub mod error;
pub mod journal;
pub mod models;

pub use connection::{Database, DatabaseConfig};
pub use error::{StorageError, StorageResult};
pub use journal::{AuthJournalRepository, SqliteAuthJournal};
pub use models::JournalEntry;
