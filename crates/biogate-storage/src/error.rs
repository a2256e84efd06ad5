use biogate_core::ErrorKind;
use thiserror::Error;

/// Journal errors.
///
/// None of these affect an access decision; callers log them and move on.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database connection or query execution failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored row cannot be turned back into a domain value
    #[error("Corrupt journal row {id}: {reason}")]
    CorruptRow { id: i64, reason: String },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl StorageError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Database(_) | Self::Migration(_) | Self::CorruptRow { .. } => ErrorKind::Storage,
        }
    }
}

/// Specialized result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
