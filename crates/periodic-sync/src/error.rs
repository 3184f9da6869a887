use periodic_registry::ConfigurationError;
use thiserror::Error;

/// Errors that abort a reconciliation pass. Nothing is retried or skipped.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A definition's schedule could not be turned into a schedule row.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// A task row with the registered name exists but was not created by the
    /// sync engine. It is never overwritten.
    #[error("Task '{name}' already exists and is not managed by periodic sync (description: '{description}')")]
    OwnershipConflict { name: String, description: String },

    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Persistence(#[from] rusqlite::Error),

    /// Stored args/kwargs could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The row disappeared between lookup and write.
    #[error("Task row not found: {id}")]
    TaskNotFound { id: i64 },
}

pub type Result<T> = std::result::Result<T, SyncError>;
