//! Error types for the archive store.
//!
//! The calibrator only understands [`ArchiveError`], so every [`DbError`]
//! is flattened into [`ArchiveError::Backend`] at the trait boundary.

use werewolf_calibrator::ArchiveError;

/// Errors raised by the `PostgreSQL` archive.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A query or connection failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// The embedded schema migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A match record could not be turned into JSON.
    #[error("record encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    /// A column value does not fit the Rust type it maps to.
    #[error("value out of range: {0}")]
    OutOfRange(String),

    /// The database URL is unusable.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<DbError> for ArchiveError {
    fn from(err: DbError) -> Self {
        Self::Backend {
            reason: err.to_string(),
        }
    }
}
