use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EarlyWarningError>;

#[derive(Debug, Error)]
pub enum EarlyWarningError {
    #[error("model artifact missing: {}", .path.display())]
    ArtifactMissing { path: PathBuf },

    #[error("model artifact {} is invalid: {reason}", .path.display())]
    ArtifactInvalid { path: PathBuf, reason: String },

    #[error("feature schema mismatch: expected {expected} columns, got {got}")]
    SchemaMismatch { expected: usize, got: usize },

    #[error("student {0} already exists")]
    DuplicateKey(String),

    #[error("invalid student record: {0}")]
    InvalidRecord(String),

    #[error("invalid intervention entry: {0}")]
    InvalidEntry(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
