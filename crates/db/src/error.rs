use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("item not found: {0}")]
    NotFound(String),

    #[error("invalid fingerprint stored for item {0}")]
    InvalidFingerprint(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
