use thiserror::Error;

/// Errors from the match store and usage ledger backends
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to (de)serialize state: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("state file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that fail a whole poll tick
#[derive(Error, Debug)]
pub enum PollError {
    #[error("match store failed: {0}")]
    Store(#[from] StoreError),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
