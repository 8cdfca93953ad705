use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("cache error: {0}")]
    Cache(#[from] redis::RedisError),
    #[error("row not found")]
    NotFound,
    #[error("serial batch lock is already held")]
    LockHeld,
    #[error("character data is malformed: {0}")]
    BadCharacterData(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether this is the plain "no such row" case rather than an
    /// infrastructure failure.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::NotFound | StoreError::Db(sqlx::Error::RowNotFound)
        )
    }

    /// Whether an insert lost to a unique index. Concurrent duplicate
    /// character creations are decided here, not at the pre-check.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            StoreError::Db(sqlx::Error::Database(e)) => e.is_unique_violation(),
            _ => false,
        }
    }
}
