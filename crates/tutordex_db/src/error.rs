use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("job {0} is not owned by claimant {1}")]
    NotOwner(i64, String),

    #[error("job {0} not found")]
    JobNotFound(i64),
}
