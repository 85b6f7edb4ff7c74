use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("transient network error: {0}")]
    Network(String),

    /// Auth/session failures are fatal — the process should exit non-zero
    /// so an external supervisor restarts it.
    #[error("authentication/session error: {0}")]
    Auth(String),

    #[error("datastore error: {0}")]
    Db(#[from] tutordex_db::error::DbError),
}
