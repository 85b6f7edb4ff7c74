use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("datastore error: {0}")]
    Db(#[from] tutordex_db::DbError),
}
