use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("telegram send failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("telegram API returned an error: {0}")]
    Api(String),

    #[error("fallback sink write failed: {0}")]
    Sink(#[from] std::io::Error),
}
