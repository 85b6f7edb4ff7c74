use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("geocoding request failed: {0}")]
    Geocoding(#[from] reqwest::Error),
}
