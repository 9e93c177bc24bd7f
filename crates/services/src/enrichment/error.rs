use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("provider request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("provider returned no usable identifier")]
    NoIdentifier,
}
