use thiserror::Error;

#[derive(Debug, Error)]
pub enum JellyfinError {
    #[error("request to jellyfin failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("jellyfin returned an error status: {status}")]
    Status { status: reqwest::StatusCode },

    #[error("not connected to jellyfin")]
    NotConnected,

    #[error("item {0} not found")]
    NotFound(String),
}

pub type JellyfinResult<T> = Result<T, JellyfinError>;
