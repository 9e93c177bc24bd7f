//! HTTP-boundary error aggregator (spec §7, §10.3). Each module owns its
//! own `thiserror` enum; this type collects them with `#[from]` and maps
//! each to a status code, mirroring the teacher's `ApiError` aggregator.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::StoreError;
use services::discord::DispatchError;
use services::jellyfin::JellyfinError;
use services::sync::SyncError;
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Jellyfin(#[from] JellyfinError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    /// Malformed or missing required inbound webhook fields (spec §7 `InvalidInput`).
    #[error("invalid request: {0}")]
    InvalidInput(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Store(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            ApiError::Jellyfin(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            ApiError::Dispatch(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            ApiError::Sync(SyncError::AlreadyRunning) => {
                (StatusCode::CONFLICT, self.to_string())
            }
            ApiError::Sync(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        };

        tracing::error!(status = status.as_u16(), error = %message, "request failed");
        (status, ApiResponse::<()>::error(&message)).into_response()
    }
}
