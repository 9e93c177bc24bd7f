use axum::extract::State;
use serde::Serialize;
use services::sync::SyncMode;
use utils::response::ApiResponse;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SyncReport {
    pub items_processed: u64,
    pub items_changed: u64,
    pub items_errored: u64,
    pub duration_ms: u128,
}

/// Manually triggers a library sync (spec §4.H `Manual` mode). Returns a
/// typed conflict if a sync is already running rather than queuing one.
pub async fn trigger_sync(State(state): State<AppState>) -> Result<ApiResponse<SyncReport>, ApiError> {
    let outcome = state.sync_engine.run(SyncMode::Manual).await?;
    Ok(ApiResponse::success(SyncReport {
        items_processed: outcome.items_processed,
        items_changed: outcome.items_changed,
        items_errored: outcome.items_errored,
        duration_ms: outcome.duration.as_millis(),
    }))
}
