use axum::extract::State;
use axum::response::IntoResponse;
use db::StoreStats;
use serde::Serialize;
use utils::response::ApiResponse;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub sync_ready: bool,
    pub sync_in_progress: bool,
    pub items: Option<StoreStats>,
}

/// Liveness/readiness probe. Reports store stats and whether the initial
/// sync (if this was a first-ever startup) has completed.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let sync_ready = *state.sync_ready.borrow();
    let sync_in_progress = state.sync_engine.is_in_progress();

    match state.store.stats().await {
        Ok(stats) => ApiResponse::success(HealthReport { sync_ready, sync_in_progress, items: Some(stats) }),
        Err(err) => {
            tracing::warn!(error = %err, "health check could not read store stats");
            ApiResponse::success(HealthReport { sync_ready, sync_in_progress, items: None })
        }
    }
}
