//! Webhook Ingress (spec §4.I): the single endpoint Jellyfin's webhook
//! plugin posts to on library events.

use std::time::{Duration, Instant};

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use services::jellyfin::payload::convert_webhook_to_record;
use utils::response::ApiResponse;

use crate::error::ApiError;
use crate::state::AppState;

const SYNC_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
pub struct IngressReport {
    pub item_id: String,
    pub item_name: String,
    pub action: &'static str,
    pub changes_count: usize,
    pub processing_time_ms: u128,
}

pub async fn ingress(State(state): State<AppState>, Json(body): Json<Value>) -> Result<ApiResponse<IngressReport>, ApiError> {
    let start = Instant::now();

    wait_for_initial_sync(&state).await;

    let mut record = convert_webhook_to_record(&body)
        .ok_or_else(|| ApiError::InvalidInput("missing ItemId/Name/ItemType".to_string()))?;

    // Prefer the pulled copy (full media streams) over the payload-only
    // conversion, falling back silently when upstream is unreachable.
    if let Ok(pulled) = state.jellyfin.get_item(&record.id).await {
        record = pulled;
    }

    let existing_fingerprint = state.store.get_fingerprint(&record.id).await?;

    let (action, change_count) = match existing_fingerprint {
        None => {
            state.store.save(&record).await?;
            state.pipeline.notify_new(&record).await?;
            ("new_item", 0)
        }
        Some(existing) if existing == record.fingerprint() => ("no_changes", 0),
        Some(_) => {
            let prior = state.store.get(&record.id).await?;
            state.store.save(&record).await?;
            match prior {
                Some(prior) => {
                    let result = state.pipeline.notify_change(&prior, &record).await?;
                    match result.action {
                        services::pipeline::PipelineAction::UpgradedItem => ("upgraded_item", result.change_count),
                        _ => ("hash_updated", 0),
                    }
                }
                None => ("hash_updated", 0),
            }
        }
    };

    Ok(ApiResponse::success(IngressReport {
        item_id: record.id,
        item_name: record.name,
        action,
        changes_count: change_count,
        processing_time_ms: start.elapsed().as_millis(),
    }))
}

async fn wait_for_initial_sync(state: &AppState) {
    if *state.sync_ready.borrow() {
        return;
    }
    let mut rx = state.sync_ready.clone();
    let _ = tokio::time::timeout(SYNC_WAIT_TIMEOUT, rx.wait_for(|ready| *ready)).await;
}
