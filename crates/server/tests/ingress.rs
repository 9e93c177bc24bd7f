//! Exercises the webhook ingress against the real axum router, the way
//! `middleware/request_id.rs`'s own tests build a `Router` and drive it with
//! `tower::ServiceExt::oneshot` rather than binding a real socket.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use db::change::ChangePolicy;
use serde_json::{json, Value};
use server::state::AppState;
use services::discord::{Dispatcher, RoutingConfig, WebhookConfig};
use services::enrichment::Enricher;
use services::jellyfin::{JellyfinClient, JellyfinConfig};
use services::pipeline::NotificationPipeline;
use services::render::{ColorPalette, GroupingMode};
use services::sync::SyncEngine;
use services::thumbnail::ThumbnailResolver;
use tower::ServiceExt;

async fn build_state() -> AppState {
    let path = std::env::temp_dir().join(format!("jellynouncer-test-{}.sqlite", uuid::Uuid::new_v4()));
    let db = db::DbService::connect(&path.to_string_lossy()).await.expect("connect test db");
    let store = db.store;

    let mut webhooks = std::collections::HashMap::new();
    for name in ["default", "movies", "tv", "music"] {
        webhooks.insert(name.to_string(), WebhookConfig { name: name.to_string(), url: String::new(), enabled: false });
    }
    let dispatcher = Arc::new(Dispatcher::spawn(webhooks, RoutingConfig { enabled: true }));

    let renderer = Arc::new(services::render::TemplateRenderer::new("http://jellyfin.test".to_string(), ColorPalette::default()));
    let enricher = Arc::new(Enricher::new(Vec::new()));
    let thumbnails = Arc::new(ThumbnailResolver::new("http://jellyfin.test".to_string()));

    let jellyfin = Arc::new(JellyfinClient::new(JellyfinConfig {
        server_url: "http://127.0.0.1:1".to_string(),
        api_key: "test-key".to_string(),
    }));

    let grouping = ["default", "movies", "tv", "music"]
        .into_iter()
        .map(|name| (name.to_string(), GroupingMode::Individual))
        .collect();

    let pipeline = Arc::new(NotificationPipeline::new(
        enricher,
        thumbnails,
        renderer,
        dispatcher,
        ChangePolicy::all_enabled(),
        grouping,
    ));

    let sync_engine = Arc::new(SyncEngine::new(store.clone(), jellyfin.clone(), pipeline.clone(), 100));

    let (_tx, rx) = tokio::sync::watch::channel(true);

    AppState { store, jellyfin, pipeline, sync_engine, sync_ready: rx }
}

async fn post_webhook(state: &AppState, body: Value) -> (StatusCode, Value) {
    let app = server::routes::router(state.clone());
    let request = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed: Value = serde_json::from_slice(&bytes).unwrap();
    (status, parsed)
}

fn s1_payload() -> Value {
    json!({
        "ItemId": "m1",
        "Name": "The Matrix",
        "ItemType": "Movie",
        "Year": 1999,
        "Video_0_Height": 1080,
        "Video_0_Codec": "h264",
        "Audio_0_Codec": "ac3",
        "Audio_0_Channels": 6,
        "Provider_imdb": "tt0133093",
    })
}

#[tokio::test]
async fn s1_new_movie_is_saved_and_reported_as_new() {
    let state = build_state().await;
    let (status, body) = post_webhook(&state, s1_payload()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["action"], json!("new_item"));
    assert_eq!(body["data"]["item_id"], json!("m1"));
    assert_eq!(body["data"]["changes_count"], json!(0));

    let stored = state.store.get("m1").await.unwrap();
    assert!(stored.is_some());
}

#[tokio::test]
async fn s2_resolution_upgrade_is_detected_after_s1() {
    let state = build_state().await;
    post_webhook(&state, s1_payload()).await;

    let mut upgraded = s1_payload();
    upgraded["Video_0_Height"] = json!(2160);
    upgraded["Video_0_Codec"] = json!("hevc");
    upgraded["Video_0_VideoRange"] = json!("HDR10");

    let (status, body) = post_webhook(&state, upgraded).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["action"], json!("upgraded_item"));
    assert_eq!(body["data"]["changes_count"], json!(3));
}

#[tokio::test]
async fn s3_replaying_the_same_payload_reports_no_changes() {
    let state = build_state().await;
    post_webhook(&state, s1_payload()).await;

    let (status, body) = post_webhook(&state, s1_payload()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["action"], json!("no_changes"));
    assert_eq!(body["data"]["changes_count"], json!(0));
}

#[tokio::test]
async fn missing_required_field_is_rejected_with_bad_request() {
    let state = build_state().await;
    let (status, body) = post_webhook(&state, json!({"Name": "Orphan"})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn health_endpoint_reports_store_stats() {
    let state = build_state().await;
    let app = server::routes::router(state);
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["sync_ready"], json!(true));
}
