//! Shared application state (axum handler extension). Holds `Arc`-wrapped
//! handles to every long-lived component the Service Orchestrator wires up,
//! plus the readiness signal the Webhook Ingress waits on during an initial
//! blocking sync.

use std::sync::Arc;

use db::ItemStore;
use services::jellyfin::JellyfinClient;
use services::pipeline::NotificationPipeline;
use services::sync::SyncEngine;
use tokio::sync::watch;

#[derive(Clone)]
pub struct AppState {
    pub store: ItemStore,
    pub jellyfin: Arc<JellyfinClient>,
    pub pipeline: Arc<NotificationPipeline>,
    pub sync_engine: Arc<SyncEngine>,
    /// Flips to `true` once the initial blocking sync (or, if this wasn't
    /// the first-ever startup, immediately) has completed — ingress waits
    /// on this, bounded, before processing (spec §4.I step 1).
    pub sync_ready: watch::Receiver<bool>,
}
