//! Service Orchestrator (spec §4.J): brings every component up in
//! dependency order, runs the three background loops, and coordinates a
//! graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use server::config::AppConfig;
use server::state::AppState;
use services::discord::Dispatcher;
use services::enrichment::omdb::OmdbProvider;
use services::enrichment::tmdb::TmdbProvider;
use services::enrichment::tvdb::TvdbProvider;
use services::enrichment::{Enricher, Provider};
use services::jellyfin::{JellyfinClient, JellyfinConfig};
use services::pipeline::NotificationPipeline;
use services::render::TemplateRenderer;
use services::sync::{SyncEngine, SyncMode};
use services::thumbnail::ThumbnailResolver;
use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("failed to install rustls crypto provider");

    dotenvy::dotenv().ok();
    utils::logging::init_tracing();

    let config = AppConfig::from_env();
    tracing::info!(?config, "starting jellynouncer");

    // Startup order per §4.J: store -> http client pool (implicit in each
    // component's own reqwest::Client) -> dispatcher -> renderer ->
    // enricher -> thumbnail resolver -> jellyfin client -> sync engine ->
    // ingress listener.
    let db = db::DbService::new().await?;
    let store = db.store;

    let dispatcher = Arc::new(Dispatcher::spawn(config.webhooks.clone(), config.routing.clone()));

    let renderer = Arc::new(TemplateRenderer::new(config.jellyfin_url.clone(), config.color_palette.clone()));

    let mut providers: Vec<Arc<dyn Provider>> = Vec::new();
    if let Some(key) = &config.omdb_api_key {
        providers.push(Arc::new(OmdbProvider::new(key.clone())));
    }
    if let Some(key) = &config.tmdb_api_key {
        providers.push(Arc::new(TmdbProvider::new(key.clone())));
    }
    if let Some(key) = &config.tvdb_api_key {
        providers.push(Arc::new(TvdbProvider::new(key.clone())));
    }
    let enricher = Arc::new(Enricher::new(providers));

    let thumbnails = Arc::new(ThumbnailResolver::new(config.jellyfin_url.clone()));

    let jellyfin = Arc::new(JellyfinClient::new(JellyfinConfig {
        server_url: config.jellyfin_url.clone(),
        api_key: config.jellyfin_api_key.clone(),
    }));

    let pipeline = Arc::new(NotificationPipeline::new(
        enricher.clone(),
        thumbnails.clone(),
        renderer.clone(),
        dispatcher.clone(),
        config.change_policy.clone(),
        config.grouping.clone(),
    ));

    let sync_engine = Arc::new(SyncEngine::new(store.clone(), jellyfin.clone(), pipeline.clone(), config.sync_batch_size));

    let (sync_ready_tx, sync_ready_rx) = watch::channel(false);

    let init_marker = utils::assets::data_dir().join("init_complete");
    let is_first_startup = !init_marker.exists();

    if is_first_startup {
        tracing::info!("no init-complete marker found, running initial blocking sync");
        match sync_engine.run(SyncMode::InitialBlocking).await {
            Ok(outcome) => {
                tracing::info!(?outcome, "initial sync completed");
                if let Err(err) = std::fs::write(&init_marker, chrono::Utc::now().to_rfc3339()) {
                    tracing::warn!(error = %err, "failed to write init-complete marker");
                }
            }
            Err(err) => tracing::error!(error = %err, "initial sync failed, continuing without it"),
        }
        let _ = sync_ready_tx.send(true);
    } else {
        tracing::info!("init-complete marker present, running background sync");
        let _ = sync_ready_tx.send(true);
        let background_engine = sync_engine.clone();
        tokio::spawn(async move {
            if let Err(err) = background_engine.run(SyncMode::BackgroundStartup).await {
                tracing::warn!(error = %err, "background startup sync failed");
            }
        });
    }

    let shutdown = Arc::new(tokio::sync::Notify::new());

    spawn_maintenance_loop(store.clone(), dispatcher.clone(), config.vacuum_interval, shutdown.clone());
    spawn_connectivity_watch(jellyfin.clone(), dispatcher.clone(), sync_engine.clone(), shutdown.clone());
    spawn_periodic_sync(store.clone(), sync_engine.clone(), config.sync_interval, shutdown.clone());

    let state = AppState { store: store.clone(), jellyfin, pipeline, sync_engine, sync_ready: sync_ready_rx };
    let app = server::routes::router(state);

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", config.bind_host, config.bind_port)).await?;
    let actual_port = listener.local_addr()?.port();
    tracing::info!("jellynouncer listening on http://{}:{}", config.bind_host, actual_port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
            shutdown.notify_waiters();
        })
        .await?;

    tracing::info!("jellynouncer stopped");
    Ok(())
}

/// Once per `vacuum_interval`: compact the store and purge expired rating
/// cache entries (spec §4.J maintenance loop).
fn spawn_maintenance_loop(
    store: db::ItemStore,
    dispatcher: Arc<Dispatcher>,
    interval: Duration,
    shutdown: Arc<tokio::sync::Notify>,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    tracing::info!("running maintenance: vacuum + purge expired ratings");
                    store.vacuum().await;
                    store.purge_expired_ratings().await;
                    if let Err(err) = dispatcher.send_status("maintenance", "Vacuum and cache purge completed").await {
                        tracing::warn!(error = %err, "failed to dispatch maintenance status notification");
                    }
                }
                _ = shutdown.notified() => break,
            }
        }
    });
}

/// Polls Jellyfin reachability; dispatches status notifications and
/// triggers a recovery sync on offline->online transitions (spec §4.J
/// connectivity watch).
fn spawn_connectivity_watch(
    jellyfin: Arc<JellyfinClient>,
    dispatcher: Arc<Dispatcher>,
    sync_engine: Arc<SyncEngine>,
    shutdown: Arc<tokio::sync::Notify>,
) {
    const POLL_INTERVAL: Duration = Duration::from_secs(30);
    tokio::spawn(async move {
        let mut was_online = jellyfin.is_connected().await;
        loop {
            tokio::select! {
                _ = tokio::time::sleep(POLL_INTERVAL) => {
                    let is_online = jellyfin.is_connected().await;
                    if is_online && !was_online {
                        tracing::info!("jellyfin connectivity restored");
                        let _ = dispatcher.send_status("online", "Jellyfin server is back online").await;
                        let engine = sync_engine.clone();
                        tokio::spawn(async move {
                            if let Err(err) = engine.run(SyncMode::Recovery).await {
                                tracing::warn!(error = %err, "recovery sync failed");
                            }
                        });
                    } else if !is_online && was_online {
                        tracing::warn!("jellyfin connectivity lost");
                        let _ = dispatcher.send_status("offline", "Jellyfin server is unreachable").await;
                    }
                    was_online = is_online;
                }
                _ = shutdown.notified() => break,
            }
        }
    });
}

/// Checks once a minute whether the last successful sync is older than 24h
/// and launches a background sync if so (spec §4.J periodic sync).
fn spawn_periodic_sync(
    store: db::ItemStore,
    sync_engine: Arc<SyncEngine>,
    sync_interval: Duration,
    shutdown: Arc<tokio::sync::Notify>,
) {
    const CHECK_INTERVAL: Duration = Duration::from_secs(60);
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(CHECK_INTERVAL) => {
                    let due = match store.get_last_sync_time("periodic").await {
                        Ok(Some(last)) => chrono::DateTime::parse_from_rfc3339(&last)
                            .map(|dt| chrono::Utc::now().signed_duration_since(dt).to_std().unwrap_or_default() > sync_interval)
                            .unwrap_or(true),
                        Ok(None) => true,
                        Err(err) => {
                            tracing::warn!(error = %err, "failed to read last periodic sync time");
                            false
                        }
                    };
                    if due && !sync_engine.is_in_progress() {
                        tracing::info!("periodic sync interval elapsed, starting background sync");
                        if let Err(err) = sync_engine.run(SyncMode::Periodic).await {
                            tracing::warn!(error = %err, "periodic sync failed");
                        }
                    }
                }
                _ = shutdown.notified() => break,
            }
        }
    });
}
