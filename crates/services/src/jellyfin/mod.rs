//! Jellyfin Client (spec §4.B). Long-lived, holds a `reqwest::Client` and
//! caches server identity for an hour the way `JellyfinAPI.__init__` /
//! `get_system_info` do (`original_source/jellyfin_api.py`).

pub mod error;
pub mod payload;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_stream::stream;
use db::models::{MediaRecord, ServerContext};
use futures::Stream;
use reqwest::Client;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::sleep;

pub use error::{JellyfinError, JellyfinResult};
pub use payload::{convert_to_record, FIELD_WHITELIST};

const SERVER_INFO_TTL: Duration = Duration::from_secs(3600);
const CONNECTION_CHECK_INTERVAL: Duration = Duration::from_secs(300);
const MAX_CONNECT_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct JellyfinConfig {
    pub server_url: String,
    pub api_key: String,
}

struct ServerInfoCache {
    info: ServerContext,
    cached_at: Instant,
}

pub struct JellyfinClient {
    config: JellyfinConfig,
    http: Client,
    last_success: Mutex<Option<Instant>>,
    server_info: Mutex<Option<ServerInfoCache>>,
}

impl JellyfinClient {
    pub fn new(config: JellyfinConfig) -> Self {
        Self {
            config,
            http: Client::new(),
            last_success: Mutex::new(None),
            server_info: Mutex::new(None),
        }
    }

    fn auth_header(&self) -> String {
        format!(
            "MediaBrowser Client=\"Jellynouncer\", Device=\"Jellynouncer\", DeviceId=\"jellynouncer\", Version=\"1.0.0\", Token=\"{}\"",
            self.config.api_key
        )
    }

    async fn get(&self, path: &str) -> JellyfinResult<Value> {
        let url = format!("{}{}", self.config.server_url.trim_end_matches('/'), path);
        let response = self
            .http
            .get(&url)
            .header("X-Emby-Authorization", self.auth_header())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(JellyfinError::Status { status: response.status() });
        }

        Ok(response.json::<Value>().await?)
    }

    async fn fetch_system_info(&self) -> JellyfinResult<Value> {
        self.get("/System/Info").await
    }

    /// Up to 3 attempts with exponential backoff (2s, 4s, 8s). A system-info
    /// probe counts as success.
    pub async fn connect(&self) -> bool {
        for attempt in 1..=MAX_CONNECT_ATTEMPTS {
            match self.fetch_system_info().await {
                Ok(info) => {
                    let server = ServerContext {
                        id: info.get("Id").and_then(Value::as_str).map(str::to_string),
                        name: info.get("ServerName").and_then(Value::as_str).map(str::to_string),
                        version: info.get("Version").and_then(Value::as_str).map(str::to_string),
                        url: Some(self.config.server_url.clone()),
                    };
                    *self.server_info.lock().await =
                        Some(ServerInfoCache { info: server, cached_at: Instant::now() });
                    *self.last_success.lock().await = Some(Instant::now());
                    tracing::info!(server = %self.config.server_url, attempt, "connected to jellyfin");
                    return true;
                }
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "jellyfin connection attempt failed");
                    if attempt < MAX_CONNECT_ATTEMPTS {
                        sleep(Duration::from_secs(2u64.pow(attempt))).await;
                    }
                }
            }
        }
        tracing::error!("failed to connect to jellyfin after {} attempts", MAX_CONNECT_ATTEMPTS);
        false
    }

    /// Last success within 5 minutes is cached true; else re-probe.
    pub async fn is_connected(&self) -> bool {
        if let Some(last) = *self.last_success.lock().await {
            if last.elapsed() < CONNECTION_CHECK_INTERVAL {
                return true;
            }
        }
        self.connect().await
    }

    async fn server_context(&self) -> ServerContext {
        let mut cache = self.server_info.lock().await;
        if let Some(entry) = cache.as_ref() {
            if entry.cached_at.elapsed() < SERVER_INFO_TTL {
                return entry.info.clone();
            }
        }
        if let Ok(info) = self.fetch_system_info().await {
            let server = ServerContext {
                id: info.get("Id").and_then(Value::as_str).map(str::to_string),
                name: info.get("ServerName").and_then(Value::as_str).map(str::to_string),
                version: info.get("Version").and_then(Value::as_str).map(str::to_string),
                url: Some(self.config.server_url.clone()),
            };
            *cache = Some(ServerInfoCache { info: server.clone(), cached_at: Instant::now() });
            return server;
        }
        ServerContext { url: Some(self.config.server_url.clone()), ..Default::default() }
    }

    pub async fn get_item(&self, id: &str) -> JellyfinResult<MediaRecord> {
        let fields = FIELD_WHITELIST.join(",");
        let path = format!("/Items/{id}?Fields={fields}");
        let raw = self.get(&path).await?;
        let server = self.server_context().await;
        Ok(convert_to_record(&raw, server))
    }

    /// Pages through the library requesting only the whitelisted field set;
    /// yields each page immediately; on per-page error, logs and advances
    /// past the failing page (bounded skip) to reach all reachable items;
    /// terminates when `start + len(batch) >= total` or an empty page.
    pub fn stream_items(
        self: &Arc<Self>,
        batch_size: usize,
    ) -> impl Stream<Item = (Vec<MediaRecord>, usize)> + '_ {
        stream! {
            let fields = FIELD_WHITELIST.join(",");
            let mut start = 0usize;
            loop {
                let path = format!(
                    "/Items?Recursive=true&StartIndex={start}&Limit={batch_size}&Fields={fields}"
                );
                let page = match self.get(&path).await {
                    Ok(page) => page,
                    Err(err) => {
                        tracing::warn!(start, error = %err, "jellyfin page fetch failed, skipping ahead");
                        start += batch_size;
                        continue;
                    }
                };

                let total = page.get("TotalRecordCount").and_then(Value::as_u64).unwrap_or(0) as usize;
                let items = page.get("Items").and_then(Value::as_array).cloned().unwrap_or_default();
                if items.is_empty() {
                    break;
                }

                let server = self.server_context().await;
                let batch: Vec<MediaRecord> = items
                    .iter()
                    .map(|raw| convert_to_record(raw, server.clone()))
                    .collect();

                let yielded = batch.len();
                yield (batch, total);

                start += yielded;
                if start >= total {
                    break;
                }
            }
        }
    }

    /// Convenience over `stream_items` that optionally reports progress.
    pub async fn get_all_items(
        self: &Arc<Self>,
        batch_size: usize,
        mut on_batch: Option<impl FnMut(usize, usize)>,
    ) -> Vec<MediaRecord> {
        use futures::StreamExt;

        let mut all = Vec::new();
        let mut stream = Box::pin(self.stream_items(batch_size));
        while let Some((batch, total)) = stream.next().await {
            all.extend(batch);
            if let Some(cb) = on_batch.as_mut() {
                cb(all.len(), total);
            }
        }
        all
    }
}
