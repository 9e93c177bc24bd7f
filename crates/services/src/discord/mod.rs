//! Discord Dispatcher (spec §4.G). Routes rendered messages to per-kind
//! webhooks, rate limits per Discord's sliding window, and retries transient
//! failures with exponential backoff via a bounded re-enqueueing FIFO queue.
//! Grounded on `original_source/discord_services.py`
//! (`_determine_target_webhooks`, `_send_webhook`, `_check_rate_limit`) for
//! the domain behavior, and on `executors/src/ralph/orchestrator.rs`'s
//! single-consumer worker-loop shape for the queue structure.

pub mod error;

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use db::models::{MediaKind, MediaRecord};
use reqwest::Client;
use tokio::sync::{Mutex, Notify};

pub use error::DispatchError;

use crate::render::RenderedMessage;

const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);
const RATE_LIMIT_COUNT: usize = 30;
const MAX_RETRIES: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_QUEUE_CAPACITY: usize = 1000;
const INTER_MESSAGE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub name: String,
    pub url: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RoutingConfig {
    pub enabled: bool,
}

/// Content-type routing table (spec §4.G): Movie -> movies, TV kinds -> tv,
/// Music kinds -> music, everything else -> default; falls back to default
/// when the specific webhook is absent, disabled, or unconfigured.
pub fn route_webhook_name(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Movie => "movies",
        MediaKind::Episode | MediaKind::Season | MediaKind::Series => "tv",
        MediaKind::Audio | MediaKind::MusicAlbum | MediaKind::MusicArtist => "music",
        _ => "default",
    }
}

#[derive(Clone)]
struct QueueEntry {
    webhook_name: String,
    payload: Arc<RenderedMessage>,
    not_before: Instant,
    attempt: u32,
}

/// Per-webhook state machine (spec §4.G): `Ready` or `Blocked(until)` after a
/// 429, returning to `Ready` once `until` has passed.
#[derive(Debug, Clone, Copy)]
enum WebhookState {
    Ready,
    Blocked(Instant),
}

struct SlidingWindow {
    requests: VecDeque<Instant>,
}

impl SlidingWindow {
    fn new() -> Self {
        Self { requests: VecDeque::new() }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.requests.front() {
            if now.duration_since(*front) > RATE_LIMIT_WINDOW {
                self.requests.pop_front();
            } else {
                break;
            }
        }
    }

    /// Returns `Some(retry_at)` when the window is saturated, else records
    /// the attempt and returns `None`.
    fn check(&mut self, now: Instant) -> Option<Instant> {
        self.prune(now);
        if self.requests.len() >= RATE_LIMIT_COUNT {
            let retry_at = *self.requests.front().unwrap() + RATE_LIMIT_WINDOW;
            return Some(retry_at);
        }
        self.requests.push_back(now);
        None
    }
}

#[derive(Default)]
struct DispatchStats {
    queued: AtomicU64,
    sent: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
    rate_limit_hits: AtomicU64,
}

#[derive(Debug, Clone)]
pub struct DispatcherStats {
    pub queued: u64,
    pub sent: u64,
    pub failed: u64,
    pub retried: u64,
    pub current_size: u64,
    pub rate_limit_hits: u64,
    pub utilization_pct: f64,
    pub success_rate_pct: f64,
}

struct Queue {
    entries: Mutex<VecDeque<QueueEntry>>,
    notify: Notify,
    capacity: usize,
}

impl Queue {
    fn new(capacity: usize) -> Self {
        Self { entries: Mutex::new(VecDeque::new()), notify: Notify::new(), capacity }
    }

    async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    async fn push_back(&self, entry: QueueEntry) -> Result<(), DispatchError> {
        let mut guard = self.entries.lock().await;
        if guard.len() >= self.capacity {
            return Err(DispatchError::QueueFull);
        }
        guard.push_back(entry);
        drop(guard);
        self.notify.notify_one();
        Ok(())
    }

    /// Blocks until an entry is available, then waits out its `not_before`
    /// before returning it — the queue is strictly FIFO, so a not-yet-ready
    /// head entry delays everything behind it, matching the spec's "single
    /// worker blocks on the queue, honors each entry's not_before_ts".
    async fn pop_ready(&self) -> QueueEntry {
        loop {
            let head = {
                let mut guard = self.entries.lock().await;
                guard.pop_front()
            };
            match head {
                Some(entry) => {
                    let now = Instant::now();
                    if entry.not_before > now {
                        tokio::time::sleep(entry.not_before - now).await;
                    }
                    return entry;
                }
                None => self.notify.notified().await,
            }
        }
    }
}

pub struct Dispatcher {
    queue: Arc<Queue>,
    stats: Arc<DispatchStats>,
}

impl Dispatcher {
    pub fn spawn(webhooks: HashMap<String, WebhookConfig>, routing: RoutingConfig) -> Self {
        Self::spawn_with_capacity(webhooks, routing, DEFAULT_QUEUE_CAPACITY)
    }

    /// Spawns the single-consumer worker and returns a cheaply-clonable
    /// handle (queue + stats are `Arc`-shared).
    pub fn spawn_with_capacity(
        webhooks: HashMap<String, WebhookConfig>,
        routing: RoutingConfig,
        queue_capacity: usize,
    ) -> Self {
        let queue = Arc::new(Queue::new(queue_capacity));
        let stats = Arc::new(DispatchStats::default());
        tokio::spawn(worker_loop(queue.clone(), stats.clone(), Arc::new(webhooks), Arc::new(routing)));
        Self { queue, stats }
    }

    /// Routes `message` to the webhook appropriate for `record.kind` and
    /// enqueues delivery. Fails with `QueueFull` rather than blocking.
    pub async fn dispatch(&self, record: &MediaRecord, message: RenderedMessage) -> Result<(), DispatchError> {
        let webhook_name = route_webhook_name(record.kind).to_string();
        self.enqueue(webhook_name, message).await
    }

    /// Sends an administrative status notification to the default webhook
    /// only, bypassing content routing (spec §11 `send_status`).
    pub async fn send_status(&self, status: &str, message: &str) -> Result<(), DispatchError> {
        let payload = crate::render::status_embed(status, message);
        self.enqueue("default".to_string(), payload).await
    }

    async fn enqueue(&self, webhook_name: String, payload: RenderedMessage) -> Result<(), DispatchError> {
        let entry = QueueEntry {
            webhook_name,
            payload: Arc::new(payload),
            not_before: Instant::now(),
            attempt: 0,
        };
        self.queue.push_back(entry).await?;
        self.stats.queued.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub async fn stats(&self) -> DispatcherStats {
        let queued = self.stats.queued.load(Ordering::Relaxed);
        let sent = self.stats.sent.load(Ordering::Relaxed);
        let failed = self.stats.failed.load(Ordering::Relaxed);
        let retried = self.stats.retried.load(Ordering::Relaxed);
        let rate_limit_hits = self.stats.rate_limit_hits.load(Ordering::Relaxed);
        let current_size = self.queue.len().await as u64;
        let utilization_pct = (current_size as f64 / self.queue.capacity as f64) * 100.0;
        let attempted = sent + failed;
        let success_rate_pct = if attempted == 0 { 100.0 } else { (sent as f64 / attempted as f64) * 100.0 };
        DispatcherStats { queued, sent, failed, retried, current_size, rate_limit_hits, utilization_pct, success_rate_pct }
    }
}

async fn worker_loop(
    queue: Arc<Queue>,
    stats: Arc<DispatchStats>,
    webhooks: Arc<HashMap<String, WebhookConfig>>,
    routing: Arc<RoutingConfig>,
) {
    let http = Client::builder().timeout(REQUEST_TIMEOUT).build().expect("http client");
    let windows: Mutex<HashMap<String, SlidingWindow>> = Mutex::new(HashMap::new());
    let webhook_states: Mutex<HashMap<String, WebhookState>> = Mutex::new(HashMap::new());

    loop {
        let entry = queue.pop_ready().await;

        let Some(webhook) = resolve_webhook(&webhooks, &routing, &entry.webhook_name) else {
            tracing::warn!(webhook = %entry.webhook_name, "no enabled webhook found, dropping notification");
            stats.failed.fetch_add(1, Ordering::Relaxed);
            continue;
        };

        let now = Instant::now();
        let blocked_until = {
            let mut guard = webhook_states.lock().await;
            match guard.get(&webhook.name) {
                Some(WebhookState::Blocked(until)) if *until > now => Some(*until),
                _ => {
                    guard.insert(webhook.name.clone(), WebhookState::Ready);
                    None
                }
            }
        };
        if let Some(until) = blocked_until {
            requeue(&queue, &stats, entry, until).await;
            continue;
        }

        let rate_limited_until = {
            let mut guard = windows.lock().await;
            guard.entry(webhook.name.clone()).or_insert_with(SlidingWindow::new).check(now)
        };
        if let Some(retry_at) = rate_limited_until {
            stats.rate_limit_hits.fetch_add(1, Ordering::Relaxed);
            requeue(&queue, &stats, entry, retry_at).await;
            continue;
        }

        match send(&http, &webhook, &entry.payload).await {
            SendOutcome::Success => {
                stats.sent.fetch_add(1, Ordering::Relaxed);
            }
            SendOutcome::RateLimited { retry_after } => {
                let until = now + retry_after;
                webhook_states.lock().await.insert(webhook.name.clone(), WebhookState::Blocked(until));
                stats.rate_limit_hits.fetch_add(1, Ordering::Relaxed);
                requeue(&queue, &stats, entry, until).await;
            }
            SendOutcome::Terminal(status) => {
                tracing::error!(webhook = %webhook.name, status, "webhook rejected, dropping");
                stats.failed.fetch_add(1, Ordering::Relaxed);
            }
            SendOutcome::Transient => {
                if entry.attempt + 1 >= MAX_RETRIES {
                    tracing::error!(webhook = %webhook.name, "webhook failed after max retries, dropping");
                    stats.failed.fetch_add(1, Ordering::Relaxed);
                } else {
                    let delay = Duration::from_secs(60 * 2u64.pow(entry.attempt));
                    stats.retried.fetch_add(1, Ordering::Relaxed);
                    let mut retried_entry = entry.clone();
                    retried_entry.attempt += 1;
                    retried_entry.not_before = Instant::now() + delay;
                    let _ = queue.push_back(retried_entry).await;
                }
            }
        }

        tokio::time::sleep(INTER_MESSAGE_DELAY).await;
    }
}

async fn requeue(queue: &Queue, stats: &DispatchStats, mut entry: QueueEntry, not_before: Instant) {
    entry.not_before = not_before;
    if queue.push_back(entry).await.is_err() {
        tracing::warn!("queue full while re-enqueueing rate-limited message, dropping");
        stats.failed.fetch_add(1, Ordering::Relaxed);
    }
}

enum SendOutcome {
    Success,
    RateLimited { retry_after: Duration },
    Terminal(u16),
    Transient,
}

/// Resolves the routed webhook, falling back to `default` when routing is
/// disabled, the named webhook is missing/disabled, or has no URL.
fn resolve_webhook<'a>(
    webhooks: &'a HashMap<String, WebhookConfig>,
    routing: &RoutingConfig,
    requested: &str,
) -> Option<&'a WebhookConfig> {
    let usable = |name: &str| webhooks.get(name).filter(|w| w.enabled && !w.url.is_empty());

    if !routing.enabled {
        return usable("default");
    }
    usable(requested).or_else(|| usable("default"))
}

async fn send(http: &Client, webhook: &WebhookConfig, payload: &RenderedMessage) -> SendOutcome {
    match http.post(&webhook.url).json(payload).send().await {
        Ok(response) => {
            let status = response.status();
            if status.as_u16() == 204 || status.as_u16() == 200 {
                return SendOutcome::Success;
            }
            if status.as_u16() == 429 {
                let retry_after = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                return SendOutcome::RateLimited { retry_after: Duration::from_secs(retry_after) };
            }
            if status.is_client_error() {
                return SendOutcome::Terminal(status.as_u16());
            }
            SendOutcome::Transient
        }
        Err(err) => {
            tracing::warn!(webhook = %webhook.name, error = %err, "webhook request failed");
            SendOutcome::Transient
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_by_content_kind() {
        assert_eq!(route_webhook_name(MediaKind::Movie), "movies");
        assert_eq!(route_webhook_name(MediaKind::Episode), "tv");
        assert_eq!(route_webhook_name(MediaKind::Season), "tv");
        assert_eq!(route_webhook_name(MediaKind::Audio), "music");
        assert_eq!(route_webhook_name(MediaKind::MusicAlbum), "music");
        assert_eq!(route_webhook_name(MediaKind::Photo), "default");
    }

    #[test]
    fn resolve_falls_back_to_default_when_routing_disabled() {
        let mut webhooks = HashMap::new();
        webhooks.insert("default".to_string(), WebhookConfig { name: "default".into(), url: "https://x".into(), enabled: true });
        webhooks.insert("movies".to_string(), WebhookConfig { name: "movies".into(), url: "https://y".into(), enabled: true });

        let disabled = RoutingConfig { enabled: false };
        let resolved = resolve_webhook(&webhooks, &disabled, "movies").unwrap();
        assert_eq!(resolved.name, "default");
    }

    #[test]
    fn resolve_falls_back_to_default_when_routed_webhook_missing() {
        let mut webhooks = HashMap::new();
        webhooks.insert("default".to_string(), WebhookConfig { name: "default".into(), url: "https://x".into(), enabled: true });

        let enabled = RoutingConfig { enabled: true };
        let resolved = resolve_webhook(&webhooks, &enabled, "movies").unwrap();
        assert_eq!(resolved.name, "default");
    }

    #[test]
    fn sliding_window_flags_saturation_past_the_limit() {
        let mut window = SlidingWindow::new();
        let now = Instant::now();
        for _ in 0..RATE_LIMIT_COUNT {
            assert!(window.check(now).is_none());
        }
        assert!(window.check(now).is_some());
    }

    #[tokio::test]
    async fn queue_rejects_push_past_capacity() {
        let queue = Queue::new(1);
        let entry = QueueEntry {
            webhook_name: "default".into(),
            payload: Arc::new(RenderedMessage { embeds: Vec::new() }),
            not_before: Instant::now(),
            attempt: 0,
        };
        queue.push_back(entry.clone()).await.unwrap();
        assert!(matches!(queue.push_back(entry).await, Err(DispatchError::QueueFull)));
    }

    #[tokio::test]
    async fn dispatcher_reports_queued_and_current_size() {
        let mut webhooks = HashMap::new();
        webhooks.insert("default".to_string(), WebhookConfig { name: "default".into(), url: "https://discord.invalid/webhook".into(), enabled: true });
        let dispatcher = Dispatcher::spawn_with_capacity(webhooks, RoutingConfig { enabled: false }, 10);

        dispatcher.send_status("online", "test").await.unwrap();
        let stats = dispatcher.stats().await;
        assert_eq!(stats.queued, 1);
    }
}
