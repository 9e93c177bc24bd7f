//! Typed settings (spec §10.1). A thin `from_env()` reader with sane
//! defaults, not a validating config-file loader — that layer is explicitly
//! out of scope. Mirrors the teacher `main.rs`'s pattern of reading env vars
//! directly with `unwrap_or_else` fallbacks.

use std::collections::HashMap;
use std::time::Duration;

use db::change::{ChangePolicy, ChangeType};
use services::discord::{RoutingConfig, WebhookConfig};
use services::render::{ColorPalette, GroupingMode};

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Everything §6 lists under "Environment/configuration inputs the core
/// consumes". `Debug` is intentionally NOT derived for the fields holding
/// secrets (api keys, webhook urls) — see `AppConfig`'s manual impl below.
pub struct AppConfig {
    pub jellyfin_url: String,
    pub jellyfin_api_key: String,

    pub webhooks: HashMap<String, WebhookConfig>,
    pub routing: RoutingConfig,
    /// Grouping mode per webhook name (spec §6: "grouping mode per webhook").
    pub grouping: HashMap<String, GroupingMode>,

    pub change_policy: ChangePolicy,
    pub color_palette: ColorPalette,

    pub sync_batch_size: usize,
    pub sync_interval: Duration,
    pub vacuum_interval: Duration,

    pub omdb_api_key: Option<String>,
    pub tmdb_api_key: Option<String>,
    pub tvdb_api_key: Option<String>,

    pub bind_host: String,
    pub bind_port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let webhooks = ["default", "movies", "tv", "music"]
            .into_iter()
            .map(|name| {
                let env_key = format!("DISCORD_WEBHOOK_{}", name.to_uppercase());
                let url = env_string(&env_key, "");
                (
                    name.to_string(),
                    WebhookConfig { name: name.to_string(), url: url.clone(), enabled: !url.is_empty() },
                )
            })
            .collect();

        let routing = RoutingConfig { enabled: env_bool("DISCORD_ROUTING_ENABLED", true) };

        let grouping = ["default", "movies", "tv", "music"]
            .into_iter()
            .map(|name| {
                let env_key = format!("GROUPING_MODE_{}", name.to_uppercase());
                let fallback = env_string("GROUPING_MODE", "individual");
                let mode = match env_string(&env_key, &fallback).as_str() {
                    "none" => GroupingMode::None,
                    "by_event" => GroupingMode::ByEvent,
                    "by_type" => GroupingMode::ByType,
                    "grouped" => GroupingMode::Grouped,
                    _ => GroupingMode::Individual,
                };
                (name.to_string(), mode)
            })
            .collect();

        let mut change_policy = ChangePolicy::all_enabled();
        for (env_suffix, change_type) in [
            ("RESOLUTION", ChangeType::Resolution),
            ("CODEC", ChangeType::Codec),
            ("AUDIO_CODEC", ChangeType::AudioCodec),
            ("AUDIO_CHANNELS", ChangeType::AudioChannels),
            ("HDR_STATUS", ChangeType::HdrStatus),
            ("FILE_SIZE", ChangeType::FileSize),
            ("PROVIDER_IDS", ChangeType::ProviderIds),
        ] {
            let enabled = env_bool(&format!("WATCH_{env_suffix}"), true);
            change_policy = change_policy.set(change_type, enabled);
        }

        Self {
            jellyfin_url: env_string("JELLYFIN_URL", "http://localhost:8096"),
            jellyfin_api_key: env_string("JELLYFIN_API_KEY", ""),

            webhooks,
            routing,
            grouping,

            change_policy,
            color_palette: ColorPalette::default(),

            sync_batch_size: env_usize("SYNC_BATCH_SIZE", 100),
            sync_interval: Duration::from_secs(env_u64("SYNC_INTERVAL_SECS", 86400)),
            vacuum_interval: Duration::from_secs(env_u64("VACUUM_INTERVAL_SECS", 86400)),

            omdb_api_key: std::env::var("OMDB_API_KEY").ok().filter(|s| !s.is_empty()),
            tmdb_api_key: std::env::var("TMDB_API_KEY").ok().filter(|s| !s.is_empty()),
            tvdb_api_key: std::env::var("TVDB_API_KEY").ok().filter(|s| !s.is_empty()),

            bind_host: env_string("HOST", "127.0.0.1"),
            bind_port: env_u32("BACKEND_PORT", 0) as u16,
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("jellyfin_url", &self.jellyfin_url)
            .field("jellyfin_api_key", &"<redacted>")
            .field("webhook_count", &self.webhooks.len())
            .field("routing_enabled", &self.routing.enabled)
            .field("sync_batch_size", &self.sync_batch_size)
            .field("sync_interval", &self.sync_interval)
            .field("vacuum_interval", &self.vacuum_interval)
            .finish()
    }
}
