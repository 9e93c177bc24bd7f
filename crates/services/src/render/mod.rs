//! Template Renderer (spec §4.F). Grounded on
//! `original_source/discord_services.py` (`_render_template`, `_get_embed_color`).

pub mod error;
pub mod templates;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::Utc;
use db::change::ChangeDescriptor;
use db::models::{MediaKind, MediaRecord};
use handlebars::Handlebars;
use serde::Serialize;
use serde_json::json;

pub use error::RenderError;

use crate::enrichment::EnrichedMetadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    NewItem,
    UpgradedItem,
}

impl Action {
    fn template_base(&self) -> &'static str {
        match self {
            Action::NewItem => "new_item",
            Action::UpgradedItem => "upgraded_item",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupingMode {
    None,
    Individual,
    ByEvent,
    ByType,
    Grouped,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedImage {
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

/// Mirrors the Discord embed object shape (spec §4.F / §11); the original's
/// `_render_template`/`send_server_status` build this same structure from
/// Jinja2 output and a literal dict respectively.
#[derive(Debug, Clone, Serialize)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub fields: Vec<EmbedField>,
    pub color: u32,
    pub image: Option<EmbedImage>,
    pub footer: EmbedFooter,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderedMessage {
    pub embeds: Vec<Embed>,
}

/// Running per-template timing stats (spec §4.F: "count, total, slowest,
/// slowest-template").
#[derive(Default)]
pub struct RenderStats {
    count: AtomicU64,
    total_nanos: AtomicU64,
    slowest_nanos: AtomicU64,
    slowest_template: Mutex<Option<String>>,
}

impl RenderStats {
    fn record(&self, template: &str, elapsed: std::time::Duration) {
        let nanos = elapsed.as_nanos() as u64;
        self.count.fetch_add(1, Ordering::Relaxed);
        self.total_nanos.fetch_add(nanos, Ordering::Relaxed);
        if nanos > self.slowest_nanos.load(Ordering::Relaxed) {
            self.slowest_nanos.store(nanos, Ordering::Relaxed);
            *self.slowest_template.lock().unwrap() = Some(template.to_string());
        }
    }

    pub fn snapshot(&self) -> (u64, u64, u64, Option<String>) {
        (
            self.count.load(Ordering::Relaxed),
            self.total_nanos.load(Ordering::Relaxed),
            self.slowest_nanos.load(Ordering::Relaxed),
            self.slowest_template.lock().unwrap().clone(),
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ColorPalette {
    pub new_item: u32,
    pub resolution: u32,
    pub codec: u32,
    pub audio: u32,
    pub hdr_status: u32,
    pub provider_ids: u32,
    pub default: u32,
}

impl Default for ColorPalette {
    fn default() -> Self {
        Self {
            new_item: 0x00ff00,
            resolution: 0x0099ff,
            codec: 0x9900ff,
            audio: 0x9900ff,
            hdr_status: 0xffd700,
            provider_ids: 0xaaaaaa,
            default: 0xff9900,
        }
    }
}

/// Per-kind fallback color, used when no change-type color applies
/// (spec §11: supplements §4.F with the original's `_get_embed_color` map).
fn kind_color(kind: MediaKind) -> u32 {
    match kind {
        MediaKind::Movie => 0x0099ff,
        MediaKind::Episode | MediaKind::Season | MediaKind::Series => 0x00ff00,
        MediaKind::Audio | MediaKind::MusicAlbum | MediaKind::MusicArtist => 0x9900ff,
        _ => 0xff9900,
    }
}

fn embed_color(palette: &ColorPalette, action: Action, changes: &[ChangeDescriptor], kind: MediaKind) -> u32 {
    match action {
        Action::NewItem => palette.new_item,
        Action::UpgradedItem => match changes.first().map(|c| c.change_type) {
            Some(db::change::ChangeType::Resolution) => palette.resolution,
            Some(db::change::ChangeType::Codec) => palette.codec,
            Some(db::change::ChangeType::AudioCodec) | Some(db::change::ChangeType::AudioChannels) => palette.audio,
            Some(db::change::ChangeType::HdrStatus) => palette.hdr_status,
            Some(db::change::ChangeType::ProviderIds) => palette.provider_ids,
            _ => kind_color(kind),
        },
    }
}

fn candidate_templates(action: Action, mode: GroupingMode) -> Vec<String> {
    let base = action.template_base();
    let grouped_suffix = match (action, mode) {
        (Action::NewItem, GroupingMode::ByEvent) => Some("new_items_by_event"),
        (Action::NewItem, GroupingMode::ByType) => Some("new_items_by_type"),
        (Action::NewItem, GroupingMode::Grouped) => Some("new_items_grouped"),
        (Action::UpgradedItem, GroupingMode::ByEvent) => Some("upgraded_items_by_event"),
        (Action::UpgradedItem, GroupingMode::ByType) => Some("upgraded_items_by_type"),
        (Action::UpgradedItem, GroupingMode::Grouped) => Some("upgraded_items_grouped"),
        _ => None,
    };

    match grouped_suffix {
        Some(grouped) => vec![grouped.to_string(), base.to_string()],
        None => vec![base.to_string()],
    }
}

pub struct TemplateRenderer {
    handlebars: Handlebars<'static>,
    palette: ColorPalette,
    server_url: String,
    stats: RenderStats,
}

impl TemplateRenderer {
    pub fn new(server_url: String, palette: ColorPalette) -> Self {
        let mut handlebars = Handlebars::new();
        templates::register_defaults(&mut handlebars);
        Self { handlebars, palette, server_url, stats: RenderStats::default() }
    }

    pub fn register_template(&mut self, name: &str, source: &str) -> Result<(), RenderError> {
        self.handlebars
            .register_template_string(name, source)
            .map_err(|e| RenderError::Template(e.to_string()))
    }

    pub fn stats(&self) -> &RenderStats {
        &self.stats
    }

    pub fn render(
        &self,
        record: &MediaRecord,
        action: Action,
        mode: GroupingMode,
        thumbnail_url: Option<&str>,
        changes: &[ChangeDescriptor],
        enrichment: &EnrichedMetadata,
    ) -> RenderedMessage {
        let candidates = candidate_templates(action, mode);
        let color = embed_color(&self.palette, action, changes, record.kind);
        let context = json!({
            "record": record,
            "action": action.template_base(),
            "thumbnail_url": thumbnail_url,
            "changes": changes,
            "timestamp": Utc::now().to_rfc3339(),
            "server_url": self.server_url,
            "enrichment": enrichment,
            "color": color,
        });

        for template in &candidates {
            let start = std::time::Instant::now();
            let rendered = self.handlebars.render(template, &context);
            self.stats.record(template, start.elapsed());

            match rendered {
                Ok(body) => {
                    if let Some(message) = parse_rendered(&body) {
                        return message;
                    }
                    tracing::warn!(template, "rendered output was not valid, trying next candidate");
                }
                Err(err) => {
                    tracing::warn!(template, error = %err, "template render failed, trying next candidate");
                }
            }
        }

        self.fallback_embed(record, action, thumbnail_url, changes)
    }

    fn fallback_embed(
        &self,
        record: &MediaRecord,
        action: Action,
        thumbnail_url: Option<&str>,
        changes: &[ChangeDescriptor],
    ) -> RenderedMessage {
        let title = match action {
            Action::NewItem => format!("Added: {}", record.name),
            Action::UpgradedItem => format!("Upgraded: {}", record.name),
        };
        let description = changes
            .iter()
            .map(|c| c.description.clone())
            .collect::<Vec<_>>()
            .join("\n");

        RenderedMessage {
            embeds: vec![Embed {
                title,
                description,
                fields: Vec::new(),
                color: embed_color(&self.palette, action, changes, record.kind),
                image: thumbnail_url.map(|url| EmbedImage { url: url.to_string() }),
                footer: EmbedFooter { text: "Jellynouncer".to_string() },
                timestamp: Utc::now().to_rfc3339(),
            }],
        }
    }
}

/// Builds the status-notification embed sent outside the template pipeline
/// (spec §11 `send_status`), matching `send_server_status`'s literal dict.
pub fn status_embed(status: &str, message: &str) -> RenderedMessage {
    let color = match status {
        "online" => 0x00ff00,
        "offline" => 0xff0000,
        "maintenance" => 0xffff00,
        "error" => 0xff0000,
        _ => 0x999999,
    };
    let title = format!(
        "Jellynouncer Status: {}{}",
        status.chars().next().map(|c| c.to_ascii_uppercase()).unwrap_or_default(),
        &status.get(1..).unwrap_or("")
    );

    RenderedMessage {
        embeds: vec![Embed {
            title,
            description: message.to_string(),
            fields: Vec::new(),
            color,
            image: None,
            footer: EmbedFooter { text: "Jellynouncer Service".to_string() },
            timestamp: Utc::now().to_rfc3339(),
        }],
    }
}

fn parse_rendered(body: &str) -> Option<RenderedMessage> {
    serde_json::from_str(body).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_item_grouping_falls_back_to_individual() {
        assert_eq!(
            candidate_templates(Action::NewItem, GroupingMode::None),
            vec!["new_item".to_string()]
        );
        assert_eq!(
            candidate_templates(Action::NewItem, GroupingMode::ByEvent),
            vec!["new_items_by_event".to_string(), "new_item".to_string()]
        );
    }

    #[test]
    fn color_policy_prefers_change_type_over_kind() {
        let palette = ColorPalette::default();
        let changes = vec![ChangeDescriptor {
            change_type: db::change::ChangeType::Resolution,
            field: "video_height",
            old_value: "1080".into(),
            new_value: "2160".into(),
            description: "Resolution changed from 1080p to 2160p".into(),
        }];
        let color = embed_color(&palette, Action::UpgradedItem, &changes, MediaKind::Movie);
        assert_eq!(color, palette.resolution);
    }

    #[test]
    fn color_policy_falls_back_to_kind_when_no_changes() {
        let palette = ColorPalette::default();
        let color = embed_color(&palette, Action::UpgradedItem, &[], MediaKind::Episode);
        assert_eq!(color, kind_color(MediaKind::Episode));
    }

    #[test]
    fn default_new_item_template_renders() {
        let renderer = TemplateRenderer::new("http://jf:8096".to_string(), ColorPalette::default());
        let record = MediaRecord { id: "1".into(), name: "Arrival".into(), kind: MediaKind::Movie, ..Default::default() };
        let message = renderer.render(&record, Action::NewItem, GroupingMode::None, None, &[], &EnrichedMetadata::default());
        assert_eq!(message.embeds.len(), 1);
        assert!(message.embeds[0].title.contains("Arrival"));
    }

    #[test]
    fn unregistered_grouping_template_falls_back_to_minimal_embed() {
        let renderer = TemplateRenderer::new("http://jf:8096".to_string(), ColorPalette::default());
        let record = MediaRecord { id: "1".into(), name: "Arrival".into(), kind: MediaKind::Movie, ..Default::default() };
        let changes = vec![ChangeDescriptor {
            change_type: db::change::ChangeType::Resolution,
            field: "video_height",
            old_value: "1080".into(),
            new_value: "2160".into(),
            description: "Resolution changed from 1080p to 2160p".into(),
        }];
        // No "new_items_grouped" template registered, but the base "new_item"
        // candidate still exists, so this should render via that, not the
        // hand-built minimal fallback.
        let message = renderer.render(&record, Action::NewItem, GroupingMode::Grouped, None, &changes, &EnrichedMetadata::default());
        assert_eq!(message.embeds.len(), 1);
    }
}
