//! Shared notification pipeline: change detection → enrichment → thumbnail
//! resolution → render → dispatch. Used by both the Sync Engine (§4.H) and
//! the Webhook Ingress (§4.I) so the two entry points can't drift apart on
//! what "emit a notification" means. Grounded on
//! `original_source/webhook_service.py`'s `_process_item` (the function both
//! the sync loop and the webhook handler funnel through).

use std::collections::HashMap;
use std::sync::Arc;

use db::change::{self, ChangePolicy};
use db::models::MediaRecord;

use crate::discord::{self, DispatchError, Dispatcher};
use crate::enrichment::Enricher;
use crate::render::{Action, GroupingMode, TemplateRenderer};
use crate::thumbnail::ThumbnailResolver;

/// What happened to a record as it passed through the pipeline, returned to
/// callers (sync outcome counters, ingress HTTP response) that need to
/// report on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineAction {
    NewItem,
    UpgradedItem,
    HashUpdated,
    NoChanges,
}

pub struct PipelineResult {
    pub action: PipelineAction,
    pub change_count: usize,
}

pub struct NotificationPipeline {
    enricher: Arc<Enricher>,
    thumbnails: Arc<ThumbnailResolver>,
    renderer: Arc<TemplateRenderer>,
    dispatcher: Arc<Dispatcher>,
    policy: ChangePolicy,
    /// Grouping mode per webhook name (spec §6: "grouping mode per webhook").
    /// Looked up by the webhook a record routes to, falling back to
    /// `GroupingMode::Individual` when a webhook has no entry.
    grouping: HashMap<String, GroupingMode>,
}

impl NotificationPipeline {
    pub fn new(
        enricher: Arc<Enricher>,
        thumbnails: Arc<ThumbnailResolver>,
        renderer: Arc<TemplateRenderer>,
        dispatcher: Arc<Dispatcher>,
        policy: ChangePolicy,
        grouping: HashMap<String, GroupingMode>,
    ) -> Self {
        Self { enricher, thumbnails, renderer, dispatcher, policy, grouping }
    }

    fn grouping_for(&self, record: &MediaRecord) -> GroupingMode {
        let webhook_name = discord::route_webhook_name(record.kind);
        self.grouping.get(webhook_name).copied().unwrap_or(GroupingMode::Individual)
    }

    /// Notifies for a brand-new record (no prior fingerprint existed).
    pub async fn notify_new(&self, record: &MediaRecord) -> Result<PipelineResult, DispatchError> {
        self.render_and_dispatch(record, Action::NewItem, &[]).await?;
        Ok(PipelineResult { action: PipelineAction::NewItem, change_count: 0 })
    }

    /// Diffs `prior` against `record`; emits `upgraded_item` when the
    /// detector finds enabled changes, otherwise reports `hash_updated`
    /// (the fingerprint moved but nothing the policy tracks did).
    pub async fn notify_change(
        &self,
        prior: &MediaRecord,
        record: &MediaRecord,
    ) -> Result<PipelineResult, DispatchError> {
        let changes = change::detect(prior, record, &self.policy);
        if changes.is_empty() {
            return Ok(PipelineResult { action: PipelineAction::HashUpdated, change_count: 0 });
        }
        let change_count = changes.len();
        self.render_and_dispatch(record, Action::UpgradedItem, &changes).await?;
        Ok(PipelineResult { action: PipelineAction::UpgradedItem, change_count })
    }

    async fn render_and_dispatch(
        &self,
        record: &MediaRecord,
        action: Action,
        changes: &[db::change::ChangeDescriptor],
    ) -> Result<(), DispatchError> {
        let enrichment = self.enricher.enrich(record).await;
        let thumbnail_url = self.thumbnails.resolve(record).await;
        let grouping = self.grouping_for(record);
        let message = self.renderer.render(record, action, grouping, thumbnail_url.as_deref(), changes, &enrichment);
        self.dispatcher.dispatch(record, message).await
    }
}

/// Resolves the webhook name a record would route to, without actually
/// dispatching — used by callers that need to know which grouping policy
/// applies before the notification is built.
pub fn webhook_for(record: &MediaRecord) -> &'static str {
    discord::route_webhook_name(record.kind)
}
