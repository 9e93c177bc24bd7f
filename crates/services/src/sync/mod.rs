//! Sync Engine (spec §4.H). Streams the Jellyfin library in batches,
//! compares content fingerprints against the store, runs the Change
//! Detector on anything that moved, and emits the same `new_item`/
//! `upgraded_item` notifications the webhook ingress path does. Grounded on
//! `original_source/webhook_service.py` (`sync_jellyfin_library`,
//! `process_batch`, `_check_periodic_sync`).

pub mod error;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use db::{ItemStore, MediaRecord};
use futures::future::join_all;

pub use error::SyncError;

use crate::jellyfin::JellyfinClient;
use crate::pipeline::NotificationPipeline;

const INTER_BATCH_DELAY: Duration = Duration::from_millis(100);

/// Why a sync run was triggered (spec §4.H enumerates these explicitly so
/// logs/metrics can distinguish them).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// First-ever startup: blocks webhook processing until it completes.
    InitialBlocking,
    /// Subsequent startup, once an `init_complete` marker exists: runs
    /// concurrently with webhook processing.
    BackgroundStartup,
    /// Triggered by the maintenance loop once 24h have elapsed since the
    /// last recorded sync.
    Periodic,
    /// Triggered via an administrative endpoint.
    Manual,
    /// Triggered after Jellyfin connectivity is restored following an outage.
    Recovery,
}

#[derive(Debug, Clone, Default)]
pub struct SyncOutcome {
    pub items_processed: u64,
    pub items_changed: u64,
    pub items_errored: u64,
    pub duration: Duration,
}

/// Prevents overlapping sync runs (spec §4.H invariant: "only one sync runs
/// at a time"); mirrors `self.sync_in_progress` in the original.
pub struct SyncEngine {
    store: ItemStore,
    jellyfin: Arc<JellyfinClient>,
    pipeline: Arc<NotificationPipeline>,
    in_progress: AtomicBool,
    batch_size: usize,
}

impl SyncEngine {
    pub fn new(store: ItemStore, jellyfin: Arc<JellyfinClient>, pipeline: Arc<NotificationPipeline>, batch_size: usize) -> Self {
        Self { store, jellyfin, pipeline, in_progress: AtomicBool::new(false), batch_size }
    }

    pub fn is_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Runs a full library sync. Returns `AlreadyRunning` immediately
    /// (without blocking) if another sync is in flight, matching the
    /// original's "skip new request" behavior rather than queuing it.
    pub async fn run(&self, mode: SyncMode) -> Result<SyncOutcome, SyncError> {
        if self.in_progress.swap(true, Ordering::AcqRel) {
            return Err(SyncError::AlreadyRunning);
        }
        let result = self.run_inner(mode).await;
        self.in_progress.store(false, Ordering::Release);
        result
    }

    async fn run_inner(&self, mode: SyncMode) -> Result<SyncOutcome, SyncError> {
        tracing::info!(?mode, "starting library sync");
        let start = Instant::now();

        if !self.jellyfin.is_connected().await && !self.jellyfin.connect().await {
            return Err(SyncError::NotConnected);
        }

        let mut outcome = SyncOutcome::default();
        let mut stream = std::pin::pin!(self.jellyfin.stream_items(self.batch_size));

        use futures::StreamExt;
        while let Some((batch, _total)) = stream.next().await {
            let batch_outcome = self.process_batch(batch).await;
            outcome.items_processed += batch_outcome.processed;
            outcome.items_changed += batch_outcome.changed;
            outcome.items_errored += batch_outcome.errored;

            if !batch_outcome.to_save.is_empty() {
                match self.store.save_batch(&batch_outcome.to_save).await {
                    Ok(save_outcome) if save_outcome.failed > 0 => {
                        tracing::warn!(failed = save_outcome.failed, "some items failed to save during sync");
                    }
                    Ok(_) => {}
                    Err(err) => tracing::warn!(error = %err, "batch save failed during sync"),
                }
            }

            tokio::time::sleep(INTER_BATCH_DELAY).await;
        }

        let sync_type = match mode {
            SyncMode::InitialBlocking => "initial",
            SyncMode::BackgroundStartup => "background",
            SyncMode::Periodic => "periodic",
            SyncMode::Manual => "manual",
            SyncMode::Recovery => "recovery",
        };
        self.store
            .update_last_sync_time(sync_type, outcome.items_processed as i64)
            .await
            .map_err(SyncError::Store)?;
        outcome.duration = start.elapsed();
        tracing::info!(
            processed = outcome.items_processed,
            changed = outcome.items_changed,
            errored = outcome.items_errored,
            duration_secs = outcome.duration.as_secs_f64(),
            "library sync completed"
        );
        Ok(outcome)
    }

    /// Processes every item in a batch concurrently (spec §4.H: "in
    /// parallel per item"): compares fingerprints, runs change detection and
    /// dispatches notifications for anything new or meaningfully changed,
    /// and collects the records that need to be persisted.
    async fn process_batch(&self, batch: Vec<MediaRecord>) -> BatchOutcome {
        let futures = batch.into_iter().map(|record| self.process_item(record));
        let results = join_all(futures).await;

        let mut outcome = BatchOutcome::default();
        for result in results {
            outcome.processed += 1;
            match result {
                ItemOutcome::Unchanged => {}
                ItemOutcome::Saved { record, changed } => {
                    if changed {
                        outcome.changed += 1;
                    }
                    outcome.to_save.push(record);
                }
                ItemOutcome::Errored => outcome.errored += 1,
            }
        }
        outcome
    }

    async fn process_item(&self, record: MediaRecord) -> ItemOutcome {
        let existing_fingerprint = match self.store.get_fingerprint(&record.id).await {
            Ok(fp) => fp,
            Err(err) => {
                tracing::warn!(id = %record.id, error = %err, "failed to read existing fingerprint during sync");
                return ItemOutcome::Errored;
            }
        };

        match existing_fingerprint {
            Some(existing) if existing == record.fingerprint() => ItemOutcome::Unchanged,
            Some(_) => {
                let prior = match self.store.get(&record.id).await {
                    Ok(Some(prior)) => prior,
                    Ok(None) => return ItemOutcome::Saved { record, changed: false },
                    Err(err) => {
                        tracing::warn!(id = %record.id, error = %err, "failed to load prior record during sync");
                        return ItemOutcome::Errored;
                    }
                };
                match self.pipeline.notify_change(&prior, &record).await {
                    Ok(result) => ItemOutcome::Saved { record, changed: result.change_count > 0 },
                    Err(err) => {
                        tracing::warn!(id = %record.id, error = %err, "failed to dispatch change notification during sync");
                        ItemOutcome::Saved { record, changed: true }
                    }
                }
            }
            None => {
                if let Err(err) = self.pipeline.notify_new(&record).await {
                    tracing::warn!(id = %record.id, error = %err, "failed to dispatch new-item notification during sync");
                }
                ItemOutcome::Saved { record, changed: true }
            }
        }
    }
}

enum ItemOutcome {
    Unchanged,
    Saved { record: MediaRecord, changed: bool },
    Errored,
}

#[derive(Default)]
struct BatchOutcome {
    processed: u64,
    changed: u64,
    errored: u64,
    to_save: Vec<MediaRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_modes_are_distinguishable() {
        assert_ne!(SyncMode::InitialBlocking, SyncMode::Periodic);
        assert_eq!(SyncMode::Manual, SyncMode::Manual);
    }
}
