#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("a sync is already in progress")]
    AlreadyRunning,
    #[error("could not connect to jellyfin for sync")]
    NotConnected,
    #[error("store error during sync: {0}")]
    Store(#[from] db::StoreError),
}
