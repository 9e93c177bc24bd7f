use std::{str::FromStr, time::Duration};

use sqlx::{
    Error,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
};
use utils::assets::data_dir;

pub mod change;
pub mod error;
pub mod models;
pub mod store;

pub use change::{detect, ChangeDescriptor, ChangePolicy, ChangeType};
pub use error::{StoreError, StoreResult};
pub use models::{MediaKind, MediaRecord};
pub use store::{ItemStore, SaveBatchOutcome, StoreStats};

/// Owns the sqlite pool and the `ItemStore` built on top of it. `DbService::new`
/// configures WAL journaling, a 30s busy timeout, memory-backed temp storage,
/// and a 64MB mmap window (spec §4.A, §10.1), then runs migrations.
#[derive(Clone)]
pub struct DbService {
    pub store: ItemStore,
}

impl DbService {
    pub async fn new() -> Result<DbService, Error> {
        let db_path = data_dir().join("jellynouncer.sqlite");
        Self::connect(&db_path.to_string_lossy()).await
    }

    pub async fn connect(path: &str) -> Result<DbService, Error> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{path}"))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30))
            .pragma("temp_store", "memory")
            .pragma("mmap_size", "67108864");

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(DbService { store: ItemStore::new(pool) })
    }
}
