//! Item Store (spec §4.A). sqlite-backed persistence over `media_items`,
//! `sync_status`, `service_state`, `ratings_cache`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use std::collections::HashMap;

use crate::error::{StoreError, StoreResult};
use crate::models::{AudioStream, Fingerprint, ImageTags, MediaKind, MediaRecord, MediaTimestamps, ProviderIds, ServerContext, SubtitleStream, VideoStream};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveBatchOutcome {
    pub successful: usize,
    pub failed: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub total: i64,
    pub by_kind: HashMap<String, i64>,
    pub recent_24h: i64,
    pub disk_bytes: i64,
}

#[derive(Debug, Clone)]
pub struct ItemStore {
    pool: SqlitePool,
}

fn join_list(values: &[String]) -> String {
    values.join(",")
}

fn split_list(value: &str) -> Vec<String> {
    if value.is_empty() {
        Vec::new()
    } else {
        value.split(',').map(|s| s.to_string()).collect()
    }
}

impl ItemStore {
    /// Wraps an already-migrated pool. Schema/pragma setup lives in
    /// `DbService::connect` (spec §10.1) — this type owns queries only.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn save(&self, record: &MediaRecord) -> StoreResult<()> {
        let mut record = record.clone();
        if record.timestamps.ingest_at.is_none() {
            record.timestamps.ingest_at = Some(Utc::now().to_rfc3339());
        }
        self.upsert_one(&self.pool, &record).await
    }

    pub async fn save_batch(&self, records: &[MediaRecord]) -> StoreResult<SaveBatchOutcome> {
        let total = records.len();
        if total == 0 {
            return Ok(SaveBatchOutcome { successful: 0, failed: 0, total: 0 });
        }

        let mut tx = self.pool.begin().await?;
        let mut ok = true;
        for record in records {
            let mut record = record.clone();
            if record.timestamps.ingest_at.is_none() {
                record.timestamps.ingest_at = Some(Utc::now().to_rfc3339());
            }
            if let Err(err) = Self::upsert_one_tx(&mut tx, &record).await {
                tracing::warn!(item_id = %record.id, error = %err, "batch upsert failed, falling back to row-by-row");
                ok = false;
                break;
            }
        }

        if ok {
            tx.commit().await?;
            return Ok(SaveBatchOutcome { successful: total, failed: 0, total });
        }

        // Fall back to row-by-row outside the aborted transaction.
        let mut successful = 0usize;
        let mut failed = 0usize;
        for record in records {
            let mut record = record.clone();
            if record.timestamps.ingest_at.is_none() {
                record.timestamps.ingest_at = Some(Utc::now().to_rfc3339());
            }
            match self.upsert_one(&self.pool, &record).await {
                Ok(_) => successful += 1,
                Err(err) => {
                    tracing::error!(item_id = %record.id, error = %err, "row-by-row upsert failed");
                    failed += 1;
                }
            }
        }

        Ok(SaveBatchOutcome { successful, failed, total })
    }

    async fn upsert_one(&self, pool: &SqlitePool, record: &MediaRecord) -> StoreResult<()> {
        let mut conn = pool.acquire().await?;
        Self::bind_upsert(sqlx::query(UPSERT_SQL), record.clone())
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    async fn upsert_one_tx(tx: &mut Transaction<'_, Sqlite>, record: &MediaRecord) -> StoreResult<()> {
        Self::bind_upsert(sqlx::query(UPSERT_SQL), record.clone())
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Binds every column from an owned `MediaRecord` clone. Takes ownership
    /// (rather than borrowing) so the bound values can outlive this call —
    /// `video`/`audio`/`subtitle` are themselves defaulted-and-cloned locals.
    fn bind_upsert(
        query: sqlx::query::Query<'static, Sqlite, sqlx::sqlite::SqliteArguments<'static>>,
        record: MediaRecord,
    ) -> sqlx::query::Query<'static, Sqlite, sqlx::sqlite::SqliteArguments<'static>> {
        let video = record.video.clone().unwrap_or_default();
        let audio = record.audio.clone().unwrap_or_default();
        let subtitle = record.subtitle.clone().unwrap_or_default();
        let fingerprint = record.fingerprint().to_hex();
        let ingest_at = record.timestamps.ingest_at.clone().unwrap();

        query
            .bind(record.id)
            .bind(record.name)
            .bind(record.kind.as_str())
            .bind(record.series_id)
            .bind(record.series_name)
            .bind(record.season_id)
            .bind(record.season_number)
            .bind(record.episode_number)
            .bind(record.parent_id)
            .bind(record.year)
            .bind(record.overview)
            .bind(record.tagline)
            .bind(record.official_rating)
            .bind(join_list(&record.genres))
            .bind(join_list(&record.studios))
            .bind(join_list(&record.tags))
            .bind(video.height)
            .bind(video.width)
            .bind(video.codec)
            .bind(video.profile)
            .bind(video.level)
            .bind(video.range.unwrap_or_else(|| "SDR".to_string()))
            .bind(video.framerate)
            .bind(video.bitrate)
            .bind(video.bitdepth)
            .bind(video.color_space)
            .bind(video.color_transfer)
            .bind(video.color_primaries)
            .bind(video.pixel_format)
            .bind(audio.codec)
            .bind(audio.channels)
            .bind(audio.language)
            .bind(audio.bitrate)
            .bind(audio.sample_rate)
            .bind(audio.is_default)
            .bind(subtitle.codec)
            .bind(subtitle.language)
            .bind(subtitle.is_default)
            .bind(subtitle.is_forced)
            .bind(subtitle.is_external)
            .bind(record.provider_ids.imdb)
            .bind(record.provider_ids.tmdb)
            .bind(record.provider_ids.tvdb)
            .bind(record.provider_ids.tvdb_slug)
            .bind(record.file_path)
            .bind(record.file_size)
            .bind(record.library_name)
            .bind(record.images.primary)
            .bind(record.images.backdrop)
            .bind(record.images.logo)
            .bind(record.images.thumb)
            .bind(record.images.banner)
            .bind(record.images.parent_primary)
            .bind(record.images.parent_thumb)
            .bind(record.images.series_primary)
            .bind(record.images.series_logo)
            .bind(record.images.series_backdrop)
            .bind(record.server.id)
            .bind(record.server.name)
            .bind(record.server.version)
            .bind(record.server.url)
            .bind(record.timestamps.created_at)
            .bind(record.timestamps.modified_at)
            .bind(record.timestamps.premiere_date)
            .bind(ingest_at)
            .bind(fingerprint)
    }

    pub async fn get(&self, id: &str) -> StoreResult<Option<MediaRecord>> {
        let row = sqlx::query("SELECT * FROM media_items WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| Self::row_to_record(&r)))
    }

    pub async fn get_by_kind(&self, kind: MediaKind, limit: Option<i64>) -> StoreResult<Vec<MediaRecord>> {
        let limit = limit.unwrap_or(200);
        let rows = sqlx::query(
            "SELECT * FROM media_items WHERE kind = ?1 ORDER BY ingest_at DESC LIMIT ?2",
        )
        .bind(kind.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(Self::row_to_record).collect())
    }

    pub async fn get_fingerprint(&self, id: &str) -> StoreResult<Option<Fingerprint>> {
        let row = sqlx::query("SELECT fingerprint FROM media_items WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            None => Ok(None),
            Some(r) => {
                let hex: String = r.try_get("fingerprint")?;
                Fingerprint::from_hex(&hex)
                    .map(Some)
                    .ok_or_else(|| StoreError::InvalidFingerprint(id.to_string()))
            }
        }
    }

    pub async fn delete(&self, id: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM media_items WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn stats(&self) -> StoreResult<StoreStats> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM media_items")
            .fetch_one(&self.pool)
            .await?;

        let kind_rows = sqlx::query("SELECT kind, COUNT(*) as c FROM media_items GROUP BY kind")
            .fetch_all(&self.pool)
            .await?;
        let mut by_kind = HashMap::new();
        for row in kind_rows {
            let kind: String = row.try_get("kind")?;
            let count: i64 = row.try_get("c")?;
            by_kind.insert(kind, count);
        }

        let cutoff = (Utc::now() - chrono::Duration::hours(24)).to_rfc3339();
        let recent_24h: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM media_items WHERE ingest_at >= ?1")
                .bind(&cutoff)
                .fetch_one(&self.pool)
                .await?;

        let disk_bytes: i64 = sqlx::query_scalar(
            "SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()",
        )
        .fetch_one(&self.pool)
        .await
        .unwrap_or(0);

        Ok(StoreStats { total, by_kind, recent_24h, disk_bytes })
    }

    /// Soft-fails on purpose (spec §4.A: "vacuum failures are soft").
    pub async fn vacuum(&self) {
        if let Err(err) = sqlx::query("VACUUM").execute(&self.pool).await {
            tracing::warn!(error = %err, "vacuum failed, skipping");
            return;
        }
        let now = Utc::now().to_rfc3339();
        if let Err(err) = sqlx::query("UPDATE service_state SET last_vacuum_at = ?1 WHERE id = 1")
            .bind(&now)
            .execute(&self.pool)
            .await
        {
            tracing::warn!(error = %err, "failed to record vacuum timestamp");
        }
    }

    pub async fn update_last_sync_time(&self, sync_type: &str, items_processed: i64) -> StoreResult<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO sync_status (sync_type, last_sync_at, items_processed) VALUES (?1, ?2, ?3)",
        )
        .bind(sync_type)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map(|_| ())?;
        let _ = items_processed;
        Ok(())
    }

    pub async fn get_last_sync_time(&self, sync_type: &str) -> StoreResult<Option<String>> {
        let row = sqlx::query(
            "SELECT last_sync_at FROM sync_status WHERE sync_type = ?1 ORDER BY id DESC LIMIT 1",
        )
        .bind(sync_type)
        .fetch_optional(&self.pool)
        .await?;
        Ok(match row {
            Some(r) => Some(r.try_get("last_sync_at")?),
            None => None,
        })
    }

    pub async fn get_cached_rating(
        &self,
        imdb_id: Option<&str>,
        tmdb_id: Option<&str>,
        tvdb_id: Option<&str>,
    ) -> StoreResult<Option<String>> {
        let row = sqlx::query(
            "SELECT payload FROM ratings_cache \
             WHERE ((imdb_id IS NOT NULL AND imdb_id = ?1) \
                OR (tmdb_id IS NOT NULL AND tmdb_id = ?2) \
                OR (tvdb_id IS NOT NULL AND tvdb_id = ?3)) \
             AND expires_at > ?4 LIMIT 1",
        )
        .bind(imdb_id)
        .bind(tmdb_id)
        .bind(tvdb_id)
        .bind(Utc::now().to_rfc3339())
        .fetch_optional(&self.pool)
        .await?;
        Ok(match row {
            Some(r) => Some(r.try_get("payload")?),
            None => None,
        })
    }

    pub async fn put_cached_rating(
        &self,
        imdb_id: Option<&str>,
        tmdb_id: Option<&str>,
        tvdb_id: Option<&str>,
        payload: &str,
        ttl: chrono::Duration,
    ) -> StoreResult<()> {
        let expires_at = (Utc::now() + ttl).to_rfc3339();
        sqlx::query(
            "INSERT INTO ratings_cache (imdb_id, tmdb_id, tvdb_id, payload, expires_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(imdb_id)
        .bind(tmdb_id)
        .bind(tvdb_id)
        .bind(payload)
        .bind(&expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Soft-fails on purpose, same as `vacuum`.
    pub async fn purge_expired_ratings(&self) {
        let now = Utc::now().to_rfc3339();
        if let Err(err) = sqlx::query("DELETE FROM ratings_cache WHERE expires_at <= ?1")
            .bind(&now)
            .execute(&self.pool)
            .await
        {
            tracing::warn!(error = %err, "ratings cache purge failed, skipping");
        }
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> MediaRecord {
        let kind: String = row.try_get("kind").unwrap_or_default();
        let video_range: Option<String> = row.try_get("video_range").ok();

        MediaRecord {
            id: row.try_get("id").unwrap_or_default(),
            name: row.try_get("name").unwrap_or_default(),
            kind: MediaKind::from(kind.as_str()),
            series_id: row.try_get("series_id").ok(),
            series_name: row.try_get("series_name").ok(),
            season_id: row.try_get("season_id").ok(),
            season_number: row.try_get("season_number").ok(),
            episode_number: row.try_get("episode_number").ok(),
            parent_id: row.try_get("parent_id").ok(),
            year: row.try_get("year").ok(),
            overview: row.try_get("overview").ok(),
            tagline: row.try_get("tagline").ok(),
            official_rating: row.try_get("official_rating").ok(),
            genres: split_list(&row.try_get::<String, _>("genres").unwrap_or_default()),
            studios: split_list(&row.try_get::<String, _>("studios").unwrap_or_default()),
            tags: split_list(&row.try_get::<String, _>("tags").unwrap_or_default()),
            video: Some(VideoStream {
                height: row.try_get("video_height").ok(),
                width: row.try_get("video_width").ok(),
                codec: row.try_get("video_codec").ok(),
                profile: row.try_get("video_profile").ok(),
                level: row.try_get("video_level").ok(),
                range: video_range,
                framerate: row.try_get("video_framerate").ok(),
                bitrate: row.try_get("video_bitrate").ok(),
                bitdepth: row.try_get("video_bitdepth").ok(),
                color_space: row.try_get("video_color_space").ok(),
                color_transfer: row.try_get("video_color_transfer").ok(),
                color_primaries: row.try_get("video_color_primaries").ok(),
                pixel_format: row.try_get("video_pixel_format").ok(),
            }),
            audio: Some(AudioStream {
                codec: row.try_get("audio_codec").ok(),
                channels: row.try_get("audio_channels").ok(),
                language: row.try_get("audio_language").ok(),
                bitrate: row.try_get("audio_bitrate").ok(),
                sample_rate: row.try_get("audio_sample_rate").ok(),
                is_default: row.try_get("audio_is_default").unwrap_or(false),
            }),
            subtitle: Some(SubtitleStream {
                codec: row.try_get("subtitle_codec").ok(),
                language: row.try_get("subtitle_language").ok(),
                is_default: row.try_get("subtitle_is_default").unwrap_or(false),
                is_forced: row.try_get("subtitle_is_forced").unwrap_or(false),
                is_external: row.try_get("subtitle_is_external").unwrap_or(false),
            }),
            provider_ids: ProviderIds {
                imdb: row.try_get("imdb_id").ok(),
                tmdb: row.try_get("tmdb_id").ok(),
                tvdb: row.try_get("tvdb_id").ok(),
                tvdb_slug: row.try_get("tvdb_slug").ok(),
            },
            file_path: row.try_get("file_path").ok(),
            file_size: row.try_get("file_size").ok(),
            library_name: row.try_get("library_name").ok(),
            images: ImageTags {
                primary: row.try_get("image_primary_tag").ok(),
                backdrop: row.try_get("image_backdrop_tag").ok(),
                logo: row.try_get("image_logo_tag").ok(),
                thumb: row.try_get("image_thumb_tag").ok(),
                banner: row.try_get("image_banner_tag").ok(),
                parent_primary: row.try_get("image_parent_primary_tag").ok(),
                parent_thumb: row.try_get("image_parent_thumb_tag").ok(),
                series_primary: row.try_get("image_series_primary_tag").ok(),
                series_logo: row.try_get("image_series_logo_tag").ok(),
                series_backdrop: row.try_get("image_series_backdrop_tag").ok(),
            },
            server: ServerContext {
                id: row.try_get("server_id").ok(),
                name: row.try_get("server_name").ok(),
                version: row.try_get("server_version").ok(),
                url: row.try_get("server_url").ok(),
            },
            timestamps: MediaTimestamps {
                created_at: row.try_get("created_at").ok(),
                modified_at: row.try_get("modified_at").ok(),
                premiere_date: row.try_get("premiere_date").ok(),
                ingest_at: row.try_get("ingest_at").ok(),
            },
            ..Default::default()
        }
    }
}

const UPSERT_SQL: &str = "\
INSERT INTO media_items (
    id, name, kind, series_id, series_name, season_id, season_number, episode_number,
    parent_id, year, overview, tagline, official_rating, genres, studios, tags,
    video_height, video_width, video_codec, video_profile, video_level, video_range,
    video_framerate, video_bitrate, video_bitdepth, video_color_space, video_color_transfer,
    video_color_primaries, video_pixel_format,
    audio_codec, audio_channels, audio_language, audio_bitrate, audio_sample_rate, audio_is_default,
    subtitle_codec, subtitle_language, subtitle_is_default, subtitle_is_forced, subtitle_is_external,
    imdb_id, tmdb_id, tvdb_id, tvdb_slug,
    file_path, file_size, library_name,
    image_primary_tag, image_backdrop_tag, image_logo_tag, image_thumb_tag, image_banner_tag,
    image_parent_primary_tag, image_parent_thumb_tag, image_series_primary_tag, image_series_logo_tag,
    image_series_backdrop_tag,
    server_id, server_name, server_version, server_url,
    created_at, modified_at, premiere_date, ingest_at, fingerprint
) VALUES (
    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
    ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29,
    ?30, ?31, ?32, ?33, ?34, ?35,
    ?36, ?37, ?38, ?39, ?40,
    ?41, ?42, ?43, ?44,
    ?45, ?46, ?47,
    ?48, ?49, ?50, ?51, ?52, ?53, ?54, ?55, ?56, ?57,
    ?58, ?59, ?60, ?61,
    ?62, ?63, ?64, ?65, ?66
)
ON CONFLICT(id) DO UPDATE SET
    name=excluded.name, kind=excluded.kind, series_id=excluded.series_id,
    series_name=excluded.series_name, season_id=excluded.season_id,
    season_number=excluded.season_number, episode_number=excluded.episode_number,
    parent_id=excluded.parent_id, year=excluded.year, overview=excluded.overview,
    tagline=excluded.tagline, official_rating=excluded.official_rating, genres=excluded.genres,
    studios=excluded.studios, tags=excluded.tags,
    video_height=excluded.video_height, video_width=excluded.video_width,
    video_codec=excluded.video_codec, video_profile=excluded.video_profile,
    video_level=excluded.video_level, video_range=excluded.video_range,
    video_framerate=excluded.video_framerate, video_bitrate=excluded.video_bitrate,
    video_bitdepth=excluded.video_bitdepth, video_color_space=excluded.video_color_space,
    video_color_transfer=excluded.video_color_transfer, video_color_primaries=excluded.video_color_primaries,
    video_pixel_format=excluded.video_pixel_format,
    audio_codec=excluded.audio_codec, audio_channels=excluded.audio_channels,
    audio_language=excluded.audio_language, audio_bitrate=excluded.audio_bitrate,
    audio_sample_rate=excluded.audio_sample_rate, audio_is_default=excluded.audio_is_default,
    subtitle_codec=excluded.subtitle_codec, subtitle_language=excluded.subtitle_language,
    subtitle_is_default=excluded.subtitle_is_default, subtitle_is_forced=excluded.subtitle_is_forced,
    subtitle_is_external=excluded.subtitle_is_external,
    imdb_id=excluded.imdb_id, tmdb_id=excluded.tmdb_id, tvdb_id=excluded.tvdb_id, tvdb_slug=excluded.tvdb_slug,
    file_path=excluded.file_path, file_size=excluded.file_size, library_name=excluded.library_name,
    image_primary_tag=excluded.image_primary_tag, image_backdrop_tag=excluded.image_backdrop_tag,
    image_logo_tag=excluded.image_logo_tag, image_thumb_tag=excluded.image_thumb_tag,
    image_banner_tag=excluded.image_banner_tag, image_parent_primary_tag=excluded.image_parent_primary_tag,
    image_parent_thumb_tag=excluded.image_parent_thumb_tag, image_series_primary_tag=excluded.image_series_primary_tag,
    image_series_logo_tag=excluded.image_series_logo_tag, image_series_backdrop_tag=excluded.image_series_backdrop_tag,
    server_id=excluded.server_id, server_name=excluded.server_name, server_version=excluded.server_version,
    server_url=excluded.server_url,
    created_at=excluded.created_at, modified_at=excluded.modified_at, premiere_date=excluded.premiere_date,
    ingest_at=excluded.ingest_at, fingerprint=excluded.fingerprint
";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VideoStream as Vs;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_store() -> ItemStore {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .expect("in-memory pool");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("migrations");
        ItemStore::new(pool)
    }

    fn sample(id: &str) -> MediaRecord {
        MediaRecord {
            id: id.into(),
            name: "Arrival".into(),
            kind: MediaKind::Movie,
            video: Some(Vs { height: Some(1080), codec: Some("h264".into()), ..Default::default() }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn save_then_get_roundtrips() {
        let store = memory_store().await;
        let record = sample("1");
        store.save(&record).await.unwrap();

        let fetched = store.get("1").await.unwrap().expect("record present");
        assert_eq!(fetched.name, "Arrival");
        assert_eq!(fetched.video.unwrap().height, Some(1080));
    }

    #[tokio::test]
    async fn save_upserts_by_id() {
        let store = memory_store().await;
        store.save(&sample("1")).await.unwrap();
        let mut updated = sample("1");
        updated.name = "Arrival (Extended)".into();
        store.save(&updated).await.unwrap();

        let fetched = store.get("1").await.unwrap().unwrap();
        assert_eq!(fetched.name, "Arrival (Extended)");

        let all = store.get_by_kind(MediaKind::Movie, None).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn save_batch_commits_all() {
        let store = memory_store().await;
        let records = vec![sample("1"), sample("2"), sample("3")];
        let outcome = store.save_batch(&records).await.unwrap();
        assert_eq!(outcome, SaveBatchOutcome { successful: 3, failed: 0, total: 3 });

        let all = store.get_by_kind(MediaKind::Movie, None).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn get_fingerprint_matches_full_record() {
        let store = memory_store().await;
        let record = sample("1");
        store.save(&record).await.unwrap();

        let fp = store.get_fingerprint("1").await.unwrap().unwrap();
        assert_eq!(fp, record.fingerprint());
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let store = memory_store().await;
        store.save(&sample("1")).await.unwrap();
        store.delete("1").await.unwrap();
        assert!(store.get("1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn ratings_cache_roundtrip_and_expiry() {
        let store = memory_store().await;
        store
            .put_cached_rating(Some("tt1"), None, None, "{\"rating\":8.1}", chrono::Duration::hours(1))
            .await
            .unwrap();

        let cached = store.get_cached_rating(Some("tt1"), None, None).await.unwrap();
        assert_eq!(cached.as_deref(), Some("{\"rating\":8.1}"));

        store
            .put_cached_rating(Some("tt2"), None, None, "{\"rating\":1}", chrono::Duration::seconds(-1))
            .await
            .unwrap();
        store.purge_expired_ratings().await;
        let expired = store.get_cached_rating(Some("tt2"), None, None).await.unwrap();
        assert!(expired.is_none());
    }
}
