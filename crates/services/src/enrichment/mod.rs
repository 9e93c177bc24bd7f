//! Metadata Enricher (spec §4.D). Fans out to OMDb/TMDb/TVDb-shaped
//! providers concurrently (capped at 3 in-flight), unifies their ratings
//! into a single normalized scale, and caches both hits and misses.
//! Grounded on `original_source/metadata_services.py` (`_create_ratings_summary`,
//! `_normalize_rating`) and `metadata_omdb.py`/`metadata_tmdb.py`/`metadata_tvdb.py`.

pub mod error;
pub mod omdb;
pub mod tmdb;
pub mod tvdb;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use db::models::MediaRecord;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

pub use error::EnrichmentError;
pub use omdb::OmdbProvider;
pub use tmdb::TmdbProvider;
pub use tvdb::TvdbProvider;

const DEFAULT_CONCURRENCY: usize = 3;
const DEFAULT_TTL_HOURS: u64 = 168;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderBundle {
    pub title: Option<String>,
    pub year: Option<i64>,
    pub runtime_minutes: Option<i64>,
    pub genres: Vec<String>,
    pub actors: Vec<String>,
    pub overview: Option<String>,
    pub ratings: Vec<RatingValue>,
    pub poster_url: Option<String>,
    pub backdrop_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingValue {
    pub source: String,
    pub value: String,
    /// Unified to a 0-10 scale.
    pub normalized: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrichedMetadata {
    pub omdb: Option<ProviderBundle>,
    pub tmdb: Option<ProviderBundle>,
    pub tvdb: Option<ProviderBundle>,
    pub ratings: HashMap<String, RatingValue>,
}

/// Parses a rating string in one of the formats §4.D names and returns it
/// normalized to a 0-10 scale.
pub fn normalize_rating(value: &str, format: &str) -> Option<f64> {
    let trimmed = value.trim();
    match format {
        "/10" => trimmed.split('/').next()?.parse::<f64>().ok(),
        "%" => trimmed.trim_end_matches('%').parse::<f64>().ok().map(|v| v / 10.0),
        "/100" => trimmed.split('/').next()?.parse::<f64>().ok().map(|v| v / 10.0),
        _ => {
            let mut parts = trimmed.split('/');
            let x: f64 = parts.next()?.parse().ok()?;
            let y: f64 = parts.next()?.parse().ok()?;
            if y == 0.0 {
                None
            } else {
                Some(x / y * 10.0)
            }
        }
    }
}

#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn fetch(&self, record: &MediaRecord) -> Result<ProviderBundle, EnrichmentError>;
}

pub struct Enricher {
    providers: Vec<Arc<dyn Provider>>,
    cache: Cache<String, Option<ProviderBundle>>,
    concurrency: Arc<Semaphore>,
}

fn cache_key(provider: &str, record: &MediaRecord) -> String {
    if let Some(imdb) = &record.provider_ids.imdb {
        return format!("{provider}:imdb:{imdb}");
    }
    if let Some(tmdb) = &record.provider_ids.tmdb {
        return format!("{provider}:tmdb:{tmdb}");
    }
    if let Some(tvdb) = &record.provider_ids.tvdb {
        return format!("{provider}:tvdb:{tvdb}");
    }
    format!("{provider}:name:{}:{}", record.name, record.year.unwrap_or(0))
}

impl Enricher {
    pub fn new(providers: Vec<Arc<dyn Provider>>) -> Self {
        Self {
            providers,
            cache: Cache::builder()
                .time_to_live(Duration::from_secs(DEFAULT_TTL_HOURS * 3600))
                .build(),
            concurrency: Arc::new(Semaphore::new(DEFAULT_CONCURRENCY)),
        }
    }

    /// Fans out to every configured provider concurrently, swallowing
    /// per-provider errors to `None` so enrichment never fails a delivery.
    pub async fn enrich(&self, record: &MediaRecord) -> EnrichedMetadata {
        if record.provider_ids.is_empty() && record.name.is_empty() {
            return EnrichedMetadata::default();
        }

        let mut handles = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            let provider = provider.clone();
            let record = record.clone();
            let cache = self.cache.clone();
            let permit = self.concurrency.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permit.acquire_owned().await.ok()?;
                let key = cache_key(provider.name(), &record);
                if let Some(cached) = cache.get(&key).await {
                    return cached.map(|bundle| (provider.name(), bundle));
                }

                let result = provider.fetch(&record).await.ok();
                cache.insert(key, result.clone()).await;
                result.map(|bundle| (provider.name(), bundle))
            }));
        }

        let mut metadata = EnrichedMetadata::default();
        for handle in handles {
            let Ok(Some((name, bundle))) = handle.await else { continue };
            for rating in &bundle.ratings {
                metadata.ratings.insert(rating.source.clone(), rating.clone());
            }
            match name {
                "omdb" => metadata.omdb = Some(bundle),
                "tmdb" => metadata.tmdb = Some(bundle),
                "tvdb" => metadata.tvdb = Some(bundle),
                _ => {}
            }
        }

        metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_rating_formats() {
        assert_eq!(normalize_rating("8.1/10", "/10"), Some(8.1));
        assert_eq!(normalize_rating("94%", "%"), Some(9.4));
        assert_eq!(normalize_rating("76/100", "/100"), Some(7.6));
        assert_eq!(normalize_rating("4/5", "x/y"), Some(8.0));
    }

    #[test]
    fn normalize_rating_rejects_garbage() {
        assert_eq!(normalize_rating("N/A", "/10"), None);
    }
}
