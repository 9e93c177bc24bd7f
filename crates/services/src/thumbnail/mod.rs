//! Thumbnail Resolver (spec §4.E). Grounded on `original_source/jellyfin_api.py`
//! (image tag extraction) and `network_utils.py` (HEAD-probe pattern).

use std::time::Duration;

use db::models::{MediaKind, MediaRecord};
use moka::future::Cache;
use reqwest::Client;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const CACHE_TTL: Duration = Duration::from_secs(3600);
const CACHE_CAPACITY: u64 = 500;

pub struct ThumbnailResolver {
    server_url: String,
    http: Client,
    cache: Cache<String, Option<String>>,
}

/// Reformats an identifier without separators into the canonical
/// 8-4-4-4-12 hyphenated UUID form (spec §4.E).
fn hyphenate(id: &str) -> String {
    utils::time::hyphenate_uuid(id)
}

impl ThumbnailResolver {
    pub fn new(server_url: String) -> Self {
        Self {
            server_url,
            http: Client::builder().timeout(PROBE_TIMEOUT).build().expect("http client"),
            cache: Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(CACHE_TTL)
                .build(),
        }
    }

    fn image_url(&self, item_id: &str, image_type: &str, tag: Option<&str>) -> String {
        let mut url = format!(
            "{}/Items/{}/Images/{}?quality=90&maxWidth=500&maxHeight=400",
            self.server_url.trim_end_matches('/'),
            hyphenate(item_id),
            image_type,
        );
        if let Some(tag) = tag {
            url.push_str(&format!("&tag={tag}"));
        }
        url
    }

    fn candidates(&self, record: &MediaRecord) -> Vec<String> {
        let images = &record.images;
        match record.kind {
            MediaKind::Episode => vec![
                images.primary.as_ref().map(|t| self.image_url(&record.id, "Primary", Some(t))),
                record.season_id.as_ref().and_then(|sid| {
                    images.parent_primary.as_ref().map(|t| self.image_url(sid, "Primary", Some(t)))
                }),
                record.series_id.as_ref().and_then(|sid| {
                    images.series_primary.as_ref().map(|t| self.image_url(sid, "Primary", Some(t)))
                }),
                record.series_id.as_ref().and_then(|sid| {
                    images.series_logo.as_ref().map(|t| self.image_url(sid, "Logo", Some(t)))
                }),
            ],
            MediaKind::Season => vec![
                images.primary.as_ref().map(|t| self.image_url(&record.id, "Primary", Some(t))),
                record.series_id.as_ref().and_then(|sid| {
                    images.series_primary.as_ref().map(|t| self.image_url(sid, "Primary", Some(t)))
                }),
                record.series_id.as_ref().and_then(|sid| {
                    images.series_logo.as_ref().map(|t| self.image_url(sid, "Logo", Some(t)))
                }),
            ],
            MediaKind::Series => vec![
                images.primary.as_ref().map(|t| self.image_url(&record.id, "Primary", Some(t))),
                images.logo.as_ref().map(|t| self.image_url(&record.id, "Logo", Some(t))),
                images.backdrop.as_ref().map(|t| self.image_url(&record.id, "Backdrop", Some(t))),
            ],
            MediaKind::Movie => vec![
                images.primary.as_ref().map(|t| self.image_url(&record.id, "Primary", Some(t))),
                images.backdrop.as_ref().map(|t| self.image_url(&record.id, "Backdrop", Some(t))),
            ],
            MediaKind::Audio | MediaKind::MusicAlbum => vec![
                images.primary.as_ref().map(|t| self.image_url(&record.id, "Primary", Some(t))),
                record.parent_id.as_ref().and_then(|pid| {
                    images.parent_primary.as_ref().map(|t| self.image_url(pid, "Primary", Some(t)))
                }),
            ],
            _ => vec![
                images.primary.as_ref().map(|t| self.image_url(&record.id, "Primary", Some(t))),
                images.thumb.as_ref().map(|t| self.image_url(&record.id, "Thumb", Some(t))),
            ],
        }
        .into_iter()
        .flatten()
        .collect()
    }

    /// HEAD-probes candidates in order; first 200/206 with an `image/*`
    /// content type wins. Both positive and negative outcomes are cached.
    pub async fn resolve(&self, record: &MediaRecord) -> Option<String> {
        let candidates = self.candidates(record);
        if let Some(cache_key) = candidates.first().cloned() {
            if let Some(cached) = self.cache.get(&cache_key).await {
                return cached;
            }
        }

        for url in &candidates {
            if self.probe(url).await {
                if let Some(key) = candidates.first() {
                    self.cache.insert(key.clone(), Some(url.clone())).await;
                }
                return Some(url.clone());
            }
        }

        if let Some(key) = candidates.first() {
            self.cache.insert(key.clone(), None).await;
        }
        None
    }

    async fn probe(&self, url: &str) -> bool {
        match self.http.head(url).send().await {
            Ok(response) => {
                let status_ok = matches!(response.status().as_u16(), 200 | 206);
                let content_type_ok = response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(|ct| ct.starts_with("image/"))
                    .unwrap_or(false);
                status_ok && content_type_ok
            }
            Err(err) => {
                tracing::debug!(url, error = %err, "thumbnail probe failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use db::models::ImageTags;

    #[test]
    fn episode_candidate_order() {
        let resolver = ThumbnailResolver::new("http://jf:8096".to_string());
        let record = MediaRecord {
            id: "ep1".into(),
            kind: MediaKind::Episode,
            series_id: Some("series1".into()),
            season_id: Some("season1".into()),
            images: ImageTags {
                primary: Some("tag-ep".into()),
                series_primary: Some("tag-series".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let candidates = resolver.candidates(&record);
        assert_eq!(candidates.len(), 2);
        assert!(candidates[0].contains("ep1"));
        assert!(candidates[1].contains("series1"));
    }

    #[test]
    fn hyphenates_bare_ids_in_urls() {
        let resolver = ThumbnailResolver::new("http://jf:8096".to_string());
        let url = resolver.image_url("0123456789abcdef0123456789abcdef", "Primary", Some("t"));
        assert!(url.contains("01234567-89ab-cdef-0123-456789abcdef"));
    }
}
