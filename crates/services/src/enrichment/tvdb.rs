use db::models::MediaRecord;
use reqwest::Client;
use serde::Deserialize;

use super::{EnrichmentError, Provider, ProviderBundle, RatingValue};

#[derive(Debug, Deserialize)]
struct TvdbEnvelope {
    data: TvdbSeries,
}

#[derive(Debug, Deserialize)]
struct TvdbSeries {
    name: Option<String>,
    overview: Option<String>,
    #[serde(rename = "firstAired")]
    first_aired: Option<String>,
    score: Option<f64>,
    #[serde(default)]
    genres: Vec<TvdbGenre>,
    image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TvdbGenre {
    name: String,
}

pub struct TvdbProvider {
    api_token: String,
    http: Client,
}

impl TvdbProvider {
    pub fn new(api_token: String) -> Self {
        Self { api_token, http: Client::new() }
    }
}

#[async_trait::async_trait]
impl Provider for TvdbProvider {
    fn name(&self) -> &'static str {
        "tvdb"
    }

    async fn fetch(&self, record: &MediaRecord) -> Result<ProviderBundle, EnrichmentError> {
        let tvdb_id = record.provider_ids.tvdb.as_ref().ok_or(EnrichmentError::NoIdentifier)?;
        let url = format!("https://api4.thetvdb.com/v4/series/{tvdb_id}/extended");

        let resp: TvdbEnvelope = self
            .http
            .get(&url)
            .bearer_auth(&self.api_token)
            .send()
            .await?
            .json()
            .await?;

        let ratings = resp
            .data
            .score
            .filter(|v| *v > 0.0)
            .map(|v| RatingValue {
                source: "tvdb".to_string(),
                value: format!("{v}/10"),
                normalized: v,
            })
            .into_iter()
            .collect();

        Ok(ProviderBundle {
            title: resp.data.name,
            year: resp.data.first_aired.and_then(|d| d.split('-').next().and_then(|y| y.parse().ok())),
            runtime_minutes: None,
            genres: resp.data.genres.into_iter().map(|g| g.name).collect(),
            actors: Vec::new(),
            overview: resp.data.overview,
            ratings,
            poster_url: resp.data.image,
            backdrop_url: None,
        })
    }
}
