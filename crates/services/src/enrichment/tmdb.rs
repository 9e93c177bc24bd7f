use db::models::MediaRecord;
use reqwest::Client;
use serde::Deserialize;

use super::{EnrichmentError, Provider, ProviderBundle, RatingValue};

#[derive(Debug, Deserialize)]
struct TmdbResponse {
    title: Option<String>,
    name: Option<String>,
    release_date: Option<String>,
    first_air_date: Option<String>,
    overview: Option<String>,
    vote_average: Option<f64>,
    #[serde(default)]
    genres: Vec<TmdbGenre>,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmdbGenre {
    name: String,
}

pub struct TmdbProvider {
    api_key: String,
    http: Client,
}

impl TmdbProvider {
    pub fn new(api_key: String) -> Self {
        Self { api_key, http: Client::new() }
    }
}

#[async_trait::async_trait]
impl Provider for TmdbProvider {
    fn name(&self) -> &'static str {
        "tmdb"
    }

    async fn fetch(&self, record: &MediaRecord) -> Result<ProviderBundle, EnrichmentError> {
        let path = if let Some(tmdb_id) = &record.provider_ids.tmdb {
            format!("movie/{tmdb_id}")
        } else {
            return Err(EnrichmentError::NoIdentifier);
        };

        let url = format!(
            "https://api.themoviedb.org/3/{path}?api_key={}",
            self.api_key
        );
        let resp: TmdbResponse = self.http.get(&url).send().await?.json().await?;

        let ratings = resp
            .vote_average
            .filter(|v| *v > 0.0)
            .map(|v| RatingValue {
                source: "tmdb".to_string(),
                value: format!("{v}/10"),
                normalized: v,
            })
            .into_iter()
            .collect();

        Ok(ProviderBundle {
            title: resp.title.or(resp.name),
            year: resp
                .release_date
                .or(resp.first_air_date)
                .and_then(|d| d.split('-').next().and_then(|y| y.parse().ok())),
            runtime_minutes: None,
            genres: resp.genres.into_iter().map(|g| g.name).collect(),
            actors: Vec::new(),
            overview: resp.overview,
            ratings,
            poster_url: resp.poster_path.map(|p| format!("https://image.tmdb.org/t/p/original{p}")),
            backdrop_url: resp.backdrop_path.map(|p| format!("https://image.tmdb.org/t/p/original{p}")),
        })
    }
}
