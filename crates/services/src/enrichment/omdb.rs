use db::models::MediaRecord;
use reqwest::Client;
use serde::Deserialize;

use super::{normalize_rating, EnrichmentError, Provider, ProviderBundle, RatingValue};

#[derive(Debug, Deserialize)]
struct OmdbResponse {
    #[serde(rename = "Title")]
    title: Option<String>,
    #[serde(rename = "Year")]
    year: Option<String>,
    #[serde(rename = "Runtime")]
    runtime: Option<String>,
    #[serde(rename = "Genre")]
    genre: Option<String>,
    #[serde(rename = "Actors")]
    actors: Option<String>,
    #[serde(rename = "Plot")]
    plot: Option<String>,
    #[serde(rename = "imdbRating")]
    imdb_rating: Option<String>,
    #[serde(rename = "Metascore")]
    metascore: Option<String>,
    #[serde(rename = "Poster")]
    poster: Option<String>,
    #[serde(rename = "Ratings", default)]
    ratings: Vec<OmdbRating>,
}

#[derive(Debug, Deserialize)]
struct OmdbRating {
    #[serde(rename = "Source")]
    source: String,
    #[serde(rename = "Value")]
    value: String,
}

pub struct OmdbProvider {
    api_key: String,
    http: Client,
}

impl OmdbProvider {
    pub fn new(api_key: String) -> Self {
        Self { api_key, http: Client::new() }
    }
}

#[async_trait::async_trait]
impl Provider for OmdbProvider {
    fn name(&self) -> &'static str {
        "omdb"
    }

    async fn fetch(&self, record: &MediaRecord) -> Result<ProviderBundle, EnrichmentError> {
        let mut url = format!("https://www.omdbapi.com/?apikey={}", self.api_key);
        if let Some(imdb) = &record.provider_ids.imdb {
            url.push_str(&format!("&i={imdb}"));
        } else {
            url.push_str(&format!("&t={}", urlencoding_lite(&record.name)));
            if let Some(year) = record.year {
                url.push_str(&format!("&y={year}"));
            }
        }

        let resp: OmdbResponse = self.http.get(&url).send().await?.json().await?;

        let mut ratings = Vec::new();
        if let Some(v) = &resp.imdb_rating {
            if v != "N/A" {
                if let Some(normalized) = normalize_rating(v, "/10") {
                    ratings.push(RatingValue {
                        source: "imdb".to_string(),
                        value: v.clone(),
                        normalized,
                    });
                }
            }
        }
        if let Some(v) = &resp.metascore {
            if v != "N/A" {
                if let Some(normalized) = normalize_rating(v, "/100") {
                    ratings.push(RatingValue {
                        source: "metascore".to_string(),
                        value: v.clone(),
                        normalized,
                    });
                }
            }
        }
        for r in &resp.ratings {
            if r.source == "Rotten Tomatoes" {
                if let Some(normalized) = normalize_rating(&r.value, "%") {
                    ratings.push(RatingValue {
                        source: "rotten_tomatoes".to_string(),
                        value: r.value.clone(),
                        normalized,
                    });
                }
            }
        }

        Ok(ProviderBundle {
            title: resp.title,
            year: resp.year.and_then(|y| y.parse().ok()),
            runtime_minutes: resp
                .runtime
                .and_then(|r| r.split_whitespace().next().map(str::to_string))
                .and_then(|n| n.parse().ok()),
            genres: resp
                .genre
                .map(|g| g.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_default(),
            actors: resp
                .actors
                .map(|a| a.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_default(),
            overview: resp.plot,
            ratings,
            poster_url: resp.poster,
            backdrop_url: None,
        })
    }
}

fn urlencoding_lite(s: &str) -> String {
    s.replace(' ', "+")
}
