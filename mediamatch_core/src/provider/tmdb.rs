//! TMDB-backed metadata provider.
//!
//! Thin wrapper over the TMDB v3 search endpoints. Movies go through
//! `/search/movie`, episodes resolve their series through `/search/tv`.
//! This layer only translates requests and responses; retry and timeout
//! policy lives in [`RetryingProvider`](super::RetryingProvider).

use super::{MetadataProvider, ProviderCandidate, ProviderError, SearchQuery};
use crate::config::ProviderConfig;
use crate::parser::MediaKind;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

pub struct TmdbProvider {
    client: reqwest::Client,
    config: ProviderConfig,
}

#[derive(Debug, Deserialize)]
struct SearchResponse<T> {
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct MovieResult {
    id: u64,
    title: String,
    original_title: Option<String>,
    release_date: Option<String>,
    overview: Option<String>,
    popularity: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TvResult {
    id: u64,
    name: String,
    original_name: Option<String>,
    first_air_date: Option<String>,
    overview: Option<String>,
    popularity: Option<f64>,
}

impl TmdbProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        if config.api_key.is_empty() {
            return Err(ProviderError::InvalidResponse(
                "missing TMDB API key".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .user_agent(concat!("mediamatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn search_url(&self, query: &SearchQuery) -> String {
        let encoded = urlencoding::encode(&query.title);
        match query.kind {
            MediaKind::Episode => {
                let mut url = format!(
                    "{}/search/tv?api_key={}&query={}",
                    self.config.base_url, self.config.api_key, encoded
                );
                if let Some(year) = query.year {
                    url.push_str(&format!("&first_air_date_year={}", year));
                }
                url
            }
            MediaKind::Movie | MediaKind::Unknown => {
                let mut url = format!(
                    "{}/search/movie?api_key={}&query={}",
                    self.config.base_url, self.config.api_key, encoded
                );
                if let Some(year) = query.year {
                    url.push_str(&format!("&year={}", year));
                }
                url
            }
        }
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_transport_error)?;
        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::TOO_MANY_REQUESTS => Err(ProviderError::RateLimited {
                retry_after: parse_retry_after(&response),
            }),
            StatusCode::NOT_FOUND => Err(ProviderError::NotFound),
            StatusCode::UNAUTHORIZED => Err(ProviderError::InvalidResponse(
                "TMDB rejected the API key".to_string(),
            )),
            status if status.is_server_error() => {
                Err(ProviderError::Transport(format!("TMDB returned {}", status)))
            }
            status => Err(ProviderError::InvalidResponse(format!(
                "unexpected status {}",
                status
            ))),
        }
    }
}

fn map_transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout
    } else if err.is_decode() {
        ProviderError::InvalidResponse(err.to_string())
    } else {
        ProviderError::Transport(err.to_string())
    }
}

fn parse_retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Pull the year out of a TMDB `YYYY-MM-DD` date string.
fn date_year(date: Option<&str>) -> Option<i32> {
    let date = date?;
    date.split('-').next()?.parse().ok()
}

fn none_if_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

impl From<MovieResult> for ProviderCandidate {
    fn from(result: MovieResult) -> Self {
        Self {
            external_id: result.id.to_string(),
            year: date_year(result.release_date.as_deref()),
            title: result.title,
            original_title: none_if_empty(result.original_title),
            kind: MediaKind::Movie,
            runtime_minutes: None,
            overview: none_if_empty(result.overview),
            popularity: result.popularity,
        }
    }
}

impl From<TvResult> for ProviderCandidate {
    fn from(result: TvResult) -> Self {
        Self {
            external_id: result.id.to_string(),
            year: date_year(result.first_air_date.as_deref()),
            title: result.name,
            original_title: none_if_empty(result.original_name),
            kind: MediaKind::Episode,
            runtime_minutes: None,
            overview: none_if_empty(result.overview),
            popularity: result.popularity,
        }
    }
}

#[async_trait]
impl MetadataProvider for TmdbProvider {
    fn name(&self) -> &'static str {
        "tmdb"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<ProviderCandidate>, ProviderError> {
        let url = self.search_url(query);
        let response = self.get(&url).await?;
        let candidates = match query.kind {
            MediaKind::Episode => {
                let body: SearchResponse<TvResult> = response
                    .json()
                    .await
                    .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
                body.results.into_iter().map(Into::into).collect()
            }
            MediaKind::Movie | MediaKind::Unknown => {
                let body: SearchResponse<MovieResult> = response
                    .json()
                    .await
                    .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
                body.results.into_iter().map(Into::into).collect()
            }
        };
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;

    fn config() -> ProviderConfig {
        ProviderConfig {
            api_key: "test-key".to_string(),
            ..ProviderConfig::default()
        }
    }

    #[test]
    fn requires_api_key() {
        let err = TmdbProvider::new(ProviderConfig::default()).err();
        assert!(matches!(err, Some(ProviderError::InvalidResponse(_))));
    }

    #[test]
    fn movie_url_includes_year() {
        let provider = TmdbProvider::new(config()).unwrap();
        let query = SearchQuery::new("Inception", Some(2010), None, MediaKind::Movie);
        let url = provider.search_url(&query);
        assert!(url.contains("/search/movie"));
        assert!(url.contains("query=inception"));
        assert!(url.contains("&year=2010"));
    }

    #[test]
    fn episode_url_uses_tv_search() {
        let provider = TmdbProvider::new(config()).unwrap();
        let query = SearchQuery::new("Breaking Bad", None, Some(1), MediaKind::Episode);
        let url = provider.search_url(&query);
        assert!(url.contains("/search/tv"));
        assert!(url.contains("query=breaking%20bad"));
        assert!(!url.contains("first_air_date_year"));
    }

    #[test]
    fn query_titles_are_url_encoded() {
        let provider = TmdbProvider::new(config()).unwrap();
        let query = SearchQuery::new("V for Vendetta & Friends", None, None, MediaKind::Movie);
        let url = provider.search_url(&query);
        assert!(url.contains("%26"));
        assert!(!url.contains(" "));
    }

    #[test]
    fn year_extracted_from_release_date() {
        assert_eq!(date_year(Some("2010-07-16")), Some(2010));
        assert_eq!(date_year(Some("")), None);
        assert_eq!(date_year(None), None);
    }

    #[test]
    fn movie_result_maps_to_candidate() {
        let result = MovieResult {
            id: 27205,
            title: "Inception".to_string(),
            original_title: Some("Inception".to_string()),
            release_date: Some("2010-07-16".to_string()),
            overview: Some("A thief who steals corporate secrets".to_string()),
            popularity: Some(83.5),
        };
        let candidate = ProviderCandidate::from(result);
        assert_eq!(candidate.external_id, "27205");
        assert_eq!(candidate.year, Some(2010));
        assert_eq!(candidate.kind, MediaKind::Movie);
    }

    #[test]
    fn empty_strings_become_none() {
        let result = TvResult {
            id: 1396,
            name: "Breaking Bad".to_string(),
            original_name: Some(String::new()),
            first_air_date: None,
            overview: Some(String::new()),
            popularity: None,
        };
        let candidate = ProviderCandidate::from(result);
        assert_eq!(candidate.original_title, None);
        assert_eq!(candidate.overview, None);
        assert_eq!(candidate.year, None);
    }
}
