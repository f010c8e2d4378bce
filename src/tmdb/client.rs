use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::types::{SearchResponse, TmdbMovie, TmdbSearchResult};
use super::{TmdbError, TmdbResult};
use crate::config::TmdbConfig;

#[async_trait]
pub trait TmdbApi: Send + Sync {
    async fn fetch_movie(&self, tmdb_id: i64) -> TmdbResult<TmdbMovie>;
    async fn search_movie(&self, query: &str, year: Option<i32>) -> TmdbResult<Vec<TmdbSearchResult>>;
}

#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    base_url: String,
    api_key: String,
    language: String,
}

impl TmdbClient {
    pub fn new(config: &TmdbConfig) -> TmdbResult<Self> {
        let api_key = config
            .api_key()
            .ok_or_else(|| TmdbError::NotConfigured("TMDB API key is required".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            language: config.language.clone(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> TmdbResult<Option<T>> {
        let url = format!("{}{}", self.base_url, path);
        debug!("TMDB request: {}", url);

        let response = self
            .client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str()), ("language", self.language.as_str())])
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(TmdbError::NotConfigured("Invalid TMDB API key".to_string()));
        }
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TmdbError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: T = response
            .json()
            .await
            .map_err(|e| TmdbError::Parse(format!("{}: {}", path, e)))?;
        Ok(Some(body))
    }
}

#[async_trait]
impl TmdbApi for TmdbClient {
    async fn fetch_movie(&self, tmdb_id: i64) -> TmdbResult<TmdbMovie> {
        let path = format!("/movie/{}", tmdb_id);
        let movie = self
            .get_json::<TmdbMovie>(&path, &[("append_to_response", "watch/providers".to_string())])
            .await?;
        movie.ok_or(TmdbError::NotFound(tmdb_id))
    }

    async fn search_movie(&self, query: &str, year: Option<i32>) -> TmdbResult<Vec<TmdbSearchResult>> {
        let mut params = vec![("query", query.to_string())];
        if let Some(y) = year {
            params.push(("year", y.to_string()));
        }
        let response = self.get_json::<SearchResponse>("/search/movie", &params).await?;
        Ok(response.map(|r| r.results).unwrap_or_default())
    }
}
