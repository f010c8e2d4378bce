use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::catalog::projection::parse_ratings;
use crate::catalog::{RatingRecord, StreamingProviders};
use crate::db::MetadataRecord;

/// Rating source name used for TMDB's own vote average.
pub const TMDB_SOURCE: &str = "TMDB";

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbMovie {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub vote_average: Option<f64>,
    #[serde(default)]
    pub vote_count: Option<i64>,
    #[serde(default)]
    pub genres: Vec<TmdbGenre>,
    #[serde(rename = "watch/providers", default)]
    pub watch_providers: Option<WatchProviders>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmdbGenre {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WatchProviders {
    #[serde(default)]
    pub results: BTreeMap<String, CountryProviders>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CountryProviders {
    #[serde(default)]
    pub flatrate: Vec<ProviderEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderEntry {
    pub provider_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmdbSearchResult {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct SearchResponse {
    pub results: Vec<TmdbSearchResult>,
}

impl TmdbMovie {
    /// Streaming providers per country, flat-rate offers only.
    pub fn providers(&self) -> StreamingProviders {
        let by_country = self
            .watch_providers
            .as_ref()
            .map(|wp| {
                wp.results
                    .iter()
                    .map(|(country, p)| {
                        let names = p.flatrate.iter().map(|e| e.provider_name.clone()).collect();
                        (country.clone(), names)
                    })
                    .collect()
            })
            .unwrap_or_default();
        StreamingProviders::ByCountry(by_country)
    }

    /// Merge into a metadata row. Ratings from other sources already on
    /// `existing` are kept; the TMDB entry is replaced.
    pub fn into_metadata(self, existing: Option<&MetadataRecord>) -> MetadataRecord {
        let mut ratings: Vec<RatingRecord> = existing
            .map(|m| parse_ratings(m.tmdb_id, &m.ratings))
            .unwrap_or_default()
            .into_iter()
            .filter(|r| !r.source.eq_ignore_ascii_case(TMDB_SOURCE))
            .collect();

        if let Some(avg) = self.vote_average.filter(|v| *v > 0.0) {
            ratings.insert(
                0,
                RatingRecord {
                    source: TMDB_SOURCE.to_string(),
                    rating: avg,
                    votes: self.vote_count,
                },
            );
        }

        let providers = self.providers();

        MetadataRecord {
            tmdb_id: self.id,
            title: self.title,
            poster_path: self.poster_path,
            backdrop_path: self.backdrop_path,
            release_date: self.release_date.filter(|d| !d.is_empty()),
            overview: self.overview,
            ratings: serde_json::to_string(&ratings).unwrap_or_else(|_| "[]".to_string()),
            genres: serde_json::to_string(&self.genres).unwrap_or_else(|_| "[]".to_string()),
            providers: serde_json::to_string(&providers).unwrap_or_else(|_| "[]".to_string()),
            updated: Some(Utc::now().to_rfc3339()),
        }
    }
}
