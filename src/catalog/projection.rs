use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::providers::StreamingProviders;
use super::rating::{median_rating, RatingRecord};
use crate::db::{MetadataRecord, MovieRecord};

/// Fallback values used when provider metadata is missing or partial.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProjectionConfig {
    #[serde(alias = "placeholderposter", rename = "placeholderposter")]
    #[serde(default = "default_placeholder_poster")]
    pub placeholder_poster: String,
    #[serde(alias = "defaultrating", rename = "defaultrating")]
    #[serde(default = "default_rating")]
    pub default_rating: f64,
    #[serde(alias = "posterbaseurl", rename = "posterbaseurl")]
    #[serde(default = "default_poster_base_url")]
    pub poster_base_url: String,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            placeholder_poster: default_placeholder_poster(),
            default_rating: default_rating(),
            poster_base_url: default_poster_base_url(),
        }
    }
}

fn default_placeholder_poster() -> String {
    "/static/poster-placeholder.png".to_string()
}

fn default_rating() -> f64 {
    5.0
}

fn default_poster_base_url() -> String {
    "https://image.tmdb.org/t/p/w500".to_string()
}

impl ProjectionConfig {
    pub fn image_url(&self, path: &str) -> String {
        let base = self.poster_base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }
}

/// Display-ready movie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieProjection {
    pub id: String,
    pub title: String,
    pub display_title: String,
    pub poster_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backdrop_url: Option<String>,
    pub release_year: String,
    pub rating: f64,
    pub all_ratings: Vec<RatingRecord>,
    pub genres: Vec<String>,
    pub providers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,
}

impl MovieProjection {
    pub fn release_year_num(&self) -> i32 {
        self.release_year.parse().unwrap_or(0)
    }

    /// Rating given by `source`, matched case-insensitively.
    pub fn rating_from(&self, source: &str) -> Option<f64> {
        self.all_ratings
            .iter()
            .find(|r| r.source.eq_ignore_ascii_case(source))
            .map(|r| r.rating)
    }
}

/// Build the projection of `movie`, joined with its metadata when there is any.
pub fn build_projection(
    movie: &MovieRecord,
    metadata: Option<&MetadataRecord>,
    config: &ProjectionConfig,
) -> MovieProjection {
    let Some(meta) = metadata else {
        return default_projection(movie, config);
    };

    let display_title = meta
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(movie.title.as_str())
        .to_string();

    let poster_url = non_empty(meta.poster_path.as_deref())
        .map(|p| config.image_url(p))
        .unwrap_or_else(|| config.placeholder_poster.clone());
    let backdrop_url = non_empty(meta.backdrop_path.as_deref()).map(|p| config.image_url(p));

    let release_year = meta
        .release_date
        .as_deref()
        .and_then(parse_release_year)
        .unwrap_or_default();

    let all_ratings = parse_ratings(meta.tmdb_id, &meta.ratings);
    let values: Vec<f64> = all_ratings.iter().map(|r| r.rating).collect();
    let rating = median_rating(&values, config.default_rating).clamp(0.0, 10.0);

    MovieProjection {
        id: movie.id.clone(),
        title: movie.title.clone(),
        display_title,
        poster_url,
        backdrop_url,
        release_year,
        rating,
        all_ratings,
        genres: parse_genres(meta.tmdb_id, &meta.genres),
        providers: parse_providers(meta.tmdb_id, &meta.providers).flatten(),
        overview: non_empty(meta.overview.as_deref()).map(|s| s.to_string()),
    }
}

pub fn default_projection(movie: &MovieRecord, config: &ProjectionConfig) -> MovieProjection {
    MovieProjection {
        id: movie.id.clone(),
        title: movie.title.clone(),
        display_title: movie.title.clone(),
        poster_url: config.placeholder_poster.clone(),
        backdrop_url: None,
        release_year: String::new(),
        rating: config.default_rating.clamp(0.0, 10.0),
        all_ratings: Vec::new(),
        genres: Vec::new(),
        providers: Vec::new(),
        overview: None,
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

fn year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(\d{4})").expect("valid year regex"))
}

/// "2019-05-30" -> "2019".
pub fn parse_release_year(date: &str) -> Option<String> {
    year_re()
        .captures(date)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Decode the ratings column. Entries without a source or with a rating
/// that is not positive are dropped one by one.
pub fn parse_ratings(tmdb_id: i64, raw: &str) -> Vec<RatingRecord> {
    let entries = match decode_list(raw) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(tmdb_id, "Ignoring malformed ratings: {}", e);
            return Vec::new();
        }
    };

    entries
        .iter()
        .filter_map(|entry| {
            let source = entry.get("source")?.as_str()?.trim();
            if source.is_empty() {
                return None;
            }
            let rating = number(entry.get("rating")?)?;
            if rating.is_nan() || rating <= 0.0 {
                return None;
            }
            let votes = entry.get("votes").and_then(number).map(|v| v as i64);
            Some(RatingRecord {
                source: source.to_string(),
                rating,
                votes,
            })
        })
        .collect()
}

/// Decode the genres column, either `["Drama"]` or `[{"id": 18, "name": "Drama"}]`.
pub fn parse_genres(tmdb_id: i64, raw: &str) -> Vec<String> {
    let entries = match decode_list(raw) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(tmdb_id, "Ignoring malformed genres: {}", e);
            return Vec::new();
        }
    };

    entries
        .iter()
        .filter_map(|g| match g {
            Value::String(s) => Some(s.as_str()),
            Value::Object(o) => o.get("name").and_then(Value::as_str),
            _ => None,
        })
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

pub fn parse_providers(tmdb_id: i64, raw: &str) -> StreamingProviders {
    if raw.trim().is_empty() {
        return StreamingProviders::default();
    }
    match serde_json::from_str::<Option<StreamingProviders>>(raw) {
        Ok(p) => p.unwrap_or_default(),
        Err(e) => {
            warn!(tmdb_id, "Ignoring malformed providers: {}", e);
            StreamingProviders::default()
        }
    }
}

fn decode_list(raw: &str) -> Result<Vec<Value>, serde_json::Error> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let list: Option<Vec<Value>> = serde_json::from_str(raw)?;
    Ok(list.unwrap_or_default())
}

fn number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
