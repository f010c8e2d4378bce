use serde::{Deserialize, Serialize};

/// A movie as stored locally. `tmdb_id` links it to a metadata row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MovieRecord {
    pub id: String,
    pub title: String,
    pub tmdb_id: Option<i64>,
    pub created: Option<String>,
}

/// Provider metadata keyed by TMDB id. The list-valued columns hold JSON
/// text and are decoded leniently by the projection builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRecord {
    pub tmdb_id: i64,
    pub title: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub release_date: Option<String>,
    pub overview: Option<String>,
    pub ratings: String,
    pub genres: String,
    pub providers: String,
    pub updated: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CinemaRecord {
    pub id: String,
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub website: Option<String>,
}

/// A showtime row as written by the admin surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Showtime {
    pub id: String,
    pub cinema_id: String,
    pub movie_id: String,
    pub unix_time_millis: i64,
    pub format: String,
    pub ticket_type: String,
    pub booking_link: Option<String>,
}

/// A showtime joined with its cinema and movie names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ShowtimeRecord {
    pub id: String,
    pub cinema_id: String,
    pub cinema_name: String,
    pub movie_id: String,
    pub movie_title: String,
    pub unix_time_millis: i64,
    pub format: String,
    pub ticket_type: String,
    pub booking_link: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid: {0}")]
    Invalid(String),
}

pub type DbResult<T> = Result<T, DbError>;
