//! TMDB (The Movie Database) metadata provider.

pub mod client;
pub mod types;

pub use client::{TmdbApi, TmdbClient};
pub use types::{TmdbMovie, TmdbSearchResult};

#[derive(Debug, thiserror::Error)]
pub enum TmdbError {
    #[error("TMDB not configured: {0}")]
    NotConfigured(String),
    #[error("TMDB movie not found: {0}")]
    NotFound(i64),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("TMDB API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Failed to parse TMDB response: {0}")]
    Parse(String),
}

pub type TmdbResult<T> = Result<T, TmdbError>;
