use async_trait::async_trait;

use super::model::*;

#[async_trait]
pub trait MovieRepo: Send + Sync {
    async fn get_movie(&self, id: &str) -> DbResult<MovieRecord>;
    /// Missing ids are skipped.
    async fn get_movies(&self, ids: &[String]) -> DbResult<Vec<MovieRecord>>;
    /// Newest first.
    async fn list_movies(&self, offset: u32, limit: u32) -> DbResult<Vec<MovieRecord>>;
    /// Movies whose metadata carries a positive rating from `source`
    /// (trimmed, case-insensitive), highest such rating first, ties by id.
    async fn list_movies_with_rating_source(
        &self,
        source: &str,
        offset: u32,
        limit: u32,
    ) -> DbResult<Vec<MovieRecord>>;
    async fn upsert_movie(&self, movie: &MovieRecord) -> DbResult<()>;
    async fn delete_movie(&self, id: &str) -> DbResult<()>;
}

#[async_trait]
pub trait MetadataRepo: Send + Sync {
    async fn get_metadata(&self, tmdb_id: i64) -> DbResult<MetadataRecord>;
    /// Missing ids are skipped, not reported.
    async fn get_metadata_batch(&self, tmdb_ids: &[i64]) -> DbResult<Vec<MetadataRecord>>;
    async fn upsert_metadata(&self, metadata: &MetadataRecord) -> DbResult<()>;
}

#[async_trait]
pub trait CinemaRepo: Send + Sync {
    async fn get_cinema(&self, id: &str) -> DbResult<CinemaRecord>;
    async fn list_cinemas(&self) -> DbResult<Vec<CinemaRecord>>;
    async fn upsert_cinema(&self, cinema: &CinemaRecord) -> DbResult<()>;
    async fn delete_cinema(&self, id: &str) -> DbResult<()>;
}

#[async_trait]
pub trait ShowtimeRepo: Send + Sync {
    async fn get_showtime(&self, id: &str) -> DbResult<ShowtimeRecord>;
    async fn list_showtimes_for_movie(&self, movie_id: &str) -> DbResult<Vec<ShowtimeRecord>>;
    async fn list_showtimes_for_cinema(&self, cinema_id: &str) -> DbResult<Vec<ShowtimeRecord>>;
    /// Showtimes with `from_ms <= unix_time_millis < to_ms`.
    async fn list_showtimes_between(&self, from_ms: i64, to_ms: i64) -> DbResult<Vec<ShowtimeRecord>>;
    async fn upsert_showtime(&self, showtime: &Showtime) -> DbResult<()>;
    async fn delete_showtime(&self, id: &str) -> DbResult<()>;
}

#[async_trait]
pub trait Repository: MovieRepo + MetadataRepo + CinemaRepo + ShowtimeRepo + Send + Sync {
    async fn close(&self);
}
