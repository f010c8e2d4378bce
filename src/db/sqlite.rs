use std::fmt::Write;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

use super::model::*;
use super::repo::*;

const SHOWTIME_SELECT: &str = "SELECT s.id, s.cinema_id, c.name AS cinema_name, s.movie_id,
        m.title AS movie_title, s.unix_time_millis, s.format, s.ticket_type, s.booking_link
     FROM showtimes s
     JOIN cinemas c ON c.id = s.cinema_id
     JOIN movies m ON m.id = s.movie_id";

pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    pub async fn new(db_path: &str) -> DbResult<Self> {
        let options = SqliteConnectOptions::from_str(db_path)?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to an in-memory database sees its own database.
        let max_connections = if db_path.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let repo = Self { pool };
        repo.init_schema().await?;

        info!("Database initialized at {}", db_path);

        Ok(repo)
    }

    async fn init_schema(&self) -> DbResult<()> {
        let schema = include_str!("schema.sql");
        sqlx::raw_sql(schema).execute(&self.pool).await?;
        Ok(())
    }

    async fn fetch_showtimes(&self, filter: &str, args: &[&str]) -> DbResult<Vec<ShowtimeRecord>> {
        let query = format!("{} WHERE {} ORDER BY s.unix_time_millis, s.id", SHOWTIME_SELECT, filter);
        let mut q = sqlx::query_as::<_, ShowtimeRecord>(&query);
        for arg in args {
            q = q.bind(*arg);
        }
        Ok(q.fetch_all(&self.pool).await?)
    }
}

/// Append `?, ?, ...)` closing an `IN (` list.
fn push_placeholders(query: &mut String, n: usize) {
    for i in 0..n {
        let _ = write!(query, "{}?", if i == 0 { "" } else { ", " });
    }
    query.push(')');
}

fn not_found(what: &str, id: impl std::fmt::Display) -> impl FnOnce(sqlx::Error) -> DbError {
    let msg = format!("{} not found: {}", what, id);
    move |e| match e {
        sqlx::Error::RowNotFound => DbError::NotFound(msg),
        _ => DbError::Sqlx(e),
    }
}

#[async_trait]
impl MovieRepo for SqliteRepository {
    async fn get_movie(&self, id: &str) -> DbResult<MovieRecord> {
        sqlx::query_as::<_, MovieRecord>("SELECT id, title, tmdb_id, created FROM movies WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found("Movie", id))
    }

    async fn get_movies(&self, ids: &[String]) -> DbResult<Vec<MovieRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = "SELECT id, title, tmdb_id, created FROM movies WHERE id IN (".to_string();
        push_placeholders(&mut query, ids.len());

        let mut q = sqlx::query_as::<_, MovieRecord>(&query);
        for id in ids {
            q = q.bind(id);
        }
        Ok(q.fetch_all(&self.pool).await?)
    }

    async fn list_movies(&self, offset: u32, limit: u32) -> DbResult<Vec<MovieRecord>> {
        let movies = sqlx::query_as::<_, MovieRecord>(
            "SELECT id, title, tmdb_id, created FROM movies
             ORDER BY created DESC, id LIMIT ? OFFSET ?",
        )
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(&self.pool)
        .await?;
        Ok(movies)
    }

    async fn list_movies_with_rating_source(
        &self,
        source: &str,
        offset: u32,
        limit: u32,
    ) -> DbResult<Vec<MovieRecord>> {
        // Malformed ratings columns and non-object entries read as empty.
        // When a source appears twice the first positive entry wins.
        let movies = sqlx::query_as::<_, MovieRecord>(
            "WITH entries AS (
                 SELECT t.tmdb_id, r.key AS pos,
                        CASE WHEN r.type = 'object' THEN json_extract(r.value, '$.source') END AS source,
                        CASE WHEN r.type = 'object' THEN json_type(r.value, '$.rating') END AS rating_type,
                        CASE WHEN r.type = 'object' THEN json_extract(r.value, '$.rating') END AS rating
                 FROM tmdb t, json_each(CASE WHEN NOT json_valid(t.ratings) THEN '[]'
                                             WHEN json_type(t.ratings) = 'array' THEN t.ratings
                                             ELSE '[]' END) r
             ),
             matched AS (
                 SELECT tmdb_id, pos, CAST(rating AS REAL) AS rating FROM entries
                 WHERE typeof(source) = 'text' AND lower(trim(source)) = lower(trim(?))
                   AND rating_type IN ('integer', 'real', 'text') AND CAST(rating AS REAL) > 0
             ),
             first_match AS (
                 SELECT tmdb_id, rating, MIN(pos) FROM matched GROUP BY tmdb_id
             )
             SELECT m.id, m.title, m.tmdb_id, m.created
             FROM movies m JOIN first_match f ON f.tmdb_id = m.tmdb_id
             ORDER BY f.rating DESC, m.id LIMIT ? OFFSET ?",
        )
        .bind(source)
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(&self.pool)
        .await?;
        Ok(movies)
    }

    async fn upsert_movie(&self, movie: &MovieRecord) -> DbResult<()> {
        let created = movie.created.clone().unwrap_or_else(|| Utc::now().to_rfc3339());
        sqlx::query(
            "INSERT INTO movies (id, title, tmdb_id, created) VALUES (?, ?, ?, ?)
             ON CONFLICT (id) DO UPDATE SET title = excluded.title, tmdb_id = excluded.tmdb_id",
        )
        .bind(&movie.id)
        .bind(&movie.title)
        .bind(movie.tmdb_id)
        .bind(created)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_movie(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM movies WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("Movie not found: {}", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataRepo for SqliteRepository {
    async fn get_metadata(&self, tmdb_id: i64) -> DbResult<MetadataRecord> {
        sqlx::query_as::<_, MetadataRecord>(
            "SELECT tmdb_id, title, poster_path, backdrop_path, release_date, overview,
                    ratings, genres, providers, updated
             FROM tmdb WHERE tmdb_id = ?",
        )
        .bind(tmdb_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found("Metadata", tmdb_id))
    }

    async fn get_metadata_batch(&self, tmdb_ids: &[i64]) -> DbResult<Vec<MetadataRecord>> {
        if tmdb_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = "SELECT tmdb_id, title, poster_path, backdrop_path, release_date, overview,
                ratings, genres, providers, updated
             FROM tmdb WHERE tmdb_id IN ("
            .to_string();
        push_placeholders(&mut query, tmdb_ids.len());

        let mut q = sqlx::query_as::<_, MetadataRecord>(&query);
        for id in tmdb_ids {
            q = q.bind(*id);
        }
        Ok(q.fetch_all(&self.pool).await?)
    }

    async fn upsert_metadata(&self, metadata: &MetadataRecord) -> DbResult<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO tmdb
            (tmdb_id, title, poster_path, backdrop_path, release_date, overview,
             ratings, genres, providers, updated)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(metadata.tmdb_id)
        .bind(&metadata.title)
        .bind(&metadata.poster_path)
        .bind(&metadata.backdrop_path)
        .bind(&metadata.release_date)
        .bind(&metadata.overview)
        .bind(&metadata.ratings)
        .bind(&metadata.genres)
        .bind(&metadata.providers)
        .bind(metadata.updated.clone().unwrap_or_else(|| Utc::now().to_rfc3339()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl CinemaRepo for SqliteRepository {
    async fn get_cinema(&self, id: &str) -> DbResult<CinemaRecord> {
        sqlx::query_as::<_, CinemaRecord>(
            "SELECT id, name, address, city, website FROM cinemas WHERE id = ?",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found("Cinema", id))
    }

    async fn list_cinemas(&self) -> DbResult<Vec<CinemaRecord>> {
        let cinemas = sqlx::query_as::<_, CinemaRecord>(
            "SELECT id, name, address, city, website FROM cinemas ORDER BY name COLLATE NOCASE, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(cinemas)
    }

    async fn upsert_cinema(&self, cinema: &CinemaRecord) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO cinemas (id, name, address, city, website) VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (id) DO UPDATE SET name = excluded.name, address = excluded.address,
                city = excluded.city, website = excluded.website",
        )
        .bind(&cinema.id)
        .bind(&cinema.name)
        .bind(&cinema.address)
        .bind(&cinema.city)
        .bind(&cinema.website)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_cinema(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM cinemas WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("Cinema not found: {}", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl ShowtimeRepo for SqliteRepository {
    async fn get_showtime(&self, id: &str) -> DbResult<ShowtimeRecord> {
        let query = format!("{} WHERE s.id = ?", SHOWTIME_SELECT);
        sqlx::query_as::<_, ShowtimeRecord>(&query)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found("Showtime", id))
    }

    async fn list_showtimes_for_movie(&self, movie_id: &str) -> DbResult<Vec<ShowtimeRecord>> {
        self.fetch_showtimes("s.movie_id = ?", &[movie_id]).await
    }

    async fn list_showtimes_for_cinema(&self, cinema_id: &str) -> DbResult<Vec<ShowtimeRecord>> {
        self.fetch_showtimes("s.cinema_id = ?", &[cinema_id]).await
    }

    async fn list_showtimes_between(&self, from_ms: i64, to_ms: i64) -> DbResult<Vec<ShowtimeRecord>> {
        let query = format!(
            "{} WHERE s.unix_time_millis >= ? AND s.unix_time_millis < ? ORDER BY s.unix_time_millis, s.id",
            SHOWTIME_SELECT
        );
        let showtimes = sqlx::query_as::<_, ShowtimeRecord>(&query)
            .bind(from_ms)
            .bind(to_ms)
            .fetch_all(&self.pool)
            .await?;
        Ok(showtimes)
    }

    async fn upsert_showtime(&self, showtime: &Showtime) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO showtimes
            (id, cinema_id, movie_id, unix_time_millis, format, ticket_type, booking_link)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET cinema_id = excluded.cinema_id,
                movie_id = excluded.movie_id, unix_time_millis = excluded.unix_time_millis,
                format = excluded.format, ticket_type = excluded.ticket_type,
                booking_link = excluded.booking_link",
        )
        .bind(&showtime.id)
        .bind(&showtime.cinema_id)
        .bind(&showtime.movie_id)
        .bind(showtime.unix_time_millis)
        .bind(&showtime.format)
        .bind(&showtime.ticket_type)
        .bind(&showtime.booking_link)
        .execute(&self.pool)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db) if db.is_foreign_key_violation() => DbError::Invalid(format!(
                "Unknown cinema {} or movie {}",
                showtime.cinema_id, showtime.movie_id
            )),
            _ => DbError::Sqlx(e),
        })?;
        Ok(())
    }

    async fn delete_showtime(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM showtimes WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("Showtime not found: {}", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn close(&self) {
        self.pool.close().await;
    }
}
