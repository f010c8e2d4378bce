//! Admin CRUD. Access control is left to whatever fronts the server.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::info;
use uuid::Uuid;

use super::error::{ApiError, ApiResult};
use super::types::{CinemaInput, MovieInput, ShowtimeInput};
use crate::catalog::{build_projection, MovieProjection};
use crate::db::{CinemaRecord, DbError, MovieRecord, ShowtimeRecord};
use crate::server::AppState;
use crate::tmdb::TmdbSearchResult;
use crate::util::QueryParams;

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub async fn list_movies(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Vec<MovieRecord>>> {
    let page = params.parse::<u32>("page").map_err(ApiError::BadRequest)?.unwrap_or(0);
    let page_size = state
        .config
        .catalog
        .page_size(params.parse::<u32>("pageSize").map_err(ApiError::BadRequest)?);

    let movies = state
        .db
        .list_movies(page.saturating_mul(page_size), page_size)
        .await?;
    Ok(Json(movies))
}

pub async fn create_movie(
    State(state): State<AppState>,
    Json(input): Json<MovieInput>,
) -> ApiResult<(StatusCode, Json<MovieRecord>)> {
    let record = input.into_record(new_id())?;
    state.db.upsert_movie(&record).await?;
    info!(movie_id = %record.id, title = %record.title, "Created movie");

    let stored = state.db.get_movie(&record.id).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

pub async fn update_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<MovieInput>,
) -> ApiResult<Json<MovieRecord>> {
    let existing = state.db.get_movie(&id).await?;
    let mut record = input.into_record(id)?;
    record.created = existing.created;
    state.db.upsert_movie(&record).await?;
    info!(movie_id = %record.id, "Updated movie");
    Ok(Json(record))
}

pub async fn delete_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.db.delete_movie(&id).await?;
    info!(movie_id = %id, "Deleted movie");
    Ok(StatusCode::NO_CONTENT)
}

/// Pull current TMDB metadata for a movie and store it. Ratings from
/// other sources survive the refresh.
pub async fn refresh_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MovieProjection>> {
    let tmdb = state
        .tmdb
        .clone()
        .ok_or_else(|| ApiError::Unavailable("TMDB is not configured".to_string()))?;

    let movie = state.db.get_movie(&id).await?;
    let tmdb_id = movie
        .tmdb_id
        .ok_or_else(|| ApiError::BadRequest(format!("Movie {} has no tmdbId", id)))?;

    let fetched = tmdb.fetch_movie(tmdb_id).await?;
    let existing = match state.db.get_metadata(tmdb_id).await {
        Ok(meta) => Some(meta),
        Err(DbError::NotFound(_)) => None,
        Err(e) => return Err(e.into()),
    };

    let metadata = fetched.into_metadata(existing.as_ref());
    state.db.upsert_metadata(&metadata).await?;
    info!(movie_id = %id, tmdb_id, "Refreshed metadata");

    Ok(Json(build_projection(
        &movie,
        Some(&metadata),
        &state.config.catalog.defaults,
    )))
}

pub async fn search_tmdb(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Vec<TmdbSearchResult>>> {
    let tmdb = state
        .tmdb
        .clone()
        .ok_or_else(|| ApiError::Unavailable("TMDB is not configured".to_string()))?;

    let query = params
        .get("query")
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::BadRequest("query is required".to_string()))?
        .to_string();
    let year = params.parse::<i32>("year").map_err(ApiError::BadRequest)?;

    Ok(Json(tmdb.search_movie(&query, year).await?))
}

pub async fn list_cinemas(State(state): State<AppState>) -> ApiResult<Json<Vec<CinemaRecord>>> {
    Ok(Json(state.db.list_cinemas().await?))
}

pub async fn create_cinema(
    State(state): State<AppState>,
    Json(input): Json<CinemaInput>,
) -> ApiResult<(StatusCode, Json<CinemaRecord>)> {
    let record = input.into_record(new_id())?;
    state.db.upsert_cinema(&record).await?;
    info!(cinema_id = %record.id, name = %record.name, "Created cinema");
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn update_cinema(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<CinemaInput>,
) -> ApiResult<Json<CinemaRecord>> {
    state.db.get_cinema(&id).await?;
    let record = input.into_record(id)?;
    state.db.upsert_cinema(&record).await?;
    info!(cinema_id = %record.id, "Updated cinema");
    Ok(Json(record))
}

pub async fn delete_cinema(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.db.delete_cinema(&id).await?;
    info!(cinema_id = %id, "Deleted cinema");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_showtime(
    State(state): State<AppState>,
    Json(input): Json<ShowtimeInput>,
) -> ApiResult<(StatusCode, Json<ShowtimeRecord>)> {
    let record = input.into_record(new_id())?;
    state.db.upsert_showtime(&record).await?;
    info!(showtime_id = %record.id, movie_id = %record.movie_id, "Created showtime");

    let stored = state.db.get_showtime(&record.id).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

pub async fn update_showtime(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<ShowtimeInput>,
) -> ApiResult<Json<ShowtimeRecord>> {
    state.db.get_showtime(&id).await?;
    let record = input.into_record(id)?;
    state.db.upsert_showtime(&record).await?;
    info!(showtime_id = %record.id, "Updated showtime");
    Ok(Json(state.db.get_showtime(&record.id).await?))
}

pub async fn delete_showtime(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.db.delete_showtime(&id).await?;
    info!(showtime_id = %id, "Deleted showtime");
    Ok(StatusCode::NO_CONTENT)
}
