use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Days;
use tracing::{debug, error, warn};

use super::error::{ApiError, ApiResult};
use super::types::{CinemaDetail, MovieDetail, ShowtimesView};
use crate::catalog::{
    self, build_projection, group_by_cinema, group_by_movie, project_records, ListingPage,
    ShowtimeFilter, SortKey,
};
use crate::db::{CinemaRecord, DbError, ShowtimeRecord};
use crate::server::AppState;
use crate::util::QueryParams;

const DEFAULT_RANGE_DAYS: u32 = 7;
const MAX_RANGE_DAYS: u32 = 31;

pub async fn list_movies(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<ListingPage>> {
    let cfg = &state.config.catalog;

    let page = params.parse::<u32>("page").map_err(ApiError::BadRequest)?.unwrap_or(0);
    let page_size = cfg.page_size(params.parse::<u32>("pageSize").map_err(ApiError::BadRequest)?);
    let sort = match params.get("sort") {
        None => SortKey::Rating,
        Some(s) => s.parse::<SortKey>().unwrap_or_else(|_| {
            debug!(sort = s, "Unknown sort key, using rating");
            SortKey::Rating
        }),
    };

    let listing = catalog::list_movies(
        state.db.as_ref(),
        &cfg.defaults,
        &cfg.listing,
        page,
        page_size,
        sort,
    )
    .await;

    Ok(Json(listing))
}

pub async fn get_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<MovieDetail>> {
    let filter = ShowtimeFilter {
        date: params.date("date").map_err(ApiError::BadRequest)?,
        cinema_id: params.get("cinema").map(str::to_string),
    };

    let movie = state.db.get_movie(&id).await?;

    let metadata = match movie.tmdb_id {
        None => None,
        Some(tmdb_id) => match state.db.get_metadata(tmdb_id).await {
            Ok(meta) => Some(meta),
            Err(DbError::NotFound(_)) => None,
            Err(e) => {
                warn!(movie_id = %id, tmdb_id, "Metadata lookup failed, using defaults: {}", e);
                None
            }
        },
    };
    let projection = build_projection(&movie, metadata.as_ref(), &state.config.catalog.defaults);

    let showtimes = state.db.list_showtimes_for_movie(&id).await.unwrap_or_else(|e| {
        error!(movie_id = %id, "Failed to load showtimes: {}", e);
        Vec::new()
    });

    let zone = state.calendar_zone();
    let dates = zone.distinct_dates(&showtimes);
    let shown = zone.filter(&showtimes, &filter);

    Ok(Json(MovieDetail {
        movie: projection,
        showtimes: group_by_cinema(&shown),
        dates,
    }))
}

pub async fn list_cinemas(State(state): State<AppState>) -> ApiResult<Json<Vec<CinemaRecord>>> {
    Ok(Json(state.db.list_cinemas().await?))
}

pub async fn get_cinema(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<CinemaDetail>> {
    let filter = ShowtimeFilter {
        date: params.date("date").map_err(ApiError::BadRequest)?,
        cinema_id: None,
    };

    let cinema = state.db.get_cinema(&id).await?;

    let showtimes = state.db.list_showtimes_for_cinema(&id).await.unwrap_or_else(|e| {
        error!(cinema_id = %id, "Failed to load showtimes: {}", e);
        Vec::new()
    });

    let zone = state.calendar_zone();
    let dates = zone.distinct_dates(&showtimes);
    let shown = zone.filter(&showtimes, &filter);

    let posters = posters_for(&state, &shown).await;
    let placeholder = &state.config.catalog.defaults.placeholder_poster;
    let movies = group_by_movie(&shown, &posters, placeholder).into_values().collect();

    Ok(Json(CinemaDetail {
        cinema,
        movies,
        dates,
    }))
}

pub async fn list_showtimes(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<ShowtimesView>> {
    let zone = state.calendar_zone();

    let from = match params.date("from").map_err(ApiError::BadRequest)? {
        Some(date) => date,
        None => params.date("date").map_err(ApiError::BadRequest)?.unwrap_or_else(|| zone.today()),
    };
    let days = params
        .parse::<u32>("days")
        .map_err(ApiError::BadRequest)?
        .unwrap_or(DEFAULT_RANGE_DAYS)
        .clamp(1, MAX_RANGE_DAYS);

    let to = from
        .checked_add_days(Days::new(u64::from(days)))
        .ok_or_else(|| ApiError::BadRequest(format!("date out of range: {}", from)))?;
    let (from_ms, to_ms) = match (zone.day_start_millis(from), zone.day_start_millis(to)) {
        (Some(f), Some(t)) => (f, t),
        _ => return Err(ApiError::BadRequest(format!("date out of range: {}", from))),
    };

    let showtimes = state.db.list_showtimes_between(from_ms, to_ms).await?;
    let filter = ShowtimeFilter {
        date: None,
        cinema_id: params.get("cinema").map(str::to_string),
    };
    let showtimes = zone.filter(&showtimes, &filter);

    Ok(Json(ShowtimesView {
        from,
        days,
        dates: zone.distinct_dates(&showtimes),
        showtimes,
    }))
}

/// Poster url per movie id for the movies in `showtimes`. Failures only
/// cost the posters.
async fn posters_for(
    state: &AppState,
    showtimes: &[ShowtimeRecord],
) -> HashMap<String, String> {
    let mut ids: Vec<String> = showtimes.iter().map(|st| st.movie_id.clone()).collect();
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        return HashMap::new();
    }

    let movies = match state.db.get_movies(&ids).await {
        Ok(movies) => movies,
        Err(e) => {
            warn!(count = ids.len(), "Movie lookup failed, using placeholder posters: {}", e);
            return HashMap::new();
        }
    };

    project_records(state.db.as_ref(), &movies, &state.config.catalog.defaults)
        .await
        .into_iter()
        .map(|p| (p.id, p.poster_url))
        .collect()
}

