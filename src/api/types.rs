use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::error::{ApiError, ApiResult};
use crate::catalog::{MovieProjection, MovieShowtimes};
use crate::db::{CinemaRecord, MovieRecord, Showtime, ShowtimeRecord};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieDetail {
    pub movie: MovieProjection,
    /// Keyed by cinema name.
    pub showtimes: BTreeMap<String, Vec<ShowtimeRecord>>,
    pub dates: Vec<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CinemaDetail {
    pub cinema: CinemaRecord,
    pub movies: Vec<MovieShowtimes>,
    pub dates: Vec<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowtimesView {
    pub from: NaiveDate,
    pub days: u32,
    pub dates: Vec<NaiveDate>,
    pub showtimes: Vec<ShowtimeRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieInput {
    pub title: String,
    #[serde(default)]
    pub tmdb_id: Option<i64>,
}

impl MovieInput {
    pub fn into_record(self, id: String) -> ApiResult<MovieRecord> {
        let title = required("title", &self.title)?;
        if let Some(tmdb_id) = self.tmdb_id {
            if tmdb_id <= 0 {
                return Err(ApiError::BadRequest(format!("invalid tmdbId: {}", tmdb_id)));
            }
        }
        Ok(MovieRecord {
            id,
            title,
            tmdb_id: self.tmdb_id,
            created: None,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CinemaInput {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

impl CinemaInput {
    pub fn into_record(self, id: String) -> ApiResult<CinemaRecord> {
        Ok(CinemaRecord {
            id,
            name: required("name", &self.name)?,
            address: self.address,
            city: self.city,
            website: self.website,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowtimeInput {
    pub cinema_id: String,
    pub movie_id: String,
    pub unix_time_millis: i64,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_ticket_type")]
    pub ticket_type: String,
    #[serde(default)]
    pub booking_link: Option<String>,
}

fn default_format() -> String {
    "2D".to_string()
}

fn default_ticket_type() -> String {
    "Standard".to_string()
}

impl ShowtimeInput {
    pub fn into_record(self, id: String) -> ApiResult<Showtime> {
        if self.unix_time_millis < 0 {
            return Err(ApiError::BadRequest(format!(
                "invalid unixTimeMillis: {}",
                self.unix_time_millis
            )));
        }
        Ok(Showtime {
            id,
            cinema_id: required("cinemaId", &self.cinema_id)?,
            movie_id: required("movieId", &self.movie_id)?,
            unix_time_millis: self.unix_time_millis,
            format: self.format,
            ticket_type: self.ticket_type,
            booking_link: self.booking_link.filter(|l| !l.trim().is_empty()),
        })
    }
}

fn required(field: &str, value: &str) -> ApiResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::BadRequest(format!("{} is required", field)));
    }
    Ok(value.to_string())
}
