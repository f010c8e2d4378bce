use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, FixedOffset, Local, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::db::ShowtimeRecord;

/// All showtimes of one movie, as shown on a cinema page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieShowtimes {
    pub movie_id: String,
    pub title: String,
    pub poster_url: String,
    pub showtimes: Vec<ShowtimeRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct ShowtimeFilter {
    pub date: Option<NaiveDate>,
    pub cinema_id: Option<String>,
}

/// Time zone used to cut showtimes into calendar days: a fixed offset
/// from configuration, or the server's local zone.
#[derive(Debug, Clone, Copy)]
pub enum CalendarZone {
    Local,
    Fixed(FixedOffset),
}

impl CalendarZone {
    pub fn new(offset: Option<FixedOffset>) -> Self {
        offset.map(CalendarZone::Fixed).unwrap_or(CalendarZone::Local)
    }

    pub fn today(&self) -> NaiveDate {
        let now = Utc::now();
        match self {
            CalendarZone::Local => now.with_timezone(&Local).date_naive(),
            CalendarZone::Fixed(tz) => now.with_timezone(tz).date_naive(),
        }
    }

    /// Unix millis of local midnight starting `date`.
    pub fn day_start_millis(&self, date: NaiveDate) -> Option<i64> {
        let midnight = date.and_hms_opt(0, 0, 0)?;
        match self {
            CalendarZone::Local => Local.from_local_datetime(&midnight).earliest(),
            CalendarZone::Fixed(tz) => tz
                .from_local_datetime(&midnight)
                .earliest()
                .map(|dt| dt.with_timezone(&Local)),
        }
        .map(|dt| dt.timestamp_millis())
    }

    pub fn distinct_dates(&self, showtimes: &[ShowtimeRecord]) -> Vec<NaiveDate> {
        match self {
            CalendarZone::Local => distinct_dates(showtimes, &Local),
            CalendarZone::Fixed(tz) => distinct_dates(showtimes, tz),
        }
    }

    pub fn filter(&self, showtimes: &[ShowtimeRecord], filter: &ShowtimeFilter) -> Vec<ShowtimeRecord> {
        match self {
            CalendarZone::Local => filter_showtimes(showtimes, filter, &Local),
            CalendarZone::Fixed(tz) => filter_showtimes(showtimes, filter, tz),
        }
    }
}

/// Calendar day of a unix timestamp (milliseconds) in `tz`.
pub fn local_day<Tz: TimeZone>(unix_time_millis: i64, tz: &Tz) -> Option<NaiveDate> {
    DateTime::from_timestamp_millis(unix_time_millis).map(|dt| dt.with_timezone(tz).date_naive())
}

/// Group by cinema name. Input order is kept inside each group.
pub fn group_by_cinema(showtimes: &[ShowtimeRecord]) -> BTreeMap<String, Vec<ShowtimeRecord>> {
    let mut groups: BTreeMap<String, Vec<ShowtimeRecord>> = BTreeMap::new();
    for st in showtimes {
        groups.entry(st.cinema_name.clone()).or_default().push(st.clone());
    }
    groups
}

/// Group by movie id. Posters come from `posters` (keyed by movie id),
/// falling back to `placeholder`.
pub fn group_by_movie(
    showtimes: &[ShowtimeRecord],
    posters: &HashMap<String, String>,
    placeholder: &str,
) -> BTreeMap<String, MovieShowtimes> {
    let mut groups: BTreeMap<String, MovieShowtimes> = BTreeMap::new();
    for st in showtimes {
        groups
            .entry(st.movie_id.clone())
            .or_insert_with(|| MovieShowtimes {
                movie_id: st.movie_id.clone(),
                title: st.movie_title.clone(),
                poster_url: posters
                    .get(&st.movie_id)
                    .cloned()
                    .unwrap_or_else(|| placeholder.to_string()),
                showtimes: Vec::new(),
            })
            .showtimes
            .push(st.clone());
    }
    groups
}

/// Distinct calendar days (in `tz`) that have at least one showtime, ascending.
pub fn distinct_dates<Tz: TimeZone>(showtimes: &[ShowtimeRecord], tz: &Tz) -> Vec<NaiveDate> {
    let days: BTreeSet<NaiveDate> = showtimes
        .iter()
        .filter_map(|st| local_day(st.unix_time_millis, tz))
        .collect();
    days.into_iter().collect()
}

pub fn filter_showtimes<Tz: TimeZone>(
    showtimes: &[ShowtimeRecord],
    filter: &ShowtimeFilter,
    tz: &Tz,
) -> Vec<ShowtimeRecord> {
    showtimes
        .iter()
        .filter(|st| match &filter.cinema_id {
            Some(id) => &st.cinema_id == id,
            None => true,
        })
        .filter(|st| match filter.date {
            Some(date) => local_day(st.unix_time_millis, tz) == Some(date),
            None => true,
        })
        .cloned()
        .collect()
}
