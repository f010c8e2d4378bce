use std::cmp::Ordering;
use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

use super::projection::{build_projection, MovieProjection, ProjectionConfig};
use crate::db::{MetadataRecord, MetadataRepo, MovieRecord, MovieRepo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Rating,
    Hipster,
    Title,
    Recent,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rating" => Ok(SortKey::Rating),
            "hipster" => Ok(SortKey::Hipster),
            "title" | "name" => Ok(SortKey::Title),
            "recent" | "releaseyear" | "year" => Ok(SortKey::Recent),
            _ => Err(format!("unknown sort key: {}", s)),
        }
    }
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Rating => "rating",
            SortKey::Hipster => "hipster",
            SortKey::Title => "title",
            SortKey::Recent => "recent",
        }
    }
}

/// What a hipster listing shows when no movie at all has a rating from
/// the hipster source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HipsterFallback {
    /// The unfiltered page, sorted by rating.
    #[default]
    Rating,
    /// Nothing, with a notice.
    Empty,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListingConfig {
    #[serde(alias = "pagesize", rename = "pagesize")]
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(alias = "maxpagesize", rename = "maxpagesize")]
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
    #[serde(alias = "hipstersource", rename = "hipstersource")]
    #[serde(default = "default_hipster_source")]
    pub hipster_source: String,
    #[serde(alias = "hipsterfallback", rename = "hipsterfallback")]
    #[serde(default)]
    pub hipster_fallback: HipsterFallback,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            hipster_source: default_hipster_source(),
            hipster_fallback: HipsterFallback::default(),
        }
    }
}

fn default_page_size() -> u32 {
    20
}

fn default_max_page_size() -> u32 {
    100
}

fn default_hipster_source() -> String {
    "Letterboxd".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ListingNotice {
    /// No movie has a hipster rating; sorted by rating instead.
    HipsterFallbackApplied,
    /// No movie has a hipster rating.
    NoHipsterRatings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingPage {
    pub movies: Vec<MovieProjection>,
    pub has_more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<ListingNotice>,
}

impl ListingPage {
    pub fn empty() -> Self {
        Self {
            movies: Vec::new(),
            has_more: false,
            notice: None,
        }
    }
}

/// One page of movies, projected and sorted.
///
/// Fetches `page_size + 1` rows to learn whether another page exists.
/// Storage failures are logged and produce an empty page.
pub async fn list_movies<R>(
    repo: &R,
    projection: &ProjectionConfig,
    listing: &ListingConfig,
    page: u32,
    page_size: u32,
    sort: SortKey,
) -> ListingPage
where
    R: MovieRepo + MetadataRepo + ?Sized,
{
    match sort {
        SortKey::Hipster => list_hipster(repo, projection, listing, page, page_size).await,
        _ => list_sorted(repo, projection, listing, page, page_size, sort).await,
    }
}

async fn list_sorted<R>(
    repo: &R,
    projection: &ProjectionConfig,
    listing: &ListingConfig,
    page: u32,
    page_size: u32,
    sort: SortKey,
) -> ListingPage
where
    R: MovieRepo + MetadataRepo + ?Sized,
{
    let offset = page.saturating_mul(page_size);
    let records = match repo.list_movies(offset, page_size.saturating_add(1)).await {
        Ok(records) => records,
        Err(e) => {
            error!(page, page_size, "Failed to list movies: {}", e);
            return ListingPage::empty();
        }
    };

    let listing_page = project_page(repo, projection, listing, records, page_size, sort).await;
    debug!(
        page,
        page_size,
        sort = sort.as_str(),
        count = listing_page.movies.len(),
        has_more = listing_page.has_more,
        "Listed movies"
    );
    listing_page
}

/// Pages through the movies rated by the hipster source, highest rating
/// first. The fallback applies only when no movie has such a rating.
async fn list_hipster<R>(
    repo: &R,
    projection: &ProjectionConfig,
    listing: &ListingConfig,
    page: u32,
    page_size: u32,
) -> ListingPage
where
    R: MovieRepo + MetadataRepo + ?Sized,
{
    let source = listing.hipster_source.as_str();
    let offset = page.saturating_mul(page_size);
    let records = match repo
        .list_movies_with_rating_source(source, offset, page_size.saturating_add(1))
        .await
    {
        Ok(records) => records,
        Err(e) => {
            error!(page, page_size, source, "Failed to list hipster movies: {}", e);
            return ListingPage::empty();
        }
    };

    if !records.is_empty() {
        let listing_page =
            project_page(repo, projection, listing, records, page_size, SortKey::Hipster).await;
        debug!(page, page_size, source, count = listing_page.movies.len(), "Listed hipster movies");
        return listing_page;
    }

    // Past the end of a non-empty set is just the end.
    if offset > 0 {
        match repo.list_movies_with_rating_source(source, 0, 1).await {
            Ok(first) if !first.is_empty() => return ListingPage::empty(),
            Ok(_) => {}
            Err(e) => {
                error!(source, "Failed to list hipster movies: {}", e);
                return ListingPage::empty();
            }
        }
    }

    match listing.hipster_fallback {
        HipsterFallback::Rating => {
            debug!(source, "No hipster ratings, sorting by rating");
            let mut fallback =
                list_sorted(repo, projection, listing, page, page_size, SortKey::Rating).await;
            fallback.notice = Some(ListingNotice::HipsterFallbackApplied);
            fallback
        }
        HipsterFallback::Empty => ListingPage {
            notice: Some(ListingNotice::NoHipsterRatings),
            ..ListingPage::empty()
        },
    }
}

async fn project_page<R>(
    repo: &R,
    projection: &ProjectionConfig,
    listing: &ListingConfig,
    mut records: Vec<MovieRecord>,
    page_size: u32,
    sort: SortKey,
) -> ListingPage
where
    R: MetadataRepo + ?Sized,
{
    let has_more = records.len() > page_size as usize;
    records.truncate(page_size as usize);

    let movies = project_records(repo, &records, projection).await;
    ListingPage {
        movies: sort_projections(movies, sort, listing),
        has_more,
        notice: None,
    }
}

/// Project `records`, fetching their metadata in one batch.
/// A failed batch degrades every record to the default projection.
pub async fn project_records<R>(
    repo: &R,
    records: &[MovieRecord],
    projection: &ProjectionConfig,
) -> Vec<MovieProjection>
where
    R: MetadataRepo + ?Sized,
{
    let mut tmdb_ids: Vec<i64> = records.iter().filter_map(|m| m.tmdb_id).collect();
    tmdb_ids.sort_unstable();
    tmdb_ids.dedup();

    let metadata: HashMap<i64, MetadataRecord> = if tmdb_ids.is_empty() {
        HashMap::new()
    } else {
        match repo.get_metadata_batch(&tmdb_ids).await {
            Ok(rows) => rows.into_iter().map(|m| (m.tmdb_id, m)).collect(),
            Err(e) => {
                warn!(count = tmdb_ids.len(), "Metadata lookup failed, using defaults: {}", e);
                HashMap::new()
            }
        }
    };

    records
        .iter()
        .map(|movie| {
            let meta = movie.tmdb_id.and_then(|id| metadata.get(&id));
            build_projection(movie, meta, projection)
        })
        .collect()
}

/// Sort projections by `sort`. Hipster sorting orders by the hipster
/// source's rating and puts movies without one last; it never filters.
pub fn sort_projections(
    mut movies: Vec<MovieProjection>,
    sort: SortKey,
    listing: &ListingConfig,
) -> Vec<MovieProjection> {
    match sort {
        SortKey::Rating => movies.sort_by(|a, b| b.rating.total_cmp(&a.rating)),
        SortKey::Title => {
            movies.sort_by_cached_key(|m| (title_key(&m.display_title), m.display_title.clone()))
        }
        SortKey::Recent => movies.sort_by(|a, b| b.release_year_num().cmp(&a.release_year_num())),
        SortKey::Hipster => {
            let source = listing.hipster_source.as_str();
            movies.sort_by(|a, b| match (a.rating_from(source), b.rating_from(source)) {
                (Some(x), Some(y)) => y.total_cmp(&x),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            });
        }
    }
    movies
}

/// Collation key for titles: case folded, diacritics stripped, so
/// "Élan" sorts with the e's.
pub fn title_key(title: &str) -> String {
    title
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}
