pub mod listing;
pub mod projection;
pub mod providers;
pub mod rating;
pub mod showtimes;

pub use listing::{
    list_movies, project_records, sort_projections, HipsterFallback, ListingConfig, ListingNotice,
    ListingPage, SortKey,
};
pub use projection::{build_projection, default_projection, MovieProjection, ProjectionConfig};
pub use providers::StreamingProviders;
pub use rating::{median_rating, RatingRecord};
pub use showtimes::{
    distinct_dates, filter_showtimes, group_by_cinema, group_by_movie, local_day, CalendarZone,
    MovieShowtimes, ShowtimeFilter,
};
