use axum::{
    extract::Request,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::api::{admin, handlers};
use crate::catalog::CalendarZone;
use crate::config::Config;
use crate::db::Repository;
use crate::tmdb::TmdbApi;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<dyn Repository>,
    pub tmdb: Option<Arc<dyn TmdbApi>>,
}

impl AppState {
    pub fn new(config: Config, db: Arc<dyn Repository>, tmdb: Option<Arc<dyn TmdbApi>>) -> Self {
        Self {
            config: Arc::new(config),
            db,
            tmdb,
        }
    }

    pub fn calendar_zone(&self) -> CalendarZone {
        CalendarZone::new(self.config.catalog.fixed_offset())
    }
}

pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/movies", get(handlers::list_movies))
        .route("/api/movies/:id", get(handlers::get_movie))
        .route("/api/cinemas", get(handlers::list_cinemas))
        .route("/api/cinemas/:id", get(handlers::get_cinema))
        .route("/api/showtimes", get(handlers::list_showtimes));

    let admin_routes = Router::new()
        .route(
            "/api/admin/movies",
            get(admin::list_movies).post(admin::create_movie),
        )
        .route(
            "/api/admin/movies/:id",
            put(admin::update_movie).delete(admin::delete_movie),
        )
        .route("/api/admin/movies/:id/refresh", post(admin::refresh_movie))
        .route("/api/admin/tmdb/search", get(admin::search_tmdb))
        .route(
            "/api/admin/cinemas",
            get(admin::list_cinemas).post(admin::create_cinema),
        )
        .route(
            "/api/admin/cinemas/:id",
            put(admin::update_cinema).delete(admin::delete_cinema),
        )
        .route("/api/admin/showtimes", post(admin::create_showtime))
        .route(
            "/api/admin/showtimes/:id",
            put(admin::update_showtime).delete(admin::delete_showtime),
        );

    let router = Router::new()
        .route("/robots.txt", get(robots_txt_handler))
        .merge(public_routes)
        .merge(admin_routes)
        .fallback(fallback_handler)
        .layer(axum::middleware::from_fn(crate::middleware::etag_validation))
        .layer(axum::middleware::from_fn(crate::middleware::log_request))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Layers on a router run after route matching, so the path is
    // rewritten in a wrapping router.
    Router::new()
        .fallback_service(router)
        .layer(axum::middleware::from_fn(crate::middleware::normalize_path))
}

async fn robots_txt_handler() -> &'static str {
    "User-agent: *\nDisallow: /api/\n"
}

async fn fallback_handler(req: Request) -> impl IntoResponse {
    // CORS preflight for unknown paths
    if req.method() == axum::http::Method::OPTIONS {
        return StatusCode::OK.into_response();
    }
    StatusCode::NOT_FOUND.into_response()
}
