use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use felem::config::Config;
use felem::db::{
    CinemaRecord, CinemaRepo, MetadataRecord, MetadataRepo, MovieRecord, MovieRepo, Repository,
    Showtime, ShowtimeRepo, SqliteRepository,
};
use felem::server::{build_router, AppState};
use felem::tmdb::{TmdbApi, TmdbError, TmdbMovie, TmdbResult, TmdbSearchResult};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;

// 2024-03-01T10:00:00Z
const MORNING: i64 = 1_709_287_200_000;
const HOUR: i64 = 3_600_000;

struct FakeTmdb;

#[async_trait::async_trait]
impl TmdbApi for FakeTmdb {
    async fn fetch_movie(&self, tmdb_id: i64) -> TmdbResult<TmdbMovie> {
        if tmdb_id != 603 {
            return Err(TmdbError::NotFound(tmdb_id));
        }
        let movie = serde_json::from_value(json!({
            "id": 603,
            "title": "The Matrix",
            "poster_path": "/matrix.jpg",
            "release_date": "1999-03-30",
            "vote_average": 8.2,
            "vote_count": 24000,
            "genres": [{"id": 28, "name": "Action"}],
            "watch/providers": {"results": {"NL": {"flatrate": [{"provider_name": "Netflix"}]}}}
        }))
        .map_err(|e| TmdbError::Parse(e.to_string()))?;
        Ok(movie)
    }

    async fn search_movie(&self, query: &str, _year: Option<i32>) -> TmdbResult<Vec<TmdbSearchResult>> {
        Ok(vec![TmdbSearchResult {
            id: 603,
            title: query.to_string(),
            release_date: Some("1999-03-30".to_string()),
            poster_path: None,
        }])
    }
}

async fn setup(tmdb: Option<Arc<dyn TmdbApi>>) -> (Router, Arc<SqliteRepository>) {
    let repo = Arc::new(SqliteRepository::new("sqlite::memory:").await.unwrap());
    let mut config = Config::default();
    config.catalog.utc_offset = Some(0);
    let db: Arc<dyn Repository> = repo.clone();
    let state = AppState::new(config, db, tmdb);
    (build_router(state), repo)
}

fn movie(id: &str, title: &str, tmdb_id: Option<i64>, day: u32) -> MovieRecord {
    MovieRecord {
        id: id.to_string(),
        title: title.to_string(),
        tmdb_id,
        created: Some(format!("2024-01-{:02}T00:00:00+00:00", day)),
    }
}

fn metadata(tmdb_id: i64, title: &str, ratings: Value) -> MetadataRecord {
    MetadataRecord {
        tmdb_id,
        title: Some(title.to_string()),
        poster_path: Some(format!("/{}.jpg", tmdb_id)),
        backdrop_path: None,
        release_date: Some("2001-07-20".to_string()),
        overview: None,
        ratings: ratings.to_string(),
        genres: "[]".to_string(),
        providers: "[]".to_string(),
        updated: None,
    }
}

async fn seed_cinema(repo: &SqliteRepository) {
    repo.upsert_cinema(&CinemaRecord {
        id: "c1".to_string(),
        name: "Rialto".to_string(),
        address: None,
        city: Some("Amsterdam".to_string()),
        website: None,
    })
    .await
    .unwrap();
}

fn showtime(id: &str, movie_id: &str, millis: i64) -> Showtime {
    Showtime {
        id: id.to_string(),
        cinema_id: "c1".to_string(),
        movie_id: movie_id.to_string(),
        unix_time_millis: millis,
        format: "2D".to_string(),
        ticket_type: "Standard".to_string(),
        booking_link: None,
    }
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn send_json(app: &Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn test_empty_listing() {
    let (app, _repo) = setup(None).await;
    let (status, body) = get(&app, "/api/movies").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["movies"], json!([]));
    assert_eq!(body["hasMore"], json!(false));
}

#[tokio::test]
async fn test_listing_pages_and_sorts() {
    let (app, repo) = setup(None).await;
    for i in 1..=11u32 {
        repo.upsert_movie(&movie(&format!("m{}", i), &format!("Movie {}", i), None, i))
            .await
            .unwrap();
    }

    let (_, body) = get(&app, "/api/movies?pageSize=10").await;
    assert_eq!(body["movies"].as_array().unwrap().len(), 10);
    assert_eq!(body["hasMore"], json!(true));

    let (_, body) = get(&app, "/api/movies?page=1&pageSize=10").await;
    assert_eq!(body["movies"].as_array().unwrap().len(), 1);
    assert_eq!(body["hasMore"], json!(false));

    let (status, _) = get(&app, "/api/movies?pageSize=ten").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Unknown sort keys fall back to rating.
    let (status, _) = get(&app, "/api/movies?sort=popularity").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_listing_uses_metadata_ratings() {
    let (app, repo) = setup(None).await;
    repo.upsert_movie(&movie("a", "A", Some(1), 1)).await.unwrap();
    repo.upsert_movie(&movie("b", "B", Some(2), 2)).await.unwrap();
    repo.upsert_movie(&movie("c", "C", None, 3)).await.unwrap();
    repo.upsert_metadata(&metadata(1, "Alpha", json!([{"source": "TMDB", "rating": 9.0}])))
        .await
        .unwrap();
    repo.upsert_metadata(&metadata(
        2,
        "Beta",
        json!([{"source": "TMDB", "rating": 6.0}, {"source": "Letterboxd", "rating": 8.0}]),
    ))
    .await
    .unwrap();

    let (_, body) = get(&app, "/api/movies").await;
    let ids: Vec<&str> = body["movies"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_str().unwrap())
        .collect();
    // 9.0, 7.0 (median of 6 and 8), 5.0 default
    assert_eq!(ids, vec!["a", "b", "c"]);
    assert_eq!(body["movies"][0]["displayTitle"], json!("Alpha"));
    assert_eq!(body["movies"][0]["releaseYear"], json!("2001"));
    assert_eq!(body["movies"][2]["posterUrl"], json!("/static/poster-placeholder.png"));

    let (_, body) = get(&app, "/api/movies?sort=hipster").await;
    assert_eq!(body["movies"].as_array().unwrap().len(), 1);
    assert_eq!(body["movies"][0]["id"], json!("b"));

    // The newest movie has no Letterboxd rating; the first page still finds "b".
    let (_, body) = get(&app, "/api/movies?sort=hipster&pageSize=1").await;
    assert_eq!(body["movies"].as_array().unwrap().len(), 1);
    assert_eq!(body["movies"][0]["id"], json!("b"));
    assert_eq!(body["hasMore"], json!(false));
}

#[tokio::test]
async fn test_movie_detail() {
    let (app, repo) = setup(None).await;
    seed_cinema(&repo).await;
    repo.upsert_movie(&movie("m1", "Stalker", None, 1)).await.unwrap();
    repo.upsert_showtime(&showtime("s1", "m1", MORNING)).await.unwrap();
    repo.upsert_showtime(&showtime("s2", "m1", MORNING + 2 * HOUR)).await.unwrap();
    repo.upsert_showtime(&showtime("s3", "m1", MORNING + 24 * HOUR)).await.unwrap();

    let (status, body) = get(&app, "/api/movies/m1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["movie"]["rating"], json!(5.0));
    assert_eq!(body["dates"], json!(["2024-03-01", "2024-03-02"]));
    assert_eq!(body["showtimes"]["Rialto"].as_array().unwrap().len(), 3);

    let (_, body) = get(&app, "/api/movies/m1?date=2024-03-02").await;
    assert_eq!(body["showtimes"]["Rialto"].as_array().unwrap().len(), 1);
    assert_eq!(body["dates"].as_array().unwrap().len(), 2);

    let (status, body) = get(&app, "/api/movies/missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("missing"));
}

#[tokio::test]
async fn test_cinema_detail_and_showtimes_range() {
    let (app, repo) = setup(None).await;
    seed_cinema(&repo).await;
    repo.upsert_movie(&movie("m1", "Stalker", Some(1), 1)).await.unwrap();
    repo.upsert_movie(&movie("m2", "Solaris", None, 2)).await.unwrap();
    repo.upsert_metadata(&metadata(1, "Stalker", json!([]))).await.unwrap();
    repo.upsert_showtime(&showtime("s1", "m1", MORNING)).await.unwrap();
    repo.upsert_showtime(&showtime("s2", "m2", MORNING + HOUR)).await.unwrap();
    repo.upsert_showtime(&showtime("s3", "m1", MORNING + 10 * 24 * HOUR)).await.unwrap();

    let (status, body) = get(&app, "/api/cinemas/c1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cinema"]["name"], json!("Rialto"));
    let movies = body["movies"].as_array().unwrap();
    assert_eq!(movies.len(), 2);
    assert_eq!(movies[0]["movieId"], json!("m1"));
    assert_eq!(movies[0]["posterUrl"], json!("https://image.tmdb.org/t/p/w500/1.jpg"));
    assert_eq!(movies[0]["showtimes"].as_array().unwrap().len(), 2);
    assert_eq!(movies[1]["posterUrl"], json!("/static/poster-placeholder.png"));

    let (_, body) = get(&app, "/api/showtimes?from=2024-03-01&days=3").await;
    assert_eq!(body["showtimes"].as_array().unwrap().len(), 2);
    assert_eq!(body["dates"], json!(["2024-03-01"]));

    let (_, body) = get(&app, "/api/showtimes?from=2024-03-01&days=31&cinema=other").await;
    assert!(body["showtimes"].as_array().unwrap().is_empty());

    let (status, _) = get(&app, "/api/cinemas/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_crud() {
    let (app, _repo) = setup(None).await;

    let (status, created) = send_json(&app, "POST", "/api/admin/movies", json!({"title": "Dune"})).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_string();

    let (status, body) = get(&app, &format!("/api/movies/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["movie"]["title"], json!("Dune"));

    let (status, _) = send_json(&app, "POST", "/api/admin/movies", json!({"title": ""})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, cinema) = send_json(&app, "POST", "/api/admin/cinemas", json!({"name": "Kriterion"})).await;
    assert_eq!(status, StatusCode::CREATED);
    let cinema_id = cinema["id"].as_str().unwrap().to_string();

    let (status, st) = send_json(
        &app,
        "POST",
        "/api/admin/showtimes",
        json!({"cinemaId": cinema_id, "movieId": id, "unixTimeMillis": MORNING}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(st["cinemaName"], json!("Kriterion"));
    assert_eq!(st["movieTitle"], json!("Dune"));

    let (status, _) = send_json(
        &app,
        "POST",
        "/api/admin/showtimes",
        json!({"cinemaId": "unknown", "movieId": id, "unixTimeMillis": MORNING}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, updated) = send_json(
        &app,
        "PUT",
        &format!("/api/admin/movies/{}", id),
        json!({"title": "Dune: Part One"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], json!("Dune: Part One"));
    assert_eq!(updated["created"], created["created"]);

    let (status, _) = send_json(&app, "DELETE", &format!("/api/admin/movies/{}", id), Value::Null).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = get(&app, &format!("/api/movies/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_refresh_requires_tmdb() {
    let (app, repo) = setup(None).await;
    repo.upsert_movie(&movie("m1", "The Matrix", Some(603), 1)).await.unwrap();

    let (status, _) = send_json(&app, "POST", "/api/admin/movies/m1/refresh", Value::Null).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let (status, _) = get(&app, "/api/admin/tmdb/search?query=matrix").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_refresh_keeps_other_ratings() {
    let (app, repo) = setup(Some(Arc::new(FakeTmdb))).await;
    repo.upsert_movie(&movie("m1", "Matrix", Some(603), 1)).await.unwrap();
    repo.upsert_movie(&movie("m2", "Untracked", None, 2)).await.unwrap();
    repo.upsert_metadata(&metadata(
        603,
        "Matrix",
        json!([{"source": "TMDB", "rating": 1.0}, {"source": "Letterboxd", "rating": 9.0}]),
    ))
    .await
    .unwrap();

    let (status, body) = send_json(&app, "POST", "/api/admin/movies/m1/refresh", Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["displayTitle"], json!("The Matrix"));
    assert_eq!(body["providers"], json!(["Netflix"]));
    // median of 8.2 and 9.0
    assert!((body["rating"].as_f64().unwrap() - 8.6).abs() < 1e-9);

    let stored = repo.get_metadata(603).await.unwrap();
    assert!(stored.ratings.contains("Letterboxd"));

    let (status, _) = send_json(&app, "POST", "/api/admin/movies/m2/refresh", Value::Null).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = get(&app, "/api/admin/tmdb/search?query=matrix&year=1999").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["id"], json!(603));
}

#[tokio::test]
async fn test_etag_not_modified() {
    let (app, repo) = setup(None).await;
    seed_cinema(&repo).await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/api/cinemas").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let etag = response.headers().get(header::ETAG).unwrap().clone();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/cinemas")
                .header(header::IF_NONE_MATCH, etag.clone())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(response.headers().get(header::ETAG), Some(&etag));
}

#[tokio::test]
async fn test_path_normalization() {
    let (app, _repo) = setup(None).await;
    let (status, _) = get(&app, "/api//movies/").await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = get(&app, "/api/nothing-here").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
