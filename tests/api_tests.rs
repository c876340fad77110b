use std::{sync::Arc, time::Duration};

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};

use movie_recommender::{
    api::{create_router, AppState},
    cache::MemoryStore,
    config::Config,
    data::{loader, DataSource, PreloadedSource, RawData},
    error::AppResult,
    models::MovieMetadata,
    services::{ContentIndex, Pipeline},
};

const MOVIES: &str = "movieId,title,genres\n\
10,Alien (1979),Horror|Sci-Fi\n\
11,Aliens (1986),Action|Sci-Fi\n\
12,Heat (1995),Crime\n\
13,Casablanca (1942),Drama|Romance\n";

const RATINGS: &str = "userId,movieId,rating,timestamp\n\
1,10,5.0,0\n\
1,11,4.0,0\n\
1,12,2.0,0\n\
2,10,4.0,0\n\
3,12,5.0,0\n\
3,13,4.5,0\n";

fn config() -> Config {
    Config {
        als_iterations: 5,
        als_rank: 3,
        ..Config::default()
    }
}

fn pipeline(config: &Config) -> Pipeline {
    let catalog = loader::read_movies(MOVIES.as_bytes()).unwrap();
    let source: Arc<dyn DataSource> = Arc::new(PreloadedSource::new(catalog, RATINGS));
    Pipeline::new(source, config.als_params())
}

fn content_index() -> ContentIndex {
    let meta = |id: i64, title: &str, plot: &str, cast: &str, genres: &str| MovieMetadata {
        movie_id: id,
        original_title: title.to_string(),
        plot: Some(plot.to_string()),
        cast: Some(cast.to_string()),
        genres: Some(genres.to_string()),
    };
    ContentIndex::build(vec![
        meta(
            1,
            "alien",
            "The crew of a spaceship is hunted by a deadly creature",
            "Sigourney Weaver",
            "Horror Science Fiction",
        ),
        meta(
            2,
            "aliens",
            "Marines return to the planet to fight the creature",
            "Sigourney Weaver Michael Biehn",
            "Action Science Fiction",
        ),
        meta(
            3,
            "casablanca",
            "A nightclub owner meets an old flame in wartime Morocco",
            "Humphrey Bogart",
            "Drama Romance",
        ),
    ])
}

fn create_test_server() -> TestServer {
    let config = config();
    let pipeline = pipeline(&config);
    let state = AppState::new(config, pipeline, Some(content_index()));
    TestServer::new(create_router(state)).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server();
    let response = server.get("/health").await;
    response.assert_status_ok();
    response.assert_json(&json!({ "status": "healthy" }));
}

#[tokio::test]
async fn test_recommendations_for_existing_user() {
    let server = create_test_server();

    let response = server.get("/movie?user=2&n=2").await;
    response.assert_status_ok();

    let body: Value = response.json();
    let ranked = body.as_object().unwrap();
    assert_eq!(ranked.len(), 2);
    assert!(ranked.contains_key("1"));
    assert!(ranked.contains_key("2"));
    // User 2 already rated Alien
    assert!(ranked.values().all(|title| title != "Alien (1979)"));
}

#[tokio::test]
async fn test_default_count_is_bounded_by_candidates() {
    let server = create_test_server();

    let response = server.get("/movie?user=1").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body, json!({ "1": "Casablanca (1942)" }));
}

#[tokio::test]
async fn test_unknown_user_is_not_found() {
    let server = create_test_server();

    let response = server.get("/movie?user=42").await;
    response.assert_status(StatusCode::NOT_FOUND);
    response.assert_json(&json!({ "error": "User not found" }));
}

#[tokio::test]
async fn test_cold_start_from_favorites() {
    let server = create_test_server();

    let response = server.get("/movie?favorite=Alien&n=5").await;
    response.assert_status_ok();

    let body: Value = response.json();
    let titles: Vec<&str> = body
        .as_object()
        .unwrap()
        .values()
        .map(|v| v.as_str().unwrap())
        .collect();
    // "Alien" matches both Alien and Aliens, leaving the other two movies
    assert_eq!(titles.len(), 2);
    assert!(titles.contains(&"Heat (1995)"));
    assert!(titles.contains(&"Casablanca (1942)"));
}

#[tokio::test]
async fn test_cold_start_without_matches_is_not_found() {
    let server = create_test_server();

    let response = server.get("/movie?favorite=Vertigo&favorite=Psycho").await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_queries_are_rejected() {
    let server = create_test_server();

    for uri in [
        "/movie",
        "/movie?user=abc",
        "/movie?user=1&title=heat",
        "/movie?user=1&n=0",
        "/movie?user=1&n=1000",
    ] {
        let response = server.get(uri).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert!(body["error"].is_string(), "{uri}");
    }
}

#[tokio::test]
async fn test_similar_movies_by_title() {
    let server = create_test_server();

    let response = server.get("/movie?title=ALIEN").await;
    response.assert_status_ok();

    let movies: Vec<Value> = response.json();
    assert_eq!(movies.len(), 2);
    assert_eq!(movies[0]["Movie_Id"], 2);
    assert_eq!(movies[0]["Name"], "aliens");
    assert_eq!(movies[0]["Genres"], "Action Science Fiction");
}

#[tokio::test]
async fn test_unknown_title_is_not_found() {
    let server = create_test_server();

    let response = server.get("/movie?title=vertigo").await;
    response.assert_status(StatusCode::NOT_FOUND);
    response.assert_json(&json!({ "error": "Movie not in Database" }));
}

#[tokio::test]
async fn test_title_query_without_content_data() {
    let config = config();
    let pipeline = pipeline(&config);
    let server = TestServer::new(create_router(AppState::new(config, pipeline, None))).unwrap();

    let response = server.get("/movie?title=alien").await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_memory_cache_gives_identical_results() {
    let config = config();
    let pipeline = pipeline(&config).with_store(Arc::new(MemoryStore::new(2)));
    let server = TestServer::new(create_router(AppState::new(config, pipeline, None))).unwrap();

    let first: Value = server.get("/movie?user=3").await.json();
    let second: Value = server.get("/movie?user=3").await.json();
    assert_eq!(first, second);
}

/// Loads the test data after a pause
struct SlowSource(PreloadedSource);

impl DataSource for SlowSource {
    fn load(&self) -> AppResult<RawData> {
        std::thread::sleep(Duration::from_millis(300));
        self.0.load()
    }

    fn name(&self) -> &'static str {
        "slow"
    }
}

#[tokio::test]
async fn test_request_over_time_limit_is_unavailable() {
    let config = Config {
        request_timeout_secs: 0,
        ..config()
    };
    let catalog = loader::read_movies(MOVIES.as_bytes()).unwrap();
    let source: Arc<dyn DataSource> = Arc::new(SlowSource(PreloadedSource::new(catalog, RATINGS)));
    let pipeline = Pipeline::new(source, config.als_params());
    let server = TestServer::new(create_router(AppState::new(config, pipeline, None))).unwrap();

    let response = server.get("/movie?user=1").await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json();
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Request cancelled"));
}

#[tokio::test]
async fn test_quoted_ratings_file_is_accepted() {
    let config = config();
    let catalog = loader::read_movies(MOVIES.as_bytes()).unwrap();
    let ratings = "\"userId\",\"movieId\",\"rating\"\n\"1\",\"10\",\"5.0\"\n\"2\",\"11\",\"4.0\"\n";
    let source: Arc<dyn DataSource> = Arc::new(PreloadedSource::new(catalog, ratings));
    let pipeline = Pipeline::new(source, config.als_params());
    let server = TestServer::new(create_router(AppState::new(config, pipeline, None))).unwrap();

    server.get("/movie?user=1&n=1").await.assert_status_ok();
}

#[tokio::test]
async fn test_non_finite_rating_is_bad_request() {
    let config = config();
    let catalog = loader::read_movies(MOVIES.as_bytes()).unwrap();
    let source: Arc<dyn DataSource> = Arc::new(PreloadedSource::new(
        catalog,
        "userId,movieId,rating\n1,10,NaN\n",
    ));
    let pipeline = Pipeline::new(source, config.als_params());
    let server = TestServer::new(create_router(AppState::new(config, pipeline, None))).unwrap();

    server
        .get("/movie?user=1")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_request_id_is_generated_and_echoed() {
    let server = create_test_server();

    let response = server.get("/health").await;
    let generated = response.header("x-request-id");
    assert!(uuid::Uuid::parse_str(generated.to_str().unwrap()).is_ok());

    let id = uuid::Uuid::new_v4().to_string();
    let response = server
        .get("/health")
        .add_header(
            HeaderName::from_static("x-request-id"),
            HeaderValue::from_str(&id).unwrap(),
        )
        .await;
    assert_eq!(response.header("x-request-id").to_str().unwrap(), id);
}
