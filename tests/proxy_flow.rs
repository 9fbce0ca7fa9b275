use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use cinevault::app::{build_router, AppState};
use cinevault::tmdb::{ProviderError, TmdbApi};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt;

#[derive(Default)]
struct FakeTmdb {
    calls: Mutex<Vec<String>>,
    fail_with: Option<u16>,
    missing_key: bool,
}

impl FakeTmdb {
    fn respond(&self, call: String) -> Result<Value, ProviderError> {
        self.calls.lock().unwrap().push(call.clone());
        if self.missing_key {
            return Err(ProviderError::MissingApiKey);
        }
        if let Some(code) = self.fail_with {
            return Err(ProviderError::Status {
                status: StatusCode::from_u16(code).unwrap(),
                body: r#"{"status_message":"Invalid API key"}"#.to_string(),
            });
        }
        Ok(json!({
            "page": 1,
            "results": [{ "id": 1, "title": call }],
            "total_pages": 1,
            "total_results": 1
        }))
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl TmdbApi for FakeTmdb {
    async fn trending(&self) -> Result<Value, ProviderError> {
        self.respond("trending".into())
    }

    async fn now_playing(&self, page: &str) -> Result<Value, ProviderError> {
        self.respond(format!("now_playing page={page}"))
    }

    async fn popular(&self, page: &str) -> Result<Value, ProviderError> {
        self.respond(format!("popular page={page}"))
    }

    async fn top_rated(&self, page: &str) -> Result<Value, ProviderError> {
        self.respond(format!("top_rated page={page}"))
    }

    async fn upcoming(&self, page: &str) -> Result<Value, ProviderError> {
        self.respond(format!("upcoming page={page}"))
    }

    async fn by_genre(&self, genre_id: &str, page: &str) -> Result<Value, ProviderError> {
        self.respond(format!("genre {genre_id} page={page}"))
    }

    async fn search(&self, query: &str, page: &str) -> Result<Value, ProviderError> {
        self.respond(format!("search {query} page={page}"))
    }

    async fn movie_detail(&self, id: &str) -> Result<Value, ProviderError> {
        self.calls.lock().unwrap().push(format!("movie {id}"));
        if self.missing_key {
            return Err(ProviderError::MissingApiKey);
        }
        Ok(json!({
            "id": 550,
            "title": "Fight Club",
            "runtime": 139,
            "credits": { "cast": [], "crew": [] },
            "similar": { "results": [] },
            "videos": { "results": [] }
        }))
    }

    async fn genres(&self) -> Result<Value, ProviderError> {
        self.calls.lock().unwrap().push("genres".into());
        Ok(json!({ "genres": [{ "id": 28, "name": "Action" }] }))
    }
}

fn app(tmdb: FakeTmdb) -> (Router, Arc<FakeTmdb>) {
    let tmdb = Arc::new(tmdb);
    let router = build_router(AppState { tmdb: tmdb.clone() });
    (router, tmdb)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let res = app.oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn health_is_ok() {
    let (app, _) = app(FakeTmdb::default());
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn listings_default_to_page_one() {
    let (router, tmdb) = app(FakeTmdb::default());
    for uri in [
        "/api/movies/now-playing",
        "/api/movies/popular?page=",
        "/api/movies/top-rated?page=3",
        "/api/movies/upcoming?page=2",
    ] {
        let (status, _) = get(router.clone(), uri).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
    }
    assert_eq!(
        tmdb.calls(),
        vec![
            "now_playing page=1",
            "popular page=1",
            "top_rated page=3",
            "upcoming page=2"
        ]
    );
}

#[tokio::test]
async fn upstream_body_is_passed_through() {
    let (router, _) = app(FakeTmdb::default());
    let (status, body) = get(router, "/api/movies/trending").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"][0]["title"], "trending");
    assert_eq!(body["total_results"], 1);
}

#[tokio::test]
async fn genre_route_forwards_id_and_page() {
    let (router, tmdb) = app(FakeTmdb::default());
    let (status, _) = get(router, "/api/movies/genre/28?page=4").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tmdb.calls(), vec!["genre 28 page=4"]);
}

#[tokio::test]
async fn search_without_query_short_circuits() {
    let (router, tmdb) = app(FakeTmdb::default());
    for uri in ["/api/movies/search", "/api/movies/search?query="] {
        let (status, body) = get(router.clone(), uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "results": [], "total_results": 0 }));
    }
    assert!(tmdb.calls().is_empty());

    let (status, _) = get(router, "/api/movies/search?query=fight%20club").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tmdb.calls(), vec!["search fight club page=1"]);
}

#[tokio::test]
async fn static_routes_win_over_movie_id() {
    let (router, tmdb) = app(FakeTmdb::default());
    get(router.clone(), "/api/movies/popular").await;
    let (status, body) = get(router, "/api/movies/550").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["runtime"], 139);
    assert_eq!(tmdb.calls(), vec!["popular page=1", "movie 550"]);
}

#[tokio::test]
async fn genres_are_listed() {
    let (router, _) = app(FakeTmdb::default());
    let (status, body) = get(router, "/api/genres").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["genres"][0]["name"], "Action");
}

#[tokio::test]
async fn upstream_failure_becomes_500_with_status_in_message() {
    let (router, _) = app(FakeTmdb {
        fail_with: Some(401),
        ..Default::default()
    });
    let (status, body) = get(router, "/api/movies/now-playing").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "TMDb API error: 401" }));
}

#[tokio::test]
async fn missing_key_is_reported_per_request() {
    let (router, _) = app(FakeTmdb {
        missing_key: true,
        ..Default::default()
    });
    let (status, body) = get(router.clone(), "/api/movies/550").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "TMDB_API_KEY not configured");

    // The short-circuited search never needs the key.
    let (status, _) = get(router, "/api/movies/search").await;
    assert_eq!(status, StatusCode::OK);
}
