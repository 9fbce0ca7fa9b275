use axum::extract::{Query, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use cinevault::app::{build_router, AppState};
use cinevault::client::ApiClient;
use cinevault::favorites::FavoritesStore;
use cinevault::queries::Queries;
use cinevault::query::{Category, QueryCache, QueryKey};
use cinevault::storage::MemoryStore;
use cinevault::tmdb::TmdbClient;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

const API_KEY: &str = "test-key";

#[derive(Clone, Default)]
struct Upstream {
    requests: Arc<Mutex<Vec<(String, HashMap<String, String>)>>>,
    reject_now_playing: bool,
}

impl Upstream {
    fn requests(&self) -> Vec<(String, HashMap<String, String>)> {
        self.requests.lock().unwrap().clone()
    }
}

fn listing(ids: &[i32], total_pages: u32) -> Value {
    let results: Vec<Value> = ids
        .iter()
        .map(|id| json!({ "id": id, "title": format!("Movie {id}"), "genre_ids": [28] }))
        .collect();
    json!({
        "page": 1,
        "results": results,
        "total_pages": total_pages,
        "total_results": ids.len()
    })
}

/// Stands in for the provider: checks credentials, records every request and
/// answers by path.
async fn upstream_handler(
    State(upstream): State<Upstream>,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let path = uri.path().to_string();
    upstream
        .requests
        .lock()
        .unwrap()
        .push((path.clone(), params.clone()));

    if params.get("api_key").map(String::as_str) != Some(API_KEY) {
        return (StatusCode::UNAUTHORIZED, "bad key").into_response();
    }
    let body = match path.as_str() {
        "/3/movie/now_playing" if upstream.reject_now_playing => {
            return (StatusCode::UNAUTHORIZED, "revoked").into_response();
        }
        "/3/trending/movie/day" => listing(&[1, 2, 3], 1000),
        "/3/movie/now_playing" | "/3/movie/popular" | "/3/movie/top_rated"
        | "/3/movie/upcoming" => listing(&[4], 10),
        "/3/discover/movie" => listing(&[10, 11], 42),
        "/3/search/movie" => listing(&[550], 1),
        "/3/movie/550" => json!({
            "id": 550,
            "title": "Fight Club",
            "release_date": "1999-10-15",
            "runtime": 139,
            "credits": {
                "cast": [{ "id": 819, "name": "Edward Norton", "order": 0 }],
                "crew": [{ "id": 7467, "name": "David Fincher", "job": "Director" }]
            },
            "similar": { "results": [] },
            "videos": {
                "results": [{
                    "id": "v1", "key": "abc", "site": "YouTube", "type": "Trailer"
                }]
            }
        }),
        "/3/genre/movie/list" => json!({ "genres": [{ "id": 28, "name": "Action" }] }),
        _ => return (StatusCode::NOT_FOUND, "no such endpoint").into_response(),
    };
    Json(body).into_response()
}

async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Fake provider, proxy and client wired together over real sockets.
async fn stack(upstream: Upstream, api_key: Option<&str>) -> Queries {
    let upstream_addr = serve(
        Router::new()
            .fallback(upstream_handler)
            .with_state(upstream),
    )
    .await;

    let tmdb = TmdbClient::new(
        format!("http://{upstream_addr}/3"),
        api_key.map(str::to_string),
        "vi-VN",
    )
    .unwrap();
    let proxy_addr = serve(build_router(AppState {
        tmdb: Arc::new(tmdb),
    }))
    .await;

    let api = ApiClient::new(format!("http://{proxy_addr}")).unwrap();
    Queries::new(
        QueryCache::new(),
        Arc::new(api),
        FavoritesStore::new(Arc::new(MemoryStore::new())),
    )
}

#[tokio::test]
async fn genre_listing_flows_through_the_proxy() {
    let upstream = Upstream::default();
    let queries = stack(upstream.clone(), Some(API_KEY)).await;

    let state = queries.genre(28, 1).await;
    let data = state.data.expect("genre listing");
    assert_eq!(data.page_count(), 42);
    let ids: Vec<i32> = data.results.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![10, 11]);
    assert!(queries
        .cache()
        .state::<cinevault::models::MoviesResponse>(&QueryKey::Genre {
            genre_id: 28,
            page: 1
        })
        .is_success());

    let requests = upstream.requests();
    assert_eq!(requests.len(), 1);
    let (path, params) = &requests[0];
    assert_eq!(path, "/3/discover/movie");
    assert_eq!(params["with_genres"], "28");
    assert_eq!(params["page"], "1");
    assert_eq!(params["sort_by"], "popularity.desc");
    assert_eq!(params["language"], "vi-VN");
}

#[tokio::test]
async fn trending_total_pages_are_capped_for_pagination() {
    let queries = stack(Upstream::default(), Some(API_KEY)).await;
    let data = queries.trending().await.data.unwrap();
    assert_eq!(data.total_pages, 1000);
    assert_eq!(data.page_count(), 500);
    assert!(!data.pagination(500).has_next());
}

#[tokio::test]
async fn rejected_upstream_surfaces_as_query_error() {
    let upstream = Upstream {
        reject_now_playing: true,
        ..Default::default()
    };
    let queries = stack(upstream, Some(API_KEY)).await;

    let state = queries.home_row(Category::NowPlaying).await;
    assert!(state.is_error);
    assert!(state.data.is_none());
    let message = state.error.unwrap();
    assert!(message.contains("API Error 500"), "{message}");
    assert!(message.contains("TMDb API error: 401"), "{message}");

    assert!(queries.home_row(Category::Popular).await.is_success());
}

#[tokio::test]
async fn missing_key_never_reaches_upstream() {
    let upstream = Upstream::default();
    let queries = stack(upstream.clone(), None).await;

    let state = queries.movie(550).await;
    assert!(state.is_error);
    assert!(state
        .error
        .unwrap()
        .contains("TMDB_API_KEY not configured"));
    assert!(upstream.requests().is_empty());
}

#[tokio::test]
async fn detail_appends_credits_similar_and_videos() {
    let upstream = Upstream::default();
    let queries = stack(upstream.clone(), Some(API_KEY)).await;

    let detail = queries.movie(550).await.data.unwrap();
    assert_eq!(detail.movie.title, "Fight Club");
    assert_eq!(detail.movie.year(), Some("1999"));
    assert_eq!(detail.director().map(|d| d.name.as_str()), Some("David Fincher"));
    assert_eq!(
        detail.trailer().and_then(|v| v.youtube_url()).as_deref(),
        Some("https://www.youtube.com/watch?v=abc")
    );

    let requests = upstream.requests();
    let (_, params) = &requests[0];
    assert_eq!(params["append_to_response"], "credits,similar,videos");
}

#[tokio::test]
async fn search_query_is_encoded_end_to_end() {
    let upstream = Upstream::default();
    let queries = stack(upstream.clone(), Some(API_KEY)).await;

    assert!(queries.search("f").await.data.is_none());
    let found = queries.search("fight club & co").await.data.unwrap();
    assert_eq!(found.results[0].id, 550);

    let requests = upstream.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].1["query"], "fight club & co");
}

#[tokio::test]
async fn genre_list_is_available() {
    let upstream = Upstream::default();
    let queries = stack(upstream, Some(API_KEY)).await;
    let genres = queries.genres().await.data.unwrap();
    assert_eq!(genres.genres[0].name, "Action");
}

#[tokio::test]
async fn favorites_round_trip_with_explicit_invalidation() {
    let queries = stack(Upstream::default(), Some(API_KEY)).await;
    let detail = queries.movie(550).await.data.unwrap();

    assert!(queries.favorites().await.data.unwrap().is_empty());
    queries
        .favorites_store()
        .add(detail.snapshot())
        .await
        .unwrap();
    queries.cache().invalidate(&QueryKey::Favorites);

    let favorites = queries.favorites().await.data.unwrap();
    assert_eq!(favorites.len(), 1);
    assert_eq!(favorites[0].title, "Fight Club");
    assert!(queries.favorites_store().contains(550).await);
}
