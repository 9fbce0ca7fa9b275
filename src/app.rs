use crate::tmdb::{ProviderError, TmdbApi, TmdbClient};
use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::{env, net::SocketAddr, sync::Arc};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

const DEFAULT_PORT: u16 = 5000;

#[derive(Clone)]
pub struct AppState {
    pub tmdb: Arc<dyn TmdbApi>,
}

#[derive(Debug, Deserialize)]
struct PageParams {
    page: Option<String>,
}

impl PageParams {
    fn page(&self) -> &str {
        self.page.as_deref().filter(|p| !p.is_empty()).unwrap_or("1")
    }
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    query: Option<String>,
    page: Option<String>,
}

/// Any provider failure is reported to the app as a 500 with `{ "error": ... }`.
pub struct ProxyError(ProviderError);

impl From<ProviderError> for ProxyError {
    fn from(err: ProviderError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        match &self.0 {
            ProviderError::Status { status, body } => {
                error!("TMDb responded with {}: {}", status, body);
            }
            other => error!("TMDb request failed: {}", other),
        }
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

type ProxyResult = std::result::Result<Json<Value>, ProxyError>;

pub async fn run_server() -> Result<()> {
    let tmdb = TmdbClient::from_env()?;
    if !tmdb.has_api_key() {
        warn!("TMDB_API_KEY is not set; every movie request will fail until it is");
    }
    let state = AppState {
        tmdb: Arc::new(tmdb),
    };

    let app = build_router(state).layer(TraceLayer::new_for_http());

    let port = env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/movies/trending", get(trending))
        .route("/api/movies/now-playing", get(now_playing))
        .route("/api/movies/popular", get(popular))
        .route("/api/movies/top-rated", get(top_rated))
        .route("/api/movies/upcoming", get(upcoming))
        .route("/api/movies/genre/:genre_id", get(by_genre))
        .route("/api/movies/search", get(search))
        .route("/api/movies/:id", get(movie_detail))
        .route("/api/genres", get(genres))
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

async fn trending(State(state): State<AppState>) -> ProxyResult {
    Ok(Json(state.tmdb.trending().await?))
}

async fn now_playing(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> ProxyResult {
    Ok(Json(state.tmdb.now_playing(params.page()).await?))
}

async fn popular(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> ProxyResult {
    Ok(Json(state.tmdb.popular(params.page()).await?))
}

async fn top_rated(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> ProxyResult {
    Ok(Json(state.tmdb.top_rated(params.page()).await?))
}

async fn upcoming(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> ProxyResult {
    Ok(Json(state.tmdb.upcoming(params.page()).await?))
}

async fn by_genre(
    State(state): State<AppState>,
    Path(genre_id): Path<String>,
    Query(params): Query<PageParams>,
) -> ProxyResult {
    Ok(Json(state.tmdb.by_genre(&genre_id, params.page()).await?))
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ProxyResult {
    let Some(query) = params.query.as_deref().filter(|q| !q.is_empty()) else {
        return Ok(Json(json!({ "results": [], "total_results": 0 })));
    };
    let page = params.page.as_deref().filter(|p| !p.is_empty()).unwrap_or("1");
    Ok(Json(state.tmdb.search(query, page).await?))
}

async fn movie_detail(State(state): State<AppState>, Path(id): Path<String>) -> ProxyResult {
    Ok(Json(state.tmdb.movie_detail(&id).await?))
}

async fn genres(State(state): State<AppState>) -> ProxyResult {
    Ok(Json(state.tmdb.genres().await?))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Could not listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                error!("Could not listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl+C received, draining connections"),
        _ = terminate => info!("SIGTERM received, draining connections"),
    }
}
