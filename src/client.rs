use crate::models::{GenreList, MovieDetail, MoviesResponse};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::env;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_API_URL: &str = "http://localhost:5000";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("API Error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("API request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Failed to decode API response from {path}: {source}")]
    Decode {
        path: String,
        source: serde_json::Error,
    },
}

/// Typed view of the proxy's HTTP surface.
#[async_trait]
pub trait MovieApi: Send + Sync {
    async fn fetch_trending(&self) -> Result<MoviesResponse, ClientError>;
    async fn fetch_now_playing(&self, page: u32) -> Result<MoviesResponse, ClientError>;
    async fn fetch_popular(&self, page: u32) -> Result<MoviesResponse, ClientError>;
    async fn fetch_top_rated(&self, page: u32) -> Result<MoviesResponse, ClientError>;
    async fn fetch_upcoming(&self, page: u32) -> Result<MoviesResponse, ClientError>;
    async fn fetch_by_genre(&self, genre_id: i32, page: u32)
        -> Result<MoviesResponse, ClientError>;
    async fn search_movies(&self, query: &str, page: u32) -> Result<MoviesResponse, ClientError>;
    async fn fetch_movie_detail(&self, id: i32) -> Result<MovieDetail, ClientError>;
    async fn fetch_genres(&self) -> Result<GenreList, ClientError>;
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build API HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let base_url =
            env::var("CINEVAULT_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        Self::new(base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.url(path);
        debug!(url = %url, "GET");
        let res = self.client.get(&url).send().await?;
        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        serde_json::from_str(&text).map_err(|source| ClientError::Decode {
            path: path.to_string(),
            source,
        })
    }
}

#[async_trait]
impl MovieApi for ApiClient {
    async fn fetch_trending(&self) -> Result<MoviesResponse, ClientError> {
        self.get_json("/api/movies/trending").await
    }

    async fn fetch_now_playing(&self, page: u32) -> Result<MoviesResponse, ClientError> {
        self.get_json(&format!("/api/movies/now-playing?page={page}"))
            .await
    }

    async fn fetch_popular(&self, page: u32) -> Result<MoviesResponse, ClientError> {
        self.get_json(&format!("/api/movies/popular?page={page}"))
            .await
    }

    async fn fetch_top_rated(&self, page: u32) -> Result<MoviesResponse, ClientError> {
        self.get_json(&format!("/api/movies/top-rated?page={page}"))
            .await
    }

    async fn fetch_upcoming(&self, page: u32) -> Result<MoviesResponse, ClientError> {
        self.get_json(&format!("/api/movies/upcoming?page={page}"))
            .await
    }

    async fn fetch_by_genre(
        &self,
        genre_id: i32,
        page: u32,
    ) -> Result<MoviesResponse, ClientError> {
        self.get_json(&format!("/api/movies/genre/{genre_id}?page={page}"))
            .await
    }

    async fn search_movies(&self, query: &str, page: u32) -> Result<MoviesResponse, ClientError> {
        self.get_json(&format!(
            "/api/movies/search?query={}&page={page}",
            urlencoding::encode(query)
        ))
        .await
    }

    async fn fetch_movie_detail(&self, id: i32) -> Result<MovieDetail, ClientError> {
        self.get_json(&format!("/api/movies/{id}")).await
    }

    async fn fetch_genres(&self) -> Result<GenreList, ClientError> {
        self.get_json("/api/genres").await
    }
}
