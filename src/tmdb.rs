use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::env;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const TMDB_BASE: &str = "https://api.themoviedb.org/3";
pub const DEFAULT_LANGUAGE: &str = "vi-VN";

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("TMDB_API_KEY not configured")]
    MissingApiKey,

    #[error("TMDb API error: {}", .status.as_u16())]
    Status { status: StatusCode, body: String },

    #[error("TMDb request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("TMDb returned invalid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Read-only operations the proxy forwards to the provider. Responses are
/// passed through untouched.
#[async_trait]
pub trait TmdbApi: Send + Sync {
    async fn trending(&self) -> Result<Value, ProviderError>;
    async fn now_playing(&self, page: &str) -> Result<Value, ProviderError>;
    async fn popular(&self, page: &str) -> Result<Value, ProviderError>;
    async fn top_rated(&self, page: &str) -> Result<Value, ProviderError>;
    async fn upcoming(&self, page: &str) -> Result<Value, ProviderError>;
    async fn by_genre(&self, genre_id: &str, page: &str) -> Result<Value, ProviderError>;
    async fn search(&self, query: &str, page: &str) -> Result<Value, ProviderError>;
    async fn movie_detail(&self, id: &str) -> Result<Value, ProviderError>;
    async fn genres(&self) -> Result<Value, ProviderError>;
}

#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    language: String,
}

impl TmdbClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        language: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .user_agent(format!("cinevault/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build TMDb HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            language: language.into(),
        })
    }

    /// A missing key is not an error here; every request reports it instead.
    pub fn from_env() -> Result<Self> {
        let base_url = env::var("TMDB_BASE_URL").unwrap_or_else(|_| TMDB_BASE.to_string());
        let language = env::var("TMDB_LANGUAGE").unwrap_or_else(|_| DEFAULT_LANGUAGE.to_string());
        Self::new(base_url, env::var("TMDB_API_KEY").ok(), language)
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    async fn get_json(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<Value, ProviderError> {
        let api_key = self.api_key.as_deref().ok_or(ProviderError::MissingApiKey)?;
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(endpoint = %endpoint, params = ?params, "Forwarding request to TMDb");

        let mut query: Vec<(&str, &str)> =
            vec![("api_key", api_key), ("language", self.language.as_str())];
        query.extend_from_slice(params);

        let res = self.client.get(&url).query(&query).send().await?;
        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            return Err(ProviderError::Status { status, body: text });
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl TmdbApi for TmdbClient {
    async fn trending(&self) -> Result<Value, ProviderError> {
        self.get_json("/trending/movie/day", &[]).await
    }

    async fn now_playing(&self, page: &str) -> Result<Value, ProviderError> {
        self.get_json("/movie/now_playing", &[("page", page)]).await
    }

    async fn popular(&self, page: &str) -> Result<Value, ProviderError> {
        self.get_json("/movie/popular", &[("page", page)]).await
    }

    async fn top_rated(&self, page: &str) -> Result<Value, ProviderError> {
        self.get_json("/movie/top_rated", &[("page", page)]).await
    }

    async fn upcoming(&self, page: &str) -> Result<Value, ProviderError> {
        self.get_json("/movie/upcoming", &[("page", page)]).await
    }

    async fn by_genre(&self, genre_id: &str, page: &str) -> Result<Value, ProviderError> {
        self.get_json(
            "/discover/movie",
            &[
                ("with_genres", genre_id),
                ("sort_by", "popularity.desc"),
                ("page", page),
            ],
        )
        .await
    }

    async fn search(&self, query: &str, page: &str) -> Result<Value, ProviderError> {
        self.get_json("/search/movie", &[("query", query), ("page", page)])
            .await
    }

    async fn movie_detail(&self, id: &str) -> Result<Value, ProviderError> {
        // One round trip for everything the detail screen shows.
        let endpoint = format!("/movie/{}", urlencoding::encode(id));
        self.get_json(&endpoint, &[("append_to_response", "credits,similar,videos")])
            .await
    }

    async fn genres(&self) -> Result<Value, ProviderError> {
        self.get_json("/genre/movie/list", &[]).await
    }
}
