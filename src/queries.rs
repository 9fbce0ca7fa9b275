//! Screen-level queries
//!
//! Binds each [`QueryKey`] family to the [`MovieApi`] call that fills it and
//! to the refresh interval the home feed uses for it.

use crate::client::MovieApi;
use crate::favorites::FavoritesStore;
use crate::models::{GenreList, Movie, MovieDetail, MoviesResponse};
use crate::query::{
    Category, QueryCache, QueryKey, QueryOptions, QueryState, RefetchHandle, FAST_REFRESH,
};
use std::sync::Arc;
use tracing::debug;

/// Search stays disabled below this many characters.
pub const MIN_SEARCH_LEN: usize = 2;

#[derive(Clone)]
pub struct Queries {
    cache: QueryCache,
    api: Arc<dyn MovieApi>,
    favorites: FavoritesStore,
}

impl Queries {
    pub fn new(cache: QueryCache, api: Arc<dyn MovieApi>, favorites: FavoritesStore) -> Self {
        Self {
            cache,
            api,
            favorites,
        }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn favorites_store(&self) -> &FavoritesStore {
        &self.favorites
    }

    pub async fn trending(&self) -> QueryState<MoviesResponse> {
        let api = self.api.clone();
        self.cache
            .fetch(
                QueryKey::Trending,
                QueryOptions::refetch_every(FAST_REFRESH),
                move || async move { Ok::<_, anyhow::Error>(api.fetch_trending().await?) },
            )
            .await
    }

    /// First page of `category`, as shown in its home feed row.
    pub async fn home_row(&self, category: Category) -> QueryState<MoviesResponse> {
        let api = self.api.clone();
        self.cache
            .fetch(
                QueryKey::HomeRow(category),
                QueryOptions::refetch_every(category.refresh_interval()),
                move || async move {
                    Ok::<_, anyhow::Error>(fetch_category(api.as_ref(), category, 1).await?)
                },
            )
            .await
    }

    pub async fn category(&self, category: Category, page: u32) -> QueryState<MoviesResponse> {
        let api = self.api.clone();
        self.cache
            .fetch(
                QueryKey::Category { category, page },
                QueryOptions::default(),
                move || async move {
                    Ok::<_, anyhow::Error>(fetch_category(api.as_ref(), category, page).await?)
                },
            )
            .await
    }

    pub async fn genre(&self, genre_id: i32, page: u32) -> QueryState<MoviesResponse> {
        let api = self.api.clone();
        self.cache
            .fetch(
                QueryKey::Genre { genre_id, page },
                QueryOptions::default(),
                move || async move {
                    Ok::<_, anyhow::Error>(api.fetch_by_genre(genre_id, page).await?)
                },
            )
            .await
    }

    /// Returns an idle state without touching the cache for queries shorter
    /// than [`MIN_SEARCH_LEN`].
    pub async fn search(&self, query: &str) -> QueryState<MoviesResponse> {
        if query.chars().count() < MIN_SEARCH_LEN {
            debug!(query, "Search disabled for short query");
            return QueryState::idle();
        }
        let api = self.api.clone();
        let term = query.to_string();
        self.cache
            .fetch(
                QueryKey::Search(query.to_string()),
                QueryOptions::default(),
                move || async move { Ok::<_, anyhow::Error>(api.search_movies(&term, 1).await?) },
            )
            .await
    }

    pub async fn movie(&self, id: i32) -> QueryState<MovieDetail> {
        let api = self.api.clone();
        self.cache
            .fetch(
                QueryKey::Movie(id),
                QueryOptions::default(),
                move || async move { Ok::<_, anyhow::Error>(api.fetch_movie_detail(id).await?) },
            )
            .await
    }

    pub async fn genres(&self) -> QueryState<GenreList> {
        let api = self.api.clone();
        self.cache
            .fetch(QueryKey::Genres, QueryOptions::default(), move || async move {
                Ok::<_, anyhow::Error>(api.fetch_genres().await?)
            })
            .await
    }

    /// Favorites as last read from storage. Call
    /// `cache().invalidate(&QueryKey::Favorites)` after changing them.
    pub async fn favorites(&self) -> QueryState<Vec<Movie>> {
        let store = self.favorites.clone();
        self.cache
            .fetch(QueryKey::Favorites, QueryOptions::default(), move || async move {
                Ok::<_, anyhow::Error>(store.list().await)
            })
            .await
    }

    /// Starts background refreshes for the trending row and every category
    /// row. They run until the handles are dropped.
    pub fn watch_home_feed(&self) -> Vec<RefetchHandle> {
        let mut handles = Vec::with_capacity(Category::ALL.len() + 1);

        let api = self.api.clone();
        handles.extend(self.cache.watch(
            QueryKey::Trending,
            QueryOptions::refetch_every(FAST_REFRESH),
            move || {
                let api = api.clone();
                async move { Ok::<_, anyhow::Error>(api.fetch_trending().await?) }
            },
        ));

        for category in Category::ALL {
            let api = self.api.clone();
            handles.extend(self.cache.watch(
                QueryKey::HomeRow(category),
                QueryOptions::refetch_every(category.refresh_interval()),
                move || {
                    let api = api.clone();
                    async move {
                        Ok::<_, anyhow::Error>(fetch_category(api.as_ref(), category, 1).await?)
                    }
                },
            ));
        }
        handles
    }

    /// Pull-to-refresh on the home screen.
    pub fn invalidate_home_feed(&self) -> usize {
        self.cache.invalidate_where(QueryKey::is_home_feed)
    }
}

async fn fetch_category(
    api: &dyn MovieApi,
    category: Category,
    page: u32,
) -> Result<MoviesResponse, crate::client::ClientError> {
    match category {
        Category::NowPlaying => api.fetch_now_playing(page).await,
        Category::Popular => api.fetch_popular(page).await,
        Category::TopRated => api.fetch_top_rated(page).await,
        Category::Upcoming => api.fetch_upcoming(page).await,
    }
}
