//! Favorites store
//!
//! A persisted list of movie snapshots, most recently added first, with no
//! duplicate ids. Mutations are written to the blob store before they
//! return, but nothing here touches the query cache: callers invalidate
//! `QueryKey::Favorites` themselves after `add` or `remove`.

use crate::models::Movie;
use crate::storage::{BlobStore, StorageError};
use std::sync::Arc;
use tracing::{debug, warn};

pub const FAVORITES_KEY: &str = "cinevault_favorites";

#[derive(Clone)]
pub struct FavoritesStore {
    store: Arc<dyn BlobStore>,
}

impl FavoritesStore {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    /// A missing or unreadable blob reads as an empty list.
    pub async fn list(&self) -> Vec<Movie> {
        let raw = match self.store.get_item(FAVORITES_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!("Failed to read favorites, treating as empty: {}", e);
                return Vec::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(favorites) => favorites,
            Err(e) => {
                warn!("Favorites blob is corrupt, treating as empty: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn add(&self, movie: Movie) -> Result<Vec<Movie>, StorageError> {
        let favorites = self.list().await;
        if favorites.iter().any(|f| f.id == movie.id) {
            return Ok(favorites);
        }
        debug!(movie_id = movie.id, title = %movie.title, "Adding favorite");
        let mut updated = Vec::with_capacity(favorites.len() + 1);
        updated.push(movie);
        updated.extend(favorites);
        self.persist(&updated).await?;
        Ok(updated)
    }

    pub async fn remove(&self, movie_id: i32) -> Result<Vec<Movie>, StorageError> {
        let mut favorites = self.list().await;
        favorites.retain(|f| f.id != movie_id);
        debug!(movie_id, "Removing favorite");
        self.persist(&favorites).await?;
        Ok(favorites)
    }

    pub async fn contains(&self, movie_id: i32) -> bool {
        self.list().await.iter().any(|f| f.id == movie_id)
    }

    async fn persist(&self, favorites: &[Movie]) -> Result<(), StorageError> {
        let encoded = serde_json::to_string(favorites)?;
        self.store.set_item(FAVORITES_KEY, &encoded).await
    }
}
