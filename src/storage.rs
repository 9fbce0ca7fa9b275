//! Named-blob persistence
//!
//! Small string values stored under a key, in the spirit of a device
//! key/value store. The file-backed store keeps one JSON file per key in the
//! platform data directory.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    /// Failed to determine the data directory location
    #[error("Failed to determine data directory location")]
    DataDirectoryNotFound,

    #[error("Failed to create data directory at {path}: {source}")]
    DirectoryCreationFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize data: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Returns `None` when nothing has been stored under `key` yet.
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Opens the store in the platform data directory for this application.
    pub fn open_default() -> Result<Self, StorageError> {
        Self::open(default_dir()?)
    }

    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| StorageError::DirectoryCreationFailed {
            path: dir.clone(),
            source: e,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_key(key)))
    }
}

#[async_trait]
impl BlobStore for FileStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::ReadFailed { path, source: e }),
        }
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        // Written next to the target, then renamed over it.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value)
            .await
            .map_err(|e| StorageError::WriteFailed {
                path: tmp.clone(),
                source: e,
            })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| StorageError::WriteFailed { path, source: e })
    }
}

#[derive(Default)]
pub struct MemoryStore {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self
            .items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Platform data directory for this application, e.g.
/// `~/.local/share/cinevault` on Linux.
pub fn default_dir() -> Result<PathBuf, StorageError> {
    let proj_dirs = directories::ProjectDirs::from("app", "cinevault", "cinevault")
        .ok_or(StorageError::DataDirectoryNotFound)?;
    Ok(proj_dirs.data_dir().to_path_buf())
}

/// Lowercases and replaces anything outside a-z, 0-9, `-` and `_` with `_`.
fn sanitize_key(key: &str) -> String {
    key.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
