//! In-memory query cache
//!
//! Results are cached per [`QueryKey`]. Concurrent reads of a key share one
//! in-flight fetch, failures keep the last good data, and keys configured
//! with a refresh interval can be refetched in the background.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

mod cache;
mod key;

pub use cache::{QueryCache, RefetchHandle};
pub use key::{Category, QueryKey};

pub const FAST_REFRESH: Duration = Duration::from_secs(5 * 60);
pub const SLOW_REFRESH: Duration = Duration::from_secs(10 * 60);
/// Unwatched entries unused for this long are dropped.
pub const IDLE_EVICTION: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub refetch_interval: Option<Duration>,
}

impl QueryOptions {
    pub fn refetch_every(interval: Duration) -> Self {
        Self {
            refetch_interval: Some(interval),
        }
    }
}

/// What a screen sees for one key.
///
/// `is_loading` is only set while the first fetch is pending; later fetches
/// set `is_refetching` and leave `data` in place.
#[derive(Debug)]
pub struct QueryState<T> {
    pub data: Option<Arc<T>>,
    pub error: Option<String>,
    pub is_loading: bool,
    pub is_refetching: bool,
    pub is_error: bool,
    pub data_updated_at: Option<DateTime<Utc>>,
}

impl<T> QueryState<T> {
    /// State of a key that has never been fetched, or a disabled query.
    pub fn idle() -> Self {
        Self {
            data: None,
            error: None,
            is_loading: false,
            is_refetching: false,
            is_error: false,
            data_updated_at: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.data.is_some() && !self.is_error
    }
}

impl<T> Clone for QueryState<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            error: self.error.clone(),
            is_loading: self.is_loading,
            is_refetching: self.is_refetching,
            is_error: self.is_error,
            data_updated_at: self.data_updated_at,
        }
    }
}
