use super::{QueryKey, QueryOptions, QueryState, IDLE_EVICTION};
use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

type Payload = Arc<dyn Any + Send + Sync>;
type Pending = Shared<BoxFuture<'static, ()>>;
type Entries = HashMap<QueryKey, Entry>;

struct Entry {
    data: Option<Payload>,
    error: Option<String>,
    data_updated_at: Option<DateTime<Utc>>,
    fetched_at: Option<Instant>,
    /// Latest sequence number issued when the key was invalidated. Only a
    /// fetch issued after that point clears it.
    invalidated_at: Option<u64>,
    refetch_interval: Option<Duration>,
    /// Sequence number of the most recently issued fetch.
    latest_seq: u64,
    in_flight: Option<(u64, Pending)>,
    last_used: Instant,
    watchers: usize,
}

impl Entry {
    fn new(now: Instant) -> Self {
        Self {
            data: None,
            error: None,
            data_updated_at: None,
            fetched_at: None,
            invalidated_at: None,
            refetch_interval: None,
            latest_seq: 0,
            in_flight: None,
            last_used: now,
            watchers: 0,
        }
    }

    fn needs_fetch(&self, now: Instant) -> bool {
        if self.data.is_none() || self.invalidated_at.is_some() || self.error.is_some() {
            return true;
        }
        match (self.refetch_interval, self.fetched_at) {
            (Some(interval), Some(at)) => now.duration_since(at) >= interval,
            _ => false,
        }
    }

    /// Whether a read should start a fetch instead of joining the running one.
    fn should_start(&self, now: Instant) -> bool {
        match &self.in_flight {
            Some((running, _)) => self.invalidated_at.is_some_and(|mark| *running <= mark),
            None => self.needs_fetch(now),
        }
    }

    fn is_idle(&self, now: Instant, idle_timeout: Duration) -> bool {
        self.in_flight.is_none()
            && self.watchers == 0
            && now.duration_since(self.last_used) >= idle_timeout
    }

    fn snapshot<T: Send + Sync + 'static>(&self, key: &QueryKey) -> QueryState<T> {
        let data = self.data.clone().and_then(|payload| match payload.downcast::<T>() {
            Ok(data) => Some(data),
            Err(_) => {
                warn!(key = %key, "Cached data has a different type than requested");
                None
            }
        });
        let fetching = self.in_flight.is_some();
        QueryState {
            is_loading: fetching && self.data.is_none(),
            is_refetching: fetching && self.data.is_some(),
            is_error: self.error.is_some(),
            error: self.error.clone(),
            data_updated_at: self.data_updated_at,
            data,
        }
    }
}

/// Shared cache of query results. Clones refer to the same entries.
///
/// Entries that nobody has read or watched for the idle timeout are dropped
/// the next time a fetch starts.
#[derive(Clone)]
pub struct QueryCache {
    entries: Arc<Mutex<Entries>>,
    next_seq: Arc<AtomicU64>,
    idle_timeout: Duration,
}

/// Keeps a key's background refetch loop alive; dropping it stops the loop.
pub struct RefetchHandle {
    key: QueryKey,
    cache: QueryCache,
    task: JoinHandle<()>,
}

impl RefetchHandle {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }
}

impl Drop for RefetchHandle {
    fn drop(&mut self) {
        self.task.abort();
        if let Some(entry) = self.cache.lock().get_mut(&self.key) {
            entry.watchers = entry.watchers.saturating_sub(1);
            entry.last_used = Instant::now();
        }
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::with_idle_timeout(IDLE_EVICTION)
    }
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            entries: Arc::default(),
            next_seq: Arc::default(),
            idle_timeout,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns the cached result for `key`, fetching first when there is
    /// nothing usable. A fetch already running for `key` is joined rather
    /// than duplicated, unless the key was invalidated after it started.
    pub async fn fetch<T, F, Fut>(
        &self,
        key: QueryKey,
        options: QueryOptions,
        fetcher: F,
    ) -> QueryState<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        self.begin(&key, options, false, fetcher);
        self.settled(&key).await
    }

    /// Issues a new fetch for `key` even if one is running. Results of
    /// earlier fetches for the key are discarded when they arrive.
    pub async fn refetch<T, F, Fut>(&self, key: QueryKey, fetcher: F) -> QueryState<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        self.begin(&key, QueryOptions::default(), true, fetcher);
        self.settled(&key).await
    }

    /// Current state of `key` without fetching. Counts as a use of the key.
    pub fn state<T: Send + Sync + 'static>(&self, key: &QueryKey) -> QueryState<T> {
        match self.lock().get_mut(key) {
            Some(entry) => {
                entry.last_used = Instant::now();
                entry.snapshot(key)
            }
            None => QueryState::idle(),
        }
    }

    /// Marks `key` so the next read refetches it, even while a fetch that
    /// started earlier is still running. Returns whether the key was cached.
    pub fn invalidate(&self, key: &QueryKey) -> bool {
        match self.lock().get_mut(key) {
            Some(entry) => {
                debug!(key = %key, seq = entry.latest_seq, "Invalidated");
                entry.invalidated_at = Some(entry.latest_seq);
                true
            }
            None => false,
        }
    }

    /// Invalidates every cached key matching `predicate`, returning how many.
    pub fn invalidate_where(&self, predicate: impl Fn(&QueryKey) -> bool) -> usize {
        let mut entries = self.lock();
        let mut count = 0;
        for (key, entry) in entries.iter_mut().filter(|(k, _)| predicate(k)) {
            debug!(key = %key, seq = entry.latest_seq, "Invalidated");
            entry.invalidated_at = Some(entry.latest_seq);
            count += 1;
        }
        count
    }

    /// Drops `key` entirely. A fetch still running for it is ignored when it
    /// completes.
    pub fn remove(&self, key: &QueryKey) {
        self.lock().remove(key);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Drops entries with no running fetch and no watcher that have not been
    /// used for the idle timeout. Returns how many were dropped.
    pub fn evict_idle(&self) -> usize {
        let mut entries = self.lock();
        self.evict_idle_locked(&mut entries, Instant::now())
    }

    fn evict_idle_locked(&self, entries: &mut Entries, now: Instant) -> usize {
        let before = entries.len();
        entries.retain(|key, entry| {
            let idle = entry.is_idle(now, self.idle_timeout);
            if idle {
                debug!(key = %key, "Evicting idle entry");
            }
            !idle
        });
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Refetches `key` in the background every `options.refetch_interval`
    /// for as long as the returned handle lives. A watched key is never
    /// evicted. Returns `None` when no interval is configured.
    pub fn watch<T, F, Fut>(
        &self,
        key: QueryKey,
        options: QueryOptions,
        fetcher: F,
    ) -> Option<RefetchHandle>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let interval = options.refetch_interval?;
        {
            let now = Instant::now();
            let mut entries = self.lock();
            let entry = entries
                .entry(key.clone())
                .or_insert_with(|| Entry::new(now));
            entry.watchers += 1;
            entry.refetch_interval = Some(interval);
        }

        let cache = self.clone();
        let loop_key = key.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                debug!(key = %loop_key, "Background refetch");
                let state = cache.fetch(loop_key.clone(), options, &fetcher).await;
                if state.is_error {
                    warn!(key = %loop_key, "Background refetch failed, keeping last data");
                }
            }
        });
        Some(RefetchHandle {
            key,
            cache: self.clone(),
            task,
        })
    }

    /// Registers a new fetch for `key` when one is needed, then builds and
    /// spawns it once the entries lock is released.
    fn begin<T, F, Fut>(&self, key: &QueryKey, options: QueryOptions, force: bool, fetcher: F)
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let now = Instant::now();
        let (seq, task_tx) = {
            let mut entries = self.lock();
            self.evict_idle_locked(&mut entries, now);
            let entry = entries
                .entry(key.clone())
                .or_insert_with(|| Entry::new(now));
            entry.last_used = now;
            if options.refetch_interval.is_some() {
                entry.refetch_interval = options.refetch_interval;
            }
            if !force && !entry.should_start(now) {
                return;
            }

            let seq = self.next_seq.fetch_add(1, Ordering::Relaxed) + 1;
            entry.latest_seq = seq;

            // Waiters follow the spawned task once it exists.
            let (task_tx, task_rx) = oneshot::channel::<JoinHandle<()>>();
            let cache = self.clone();
            let task_key = key.clone();
            let pending = async move {
                let failure = match task_rx.await {
                    Ok(task) => task.await.err().map(|e| format!("fetch task failed: {}", e)),
                    Err(_) => Some("fetch was dropped before it started".to_string()),
                };
                if let Some(message) = failure {
                    cache.settle(&task_key, seq, Err(message));
                }
            }
            .boxed()
            .shared();
            entry.in_flight = Some((seq, pending));
            (seq, task_tx)
        };
        debug!(key = %key, seq, "Fetching");

        let future = fetcher();
        let cache = self.clone();
        let task_key = key.clone();
        let task = tokio::spawn(async move {
            let outcome = future
                .await
                .map(|data| Arc::new(data) as Payload)
                .map_err(|e| format!("{:#}", e));
            cache.settle(&task_key, seq, outcome);
        });
        // Nobody is waiting any more when this fails; the task still settles.
        let _ = task_tx.send(task);
    }

    fn settle(&self, key: &QueryKey, seq: u64, outcome: Result<Payload, String>) {
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(key) else {
            debug!(key = %key, seq, "Key removed before its fetch completed");
            return;
        };
        if entry.latest_seq != seq {
            debug!(
                key = %key,
                seq,
                latest = entry.latest_seq,
                "Discarding result of a superseded fetch"
            );
            return;
        }
        entry.in_flight = None;
        entry.last_used = Instant::now();
        if entry.invalidated_at.is_some_and(|mark| seq > mark) {
            entry.invalidated_at = None;
        }
        match outcome {
            Ok(data) => {
                entry.data = Some(data);
                entry.error = None;
                entry.fetched_at = Some(Instant::now());
                entry.data_updated_at = Some(Utc::now());
            }
            Err(message) => {
                warn!(key = %key, "Query failed: {}", message);
                entry.error = Some(message);
            }
        }
    }

    /// Waits until no fetch is running for `key`, following any newer fetch
    /// that supersedes the one being waited on.
    async fn settled<T: Send + Sync + 'static>(&self, key: &QueryKey) -> QueryState<T> {
        loop {
            let pending = {
                let entries = self.lock();
                let Some(entry) = entries.get(key) else {
                    return QueryState::idle();
                };
                match &entry.in_flight {
                    Some((_, pending)) => pending.clone(),
                    None => return entry.snapshot(key),
                }
            };
            pending.await;
        }
    }
}
