//! Request coordination for remote lookups.
//!
//! A [`RequestCoordinator`] sits in front of one kind of lookup (providers,
//! services) and gives repeated, concurrent callers:
//!
//! - a TTL cache, including cached "not found" results;
//! - in-flight de-duplication, so concurrent callers for one key share a
//!   single store call;
//! - bounded retry with exponential backoff;
//! - per-caller cancellation and a lookup deadline.
//!
//! The shared operation writes the cache and clears its in-flight entry when
//! it settles. If every caller abandons it (cancelled or timed out) it is
//! dropped unfinished and never touches the cache.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::db::StoreError;
use crate::errors::AppError;
use crate::services::retry::{retry_with_backoff, RetryPolicy};

/// Cooperative cancellation signal shared between a caller and its lookups.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn wait_for_cancel(token: Option<&CancelToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub ttl: Duration,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total: usize,
    pub valid: usize,
    pub expired: usize,
}

impl std::ops::Add for CacheStats {
    type Output = CacheStats;

    fn add(self, other: CacheStats) -> CacheStats {
        CacheStats {
            total: self.total + other.total,
            valid: self.valid + other.valid,
            expired: self.expired + other.expired,
        }
    }
}

type Loaded<T> = Result<Option<T>, AppError>;
type SharedFetch<T> = Shared<BoxFuture<'static, Loaded<T>>>;

struct CacheEntry<T> {
    value: Option<T>,
    fetched_at: Instant,
}

struct InFlight<T> {
    id: u64,
    fetch: SharedFetch<T>,
    waiters: usize,
}

struct Inner<T> {
    name: &'static str,
    settings: CoordinatorSettings,
    cache: Mutex<HashMap<String, CacheEntry<T>>>,
    inflight: Mutex<HashMap<String, InFlight<T>>>,
    next_id: AtomicU64,
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl<T> Inner<T> {
    fn remove_inflight_if(&self, key: &str, id: u64, abandon: bool) {
        let removed = {
            let mut inflight = lock(&self.inflight);
            let settled = match inflight.get_mut(key) {
                Some(entry) if entry.id == id => {
                    if abandon {
                        entry.waiters = entry.waiters.saturating_sub(1);
                    }
                    !abandon || entry.waiters == 0
                }
                _ => false,
            };
            if settled {
                inflight.remove(key)
            } else {
                None
            }
        };
        // Dropped outside the lock: this may be the last handle to the fetch.
        drop(removed);
    }
}

/// Clears the in-flight entry when the shared fetch finishes or is dropped.
struct FetchGuard<T> {
    inner: Arc<Inner<T>>,
    key: String,
    id: u64,
}

impl<T> Drop for FetchGuard<T> {
    fn drop(&mut self) {
        self.inner.remove_inflight_if(&self.key, self.id, false);
    }
}

/// Releases one caller's interest in a fetch, however the caller exits.
struct WaiterGuard<T> {
    inner: Arc<Inner<T>>,
    key: String,
    id: u64,
}

impl<T> Drop for WaiterGuard<T> {
    fn drop(&mut self) {
        self.inner.remove_inflight_if(&self.key, self.id, true);
    }
}

pub struct RequestCoordinator<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for RequestCoordinator<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> RequestCoordinator<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str, settings: CoordinatorSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                name,
                settings,
                cache: Mutex::new(HashMap::new()),
                inflight: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Looks `key` up through the cache, an in-flight fetch, or `loader`.
    ///
    /// `Ok(None)` means the store has no such entity; that answer is cached
    /// like any other.
    pub async fn fetch<F, Fut>(&self, key: &str, token: Option<&CancelToken>, loader: F) -> Loaded<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<T>, StoreError>> + Send + 'static,
    {
        if token.is_some_and(CancelToken::is_cancelled) {
            return Err(AppError::Cancelled);
        }
        if let Some(hit) = self.cached(key) {
            return Ok(hit);
        }

        let (id, fetch) = self.join_or_start(key, loader);
        let _waiter = WaiterGuard {
            inner: Arc::clone(&self.inner),
            key: key.to_string(),
            id,
        };

        let timeout = self.inner.settings.timeout;
        let outcome = tokio::select! {
            result = fetch => result,
            _ = wait_for_cancel(token) => Err(AppError::Cancelled),
            _ = tokio::time::sleep(timeout) => Err(AppError::Timeout(timeout.as_millis() as u64)),
        };

        match &outcome {
            Err(AppError::Cancelled) => {
                tracing::debug!(coordinator = self.inner.name, key, "lookup cancelled");
            }
            Err(e) => {
                tracing::warn!(coordinator = self.inner.name, key, error = %e, "lookup failed");
            }
            Ok(_) => {}
        }
        outcome
    }

    fn cached(&self, key: &str) -> Option<Option<T>> {
        let ttl = self.inner.settings.ttl;
        let mut cache = lock(&self.inner.cache);
        let lookup = cache
            .get(key)
            .map(|entry| (entry.fetched_at.elapsed() < ttl, entry.value.clone()));
        match lookup {
            Some((true, value)) => Some(value),
            Some((false, _)) => {
                cache.remove(key);
                None
            }
            None => None,
        }
    }

    fn join_or_start<F, Fut>(&self, key: &str, loader: F) -> (u64, SharedFetch<T>)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<T>, StoreError>> + Send + 'static,
    {
        let mut inflight = lock(&self.inner.inflight);
        if let Some(entry) = inflight.get_mut(key) {
            entry.waiters += 1;
            tracing::debug!(coordinator = self.inner.name, key, "joining in-flight lookup");
            return (entry.id, entry.fetch.clone());
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::clone(&self.inner);
        let owned_key = key.to_string();
        let fetch = async move {
            let _guard = FetchGuard {
                inner: Arc::clone(&inner),
                key: owned_key.clone(),
                id,
            };
            let result = retry_with_backoff(&inner.settings.retry, || {
                let attempt = loader();
                async move { attempt.await.map_err(AppError::from) }
            })
            .await;
            if let Ok(value) = &result {
                lock(&inner.cache).insert(
                    owned_key,
                    CacheEntry {
                        value: value.clone(),
                        fetched_at: Instant::now(),
                    },
                );
            }
            result
        }
        .boxed()
        .shared();

        inflight.insert(
            key.to_string(),
            InFlight {
                id,
                fetch: fetch.clone(),
                waiters: 1,
            },
        );
        (id, fetch)
    }

    /// Drops one cached key, or everything when `key` is `None`.
    pub fn clear(&self, key: Option<&str>) {
        let mut cache = lock(&self.inner.cache);
        match key {
            Some(key) => {
                cache.remove(key);
            }
            None => cache.clear(),
        }
    }

    pub fn stats(&self) -> CacheStats {
        let cache = lock(&self.inner.cache);
        let ttl = self.inner.settings.ttl;
        let valid = cache
            .values()
            .filter(|entry| entry.fetched_at.elapsed() < ttl)
            .count();
        CacheStats {
            total: cache.len(),
            valid,
            expired: cache.len() - valid,
        }
    }

    pub fn in_flight(&self) -> usize {
        lock(&self.inner.inflight).len()
    }
}
