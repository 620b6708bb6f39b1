//! TTL-bounded, single-flight cache for remote entitlement documents.
//!
//! Lifecycle of one key: `Empty -> Fetching -> Fresh -> Stale -> Fetching -> ...`.
//! Invalidation sends any state straight back to `Empty`.
//!
//! - Concurrent `get`s for a key share one fetch and one result.
//! - A failed refresh keeps the stale entry; it is served until the
//!   failure backoff passes, then the next `get` fetches again.
//! - A fetch that resolves after its key was invalidated is discarded and its
//!   waiters see [`FetchError::Superseded`].
//! - Fetches run as detached tasks, so abandoning a `get` does not cancel them.

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{self, Either};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::entry::{CacheEntry, LoadStatus, Resolved};
use super::singleflight::{FlightId, SingleFlight, SingleFlightError};
use crate::error::FetchError;
use crate::metrics;

/// Per-cache tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub ttl: Duration,
    pub failure_backoff: Duration,
    pub max_capacity: u64,
}

impl CachePolicy {
    /// Default entry TTL (5 minutes)
    pub const DEFAULT_TTL: Duration = Duration::from_secs(300);
    /// Default delay before retrying a failed refresh of a stale entry
    pub const DEFAULT_FAILURE_BACKOFF: Duration = Duration::from_secs(30);
    /// Default capacity (max entries)
    pub const DEFAULT_CAPACITY: u64 = 1_000;
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            ttl: Self::DEFAULT_TTL,
            failure_backoff: Self::DEFAULT_FAILURE_BACKOFF,
            max_capacity: Self::DEFAULT_CAPACITY,
        }
    }
}

/// Keyed cache of immutable [`CacheEntry`] values with single-flight refresh
pub struct EntitlementCache<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for EntitlementCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<K, V> {
    name: &'static str,
    policy: CachePolicy,
    entries: moka::sync::Cache<K, Arc<CacheEntry<V>>>,
    flights: SingleFlight<K, Arc<CacheEntry<V>>, FetchError>,
    retry_after: Mutex<HashMap<K, Instant>>,
    /// Bumped by `invalidate_all`; entries stamped with an older value are dead.
    generation: AtomicU64,
    status: watch::Sender<LoadStatus>,
}

impl<K, V> EntitlementCache<K, V>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    #[must_use]
    pub fn new(name: &'static str, policy: CachePolicy) -> Self {
        let (status, _) = watch::channel(LoadStatus::Idle);
        Self {
            inner: Arc::new(Inner {
                name,
                policy,
                entries: moka::sync::Cache::new(policy.max_capacity),
                flights: SingleFlight::new(),
                retry_after: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
                status,
            }),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    #[must_use]
    pub fn policy(&self) -> CachePolicy {
        self.inner.policy
    }

    /// Current entry for `key`, fresh or stale, without fetching
    #[must_use]
    pub fn peek(&self, key: &K) -> Option<Resolved<V>> {
        self.inner
            .live_entry(key)
            .map(|entry| Resolved::from_entry(&entry, None))
    }

    /// Return the cached value for `key` if fresh, otherwise fetch it.
    ///
    /// The lookup and the flight start happen when `get` is called, not when
    /// the returned future is first polled, so an `invalidate_all` that runs
    /// after this call always detaches the flight.
    ///
    /// `fetch` only runs when this call starts a new flight; callers that
    /// attach to an in-flight fetch drop theirs. When the fetch fails and a
    /// stale entry exists, the stale value is returned with `refresh_error` set.
    pub fn get<F, Fut>(
        &self,
        key: K,
        fetch: F,
    ) -> impl Future<Output = Result<Resolved<V>, FetchError>> + Send + 'static
    where
        F: FnOnce(K) -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, FetchError>> + Send + 'static,
    {
        let name = self.inner.name;
        let now = Instant::now();

        if let Some(entry) = self.inner.live_entry(&key) {
            if entry.is_fresh_at(now) {
                metrics::cache::record_lookup(name, "fresh");
                debug!(cache = name, key = ?key, "Entitlement cache hit");
                return Either::Left(future::ready(Ok(Resolved::from_entry(&entry, None))));
            }
            if self.inner.in_backoff(&key, now) {
                metrics::cache::record_lookup(name, "backoff");
                debug!(cache = name, key = ?key, "Serving stale entry during failure backoff");
                return Either::Left(future::ready(Ok(Resolved::from_entry(&entry, None))));
            }
            metrics::cache::record_lookup(name, "stale");
        } else {
            metrics::cache::record_lookup(name, "miss");
        }

        let task_inner = Arc::clone(&self.inner);
        let task_key = key.clone();
        let (flight, started) = self.inner.flights.join_or_start(&key, move |id| {
            task_inner.status.send_replace(LoadStatus::Loading);
            Inner::fetch_task(task_inner, task_key, id, fetch)
        });
        if !started {
            debug!(cache = name, key = ?key, "Attached to in-flight entitlement fetch");
        }

        let inner = Arc::clone(&self.inner);
        Either::Right(async move {
            match flight.await {
                Ok(entry) => Ok(Resolved::from_entry(&entry, None)),
                Err(err) => {
                    let err = match err {
                        SingleFlightError::Inner(e) => e,
                        SingleFlightError::WorkerFailed => FetchError::Abandoned,
                    };
                    match inner.live_entry(&key) {
                        Some(entry) => {
                            let refresh_error = (err != FetchError::Superseded).then_some(err);
                            Ok(Resolved::from_entry(&entry, refresh_error))
                        }
                        None => Err(err),
                    }
                }
            }
        })
    }

    /// Drop the entry and any in-flight fetch for `key`
    pub fn invalidate(&self, key: &K) {
        self.inner.flights.forget(key);
        self.inner.entries.invalidate(key);
        self.inner.retry_after.lock().remove(key);
        debug!(cache = self.inner.name, key = ?key, "Entitlement cache entry invalidated");
    }

    /// Drop every entry and detach every in-flight fetch.
    ///
    /// Returns once no later `get` can observe data fetched before the call.
    pub fn invalidate_all(&self) {
        self.inner.flights.forget_all_with(|| {
            self.inner.generation.fetch_add(1, Ordering::AcqRel);
            self.inner.retry_after.lock().clear();
            self.inner.status.send_replace(LoadStatus::Idle);
            self.inner.entries.invalidate_all();
        });
        debug!(cache = self.inner.name, "Entitlement cache cleared");
    }

    /// Outcome of the most recent fetch since the last `invalidate_all`
    #[must_use]
    pub fn status(&self) -> LoadStatus {
        self.inner.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LoadStatus> {
        self.inner.status.subscribe()
    }

    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.flights.in_flight()
    }
}

impl<K, V> Inner<K, V>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn live_entry(&self, key: &K) -> Option<Arc<CacheEntry<V>>> {
        let generation = self.generation.load(Ordering::Acquire);
        self.entries
            .get(key)
            .filter(|entry| entry.generation() == generation)
    }

    fn in_backoff(&self, key: &K, now: Instant) -> bool {
        self.retry_after
            .lock()
            .get(key)
            .is_some_and(|until| now < *until)
    }

    async fn fetch_task<F, Fut>(
        self: Arc<Self>,
        key: K,
        id: FlightId,
        fetch: F,
    ) -> Result<Arc<CacheEntry<V>>, FetchError>
    where
        F: FnOnce(K) -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, FetchError>> + Send + 'static,
    {
        let started = Instant::now();
        let outcome = fetch(key.clone()).await;
        metrics::cache::observe_fetch_duration(self.name, started.elapsed());

        match outcome {
            Ok(value) => {
                let stored = self.flights.settle(&key, id, || {
                    let generation = self.generation.load(Ordering::Acquire);
                    let entry = Arc::new(CacheEntry::new(value, self.policy.ttl, generation));
                    self.entries.insert(key.clone(), Arc::clone(&entry));
                    self.retry_after.lock().remove(&key);
                    self.status.send_replace(LoadStatus::Loaded {
                        fetched_at: chrono::Utc::now(),
                    });
                    entry
                });
                match stored {
                    Some(entry) => {
                        metrics::cache::record_fetch(self.name, "success");
                        debug!(cache = self.name, key = ?key, "Entitlement document fetched");
                        Ok(entry)
                    }
                    None => {
                        metrics::cache::record_fetch(self.name, "superseded");
                        debug!(cache = self.name, key = ?key, "Discarding fetch result after invalidation");
                        Err(FetchError::Superseded)
                    }
                }
            }
            Err(error) => {
                let settled = self.flights.settle(&key, id, || {
                    let has_stale_value = self.live_entry(&key).is_some();
                    if has_stale_value {
                        self.retry_after
                            .lock()
                            .insert(key.clone(), Instant::now() + self.policy.failure_backoff);
                    }
                    self.status.send_replace(LoadStatus::Failed {
                        error: error.clone(),
                        has_stale_value,
                    });
                    has_stale_value
                });
                match settled {
                    Some(has_stale_value) => {
                        metrics::cache::record_fetch(self.name, "failure");
                        warn!(
                            cache = self.name,
                            key = ?key,
                            error = %error,
                            error_kind = error.kind(),
                            has_stale_value,
                            "Entitlement fetch failed"
                        );
                        Err(error)
                    }
                    None => {
                        metrics::cache::record_fetch(self.name, "superseded");
                        Err(FetchError::Superseded)
                    }
                }
            }
        }
    }
}

impl<K, V> std::fmt::Debug for EntitlementCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntitlementCache")
            .field("name", &self.inner.name)
            .field("policy", &self.inner.policy)
            .finish()
    }
}
