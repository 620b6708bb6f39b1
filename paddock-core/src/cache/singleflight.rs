//! Singleflight for cache stampede protection
//!
//! Deduplicates concurrent fetches of the same key: the first caller starts
//! the work as a detached tokio task, later callers attach to the same
//! shared future and observe the same result.
//!
//! The work is not tied to any caller. Dropping every waiter leaves the task
//! running, so its result still reaches the cache through [`SingleFlight::settle`].
//!
//! # Example
//! ```
//! use paddock_core::cache::SingleFlight;
//!
//! # async fn example() {
//! let sf = SingleFlight::<String, String, String>::new();
//! let key = "org:stable-a".to_string();
//! let (flight, _started) = sf.join_or_start(&key, {
//!     let sf = sf.clone();
//!     let key = key.clone();
//!     move |id| async move {
//!         sf.settle(&key, id, || ());
//!         Ok("subscription".to_string())
//!     }
//! });
//! let result = flight.await;
//! # }
//! ```

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

/// Error type for SingleFlight operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SingleFlightError<E> {
    /// The worker task panicked or was cancelled
    #[error("SingleFlight worker failed - task panicked or was aborted")]
    WorkerFailed,
    /// The underlying operation failed
    #[error("{0}")]
    Inner(E),
}

/// Identifies one started flight, so a late completion can tell whether it
/// is still the registered flight for its key.
pub type FlightId = u64;

pub type SharedFlight<V, E> = Shared<BoxFuture<'static, Result<V, SingleFlightError<E>>>>;

struct Flight<V, E> {
    id: FlightId,
    future: SharedFlight<V, E>,
}

type FlightMap<K, V, E> = Arc<Mutex<HashMap<K, Flight<V, E>>>>;

/// SingleFlight prevents duplicate concurrent function executions.
///
/// When multiple tasks attempt to execute the same operation (by key)
/// simultaneously, only one execution proceeds while others wait for the result.
pub struct SingleFlight<K, V, E> {
    flights: FlightMap<K, V, E>,
    next_id: Arc<AtomicU64>,
}

impl<K, V, E> Clone for SingleFlight<K, V, E> {
    fn clone(&self) -> Self {
        Self {
            flights: Arc::clone(&self.flights),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

impl<K, V, E> SingleFlight<K, V, E>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Create a new SingleFlight instance
    #[must_use]
    pub fn new() -> Self {
        Self {
            flights: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Attach to the flight registered for `key`, or spawn `start(id)` as a new one.
    ///
    /// Returns the shared result future and whether this call started the flight.
    /// The flight stays registered until [`settle`](Self::settle) or
    /// [`forget`](Self::forget) removes it.
    pub fn join_or_start<F, Fut>(&self, key: &K, start: F) -> (SharedFlight<V, E>, bool)
    where
        F: FnOnce(FlightId) -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let mut flights = self.flights.lock();
        if let Some(flight) = flights.get(key) {
            return (flight.future.clone(), false);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = tokio::spawn(start(id));

        let registry = Arc::clone(&self.flights);
        let flight_key = key.clone();
        let future = async move {
            match handle.await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => Err(SingleFlightError::Inner(err)),
                Err(join_err) => {
                    tracing::error!(key = ?flight_key, error = %join_err, "SingleFlight worker failed");
                    // A dead worker never settles; unregister it so the key can be retried.
                    let mut flights = registry.lock();
                    if flights.get(&flight_key).is_some_and(|f| f.id == id) {
                        flights.remove(&flight_key);
                    }
                    Err(SingleFlightError::WorkerFailed)
                }
            }
        }
        .boxed()
        .shared();

        flights.insert(
            key.clone(),
            Flight {
                id,
                future: future.clone(),
            },
        );
        (future, true)
    }

    /// Complete flight `id` for `key`.
    ///
    /// If `id` is still the registered flight, it is unregistered and `apply`
    /// runs while the registry lock is held, so it cannot interleave with
    /// [`forget`](Self::forget) or [`forget_all_with`](Self::forget_all_with).
    /// Returns `None` when the flight was forgotten in the meantime.
    pub fn settle<R>(&self, key: &K, id: FlightId, apply: impl FnOnce() -> R) -> Option<R> {
        let mut flights = self.flights.lock();
        match flights.get(key) {
            Some(flight) if flight.id == id => {
                flights.remove(key);
                Some(apply())
            }
            _ => None,
        }
    }

    /// Detach the flight for `key`. Its task keeps running but can no longer settle.
    pub fn forget(&self, key: &K) -> bool {
        self.flights.lock().remove(key).is_some()
    }

    /// Detach every flight, running `f` under the registry lock
    pub fn forget_all_with<R>(&self, f: impl FnOnce() -> R) -> R {
        let mut flights = self.flights.lock();
        flights.clear();
        f()
    }

    /// Number of flights currently registered
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.flights.lock().len()
    }
}

impl<K, V, E> Default for SingleFlight<K, V, E>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
