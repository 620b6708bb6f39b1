use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::error::FetchError;

/// An immutable cached document.
///
/// Refreshing replaces the entry; nothing mutates it after construction.
#[derive(Debug)]
pub struct CacheEntry<T> {
    value: Arc<T>,
    fetched_at: Instant,
    ttl: Duration,
    generation: u64,
}

impl<T> CacheEntry<T> {
    pub(crate) fn new(value: T, ttl: Duration, generation: u64) -> Self {
        Self {
            value: Arc::new(value),
            fetched_at: Instant::now(),
            ttl,
            generation,
        }
    }

    #[must_use]
    pub const fn value(&self) -> &Arc<T> {
        &self.value
    }

    #[must_use]
    pub const fn fetched_at(&self) -> Instant {
        self.fetched_at
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    pub(crate) const fn generation(&self) -> u64 {
        self.generation
    }

    /// Fresh while `now - fetched_at <= ttl`
    #[must_use]
    pub fn is_fresh_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.fetched_at) <= self.ttl
    }

    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Instant::now())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale,
}

/// A value handed out by the cache.
///
/// `refresh_error` is set when a stale value is served because the refresh
/// attempt failed.
#[derive(Debug, Clone)]
pub struct Resolved<T> {
    pub value: Arc<T>,
    pub freshness: Freshness,
    pub fetched_at: Instant,
    pub refresh_error: Option<FetchError>,
}

impl<T> Resolved<T> {
    pub(crate) fn from_entry(entry: &CacheEntry<T>, refresh_error: Option<FetchError>) -> Self {
        let freshness = if entry.is_fresh() {
            Freshness::Fresh
        } else {
            Freshness::Stale
        };
        Self {
            value: entry.value.clone(),
            freshness,
            fetched_at: entry.fetched_at,
            refresh_error,
        }
    }

    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.freshness == Freshness::Stale
    }
}

/// Load state of a cache, observed by screens that offer a retry affordance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum LoadStatus {
    /// Nothing requested since creation or the last invalidation
    Idle,
    Loading,
    Loaded {
        fetched_at: chrono::DateTime<chrono::Utc>,
    },
    Failed {
        #[serde(serialize_with = "serialize_display")]
        error: FetchError,
        has_stale_value: bool,
    },
}

impl LoadStatus {
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

fn serialize_display<S: serde::Serializer>(
    error: &FetchError,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}
