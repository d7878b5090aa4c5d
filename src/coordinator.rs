//! Fetch coordination: cache lookup, in-flight deduplication, upstream fetch
//!
//! Every caller asking for the same `(location, units)` while a fetch is in
//! progress attaches to that fetch instead of starting another:
//!
//! ```text
//! scheduler tick ─┐
//!                 │                          upstream
//! refresh now    ─┼──► FetchCoordinator ───► provider ──► normalize ──► cache
//!                 │          │                                  │
//! detail view    ─┘          ▼                                  ▼
//!                     [all callers receive              state store
//!                      the same result] ◄───────────────────────┘
//! ```
//!
//! The upstream call runs in its own task, so a caller that stops waiting
//! does not strand the others, and a fetch dispatched before the scheduler
//! stops still lands in the cache and state store.

use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, CacheStore, SnapshotKey};
use crate::data::{normalize, Location, UnitSystem, WeatherProvider, WeatherSnapshot};
use crate::error::FetchError;
use crate::state::StateStore;

type FetchResult = Result<WeatherSnapshot, FetchError>;

const NO_RESULT: &str = "in-flight fetch ended without a result";

/// Counters for monitoring cache and coalescing effectiveness
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CoordinatorStats {
    /// Requests answered from a fresh cache entry
    pub cache_hits: u64,
    /// Requests that attached to a fetch already in flight
    pub coalesced_requests: u64,
    /// Calls made to the upstream provider
    pub upstream_calls: u64,
}

/// Returns weather snapshots, fetching upstream at most once per key at a time
#[derive(Clone)]
pub struct FetchCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    provider: Arc<dyn WeatherProvider>,
    cache: CacheStore,
    state: Arc<StateStore>,
    ttl: Duration,
    in_flight: Mutex<HashMap<SnapshotKey, broadcast::Sender<FetchResult>>>,
    cache_hits: AtomicU64,
    coalesced_requests: AtomicU64,
    upstream_calls: AtomicU64,
}

enum Registration {
    /// First caller for the key: must start the fetch
    Leader(broadcast::Receiver<FetchResult>),
    /// A fetch for the key is already running
    Attached(broadcast::Receiver<FetchResult>),
}

impl FetchCoordinator {
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        cache: CacheStore,
        state: Arc<StateStore>,
        ttl: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                provider,
                cache,
                state,
                ttl,
                in_flight: Mutex::new(HashMap::new()),
                cache_hits: AtomicU64::new(0),
                coalesced_requests: AtomicU64::new(0),
                upstream_calls: AtomicU64::new(0),
            }),
        }
    }

    /// Returns the snapshot for `location` in `units`
    ///
    /// A fresh cache entry is returned without a network round-trip.
    /// Otherwise the caller joins the in-flight fetch for the key, or starts
    /// one. Errors are not retried here; the next scheduler tick or a manual
    /// refresh does that.
    pub async fn fetch_snapshot(
        &self,
        location: &Location,
        units: UnitSystem,
    ) -> Result<WeatherSnapshot, FetchError> {
        let key = SnapshotKey::new(location.id.clone(), units);
        let cache_key = CacheKey::forecast(key.clone());
        self.inner.state.set_pending(&key);

        if let Some(snapshot) = self.inner.cache.get::<WeatherSnapshot>(&cache_key, self.inner.ttl) {
            self.inner.cache_hits.fetch_add(1, Ordering::Relaxed);
            self.inner.state.set_succeeded(&key, snapshot.clone());
            return Ok(snapshot);
        }

        let mut receiver = match self.inner.register(&key) {
            Registration::Attached(receiver) => receiver,
            Registration::Leader(receiver) => {
                let inner = Arc::clone(&self.inner);
                let location = location.clone();
                tokio::spawn(async move {
                    inner.run_fetch(key, cache_key, location, units).await;
                });
                receiver
            }
        };

        receiver
            .recv()
            .await
            .unwrap_or_else(|_| Err(FetchError::Network(NO_RESULT.to_string())))
    }

    /// Number of keys with a fetch currently in flight
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.lock().len()
    }

    pub fn stats(&self) -> CoordinatorStats {
        CoordinatorStats {
            cache_hits: self.inner.cache_hits.load(Ordering::Relaxed),
            coalesced_requests: self.inner.coalesced_requests.load(Ordering::Relaxed),
            upstream_calls: self.inner.upstream_calls.load(Ordering::Relaxed),
        }
    }
}

impl Inner {
    /// Claims the in-flight slot for `key` or subscribes to its holder
    ///
    /// Check and insert happen under one lock so two callers can never both lead.
    fn register(&self, key: &SnapshotKey) -> Registration {
        let mut in_flight = self.in_flight.lock();
        match in_flight.entry(key.clone()) {
            Entry::Occupied(entry) => {
                self.coalesced_requests.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "attaching to in-flight fetch");
                Registration::Attached(entry.get().subscribe())
            }
            Entry::Vacant(entry) => {
                // One result is ever sent per slot
                let (tx, rx) = broadcast::channel(1);
                entry.insert(tx);
                Registration::Leader(rx)
            }
        }
    }

    async fn run_fetch(
        self: Arc<Self>,
        key: SnapshotKey,
        cache_key: CacheKey,
        location: Location,
        units: UnitSystem,
    ) {
        let mut slot = Slot {
            inner: &self,
            key: Some(&key),
        };

        // A fetch that finished between the caller's cache miss and claiming
        // the slot has already refreshed the entry.
        let result = match self.cache.get::<WeatherSnapshot>(&cache_key, self.ttl) {
            Some(snapshot) => Ok(snapshot),
            None => self.fetch_upstream(&cache_key, &location, units).await,
        };

        if let Err(err) = &result {
            warn!(key = %key, kind = ?err.kind(), error = %err, "weather fetch failed");
        }
        let sender = slot.release(|| match &result {
            Ok(snapshot) => self.state.set_succeeded(&key, snapshot.clone()),
            Err(err) => self.state.set_failed(&key, err.clone()),
        });

        if let Some(sender) = sender {
            // Attached callers may have given up waiting
            let _ = sender.send(result);
        }
    }

    async fn fetch_upstream(
        &self,
        cache_key: &CacheKey,
        location: &Location,
        units: UnitSystem,
    ) -> FetchResult {
        self.upstream_calls.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();

        let raw = self
            .provider
            .fetch_forecast(location.latitude, location.longitude)
            .await?;
        let snapshot = normalize(&raw, location, units)?;
        self.cache.set(cache_key, &snapshot);

        info!(
            location = %location.id,
            units = %units,
            hours = snapshot.hourly.len(),
            days = snapshot.daily.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "fetched forecast"
        );
        Ok(snapshot)
    }
}

/// Owns an in-flight slot until its result is published
///
/// The key's final state is recorded while the in-flight lock is held, so a
/// leader that starts after this one can never have its result overwritten.
/// If the fetch task unwinds first, dropping the slot records a failure and
/// removes the sender, which closes the channel and fails every attached
/// caller instead of leaving them waiting forever.
struct Slot<'a> {
    inner: &'a Inner,
    key: Option<&'a SnapshotKey>,
}

impl Slot<'_> {
    /// Runs `record` and frees the slot as one step under the in-flight lock
    fn release(&mut self, record: impl FnOnce()) -> Option<broadcast::Sender<FetchResult>> {
        let key = self.key.take()?;
        let mut in_flight = self.inner.in_flight.lock();
        record();
        in_flight.remove(key)
    }
}

impl Drop for Slot<'_> {
    fn drop(&mut self) {
        let Some(key) = self.key else {
            return;
        };
        let inner = self.inner;
        warn!(key = %key, "weather fetch ended without a result");
        self.release(|| {
            inner
                .state
                .set_failed(key, FetchError::Network(NO_RESULT.to_string()))
        });
    }
}
