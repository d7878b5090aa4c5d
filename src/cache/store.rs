//! TTL-checked cache store
//!
//! Provides a `CacheStore` that wraps serializable values with the time they
//! were stored and answers fresh lookups against a caller-supplied TTL.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::backend::{CacheBackend, MemoryBackend};
use super::key::CacheKey;
use crate::clock::{Clock, SystemClock};

/// Snapshots are fresh for one minute
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Wrapper struct for cached data as stored in the backend
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry<T> {
    /// When the data was cached
    stored_at: DateTime<Utc>,
    /// The cached data
    value: T,
}

/// Result of peeking at a cache entry, including freshness metadata
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub stored_at: DateTime<Utc>,
    /// Whether the entry was younger than the TTL at read time
    pub is_fresh: bool,
}

/// Cache of serialized values keyed by [`CacheKey`]
#[derive(Debug, Clone)]
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
    clock: Arc<dyn Clock>,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn CacheBackend>, clock: Arc<dyn Clock>) -> Self {
        Self { backend, clock }
    }

    /// A process-lifetime store on the system clock
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()), Arc::new(SystemClock))
    }

    /// Returns the stored value iff it is younger than `ttl`
    ///
    /// Missing, stale, unreadable and undecodable entries are all a miss.
    pub fn get<T: DeserializeOwned>(&self, key: &CacheKey, ttl: Duration) -> Option<T> {
        let entry = self.peek(key, ttl)?;
        if entry.is_fresh {
            debug!(key = %key.snapshot, "cache hit");
            Some(entry.value)
        } else {
            debug!(key = %key.snapshot, stored_at = %entry.stored_at, "cache entry stale");
            None
        }
    }

    /// Returns the stored value regardless of age
    ///
    /// Lets callers show a last-known value while a refresh is in progress.
    pub fn peek<T: DeserializeOwned>(&self, key: &CacheKey, ttl: Duration) -> Option<CacheEntry<T>> {
        let entry: StoredEntry<T> = self.read(key)?;
        let is_fresh = self.is_fresh(entry.stored_at, ttl);
        Some(CacheEntry {
            value: entry.value,
            stored_at: entry.stored_at,
            is_fresh,
        })
    }

    /// Overwrites the entry for `key`, stamped with the current time
    ///
    /// Failures are logged and otherwise ignored.
    pub fn set<T: Serialize>(&self, key: &CacheKey, value: &T) {
        let entry = StoredEntry {
            stored_at: self.clock.now(),
            value,
        };

        let json = match serde_json::to_string(&entry) {
            Ok(json) => json,
            Err(e) => {
                warn!(key = %key.snapshot, error = %e, "failed to serialize cache entry");
                return;
            }
        };

        if let Err(e) = self.backend.store(&key.storage_key(), &json) {
            warn!(key = %key.snapshot, error = %e, "failed to write cache entry");
        }
    }

    fn read<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<StoredEntry<T>> {
        let raw = match self.backend.load(&key.storage_key()) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %key.snapshot, error = %e, "failed to read cache entry");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(key = %key.snapshot, error = %e, "discarding undecodable cache entry");
                None
            }
        }
    }

    fn is_fresh(&self, stored_at: DateTime<Utc>, ttl: Duration) -> bool {
        let age = self.clock.now().signed_duration_since(stored_at);
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => age < ttl,
            // A TTL beyond chrono's range never expires
            Err(_) => true,
        }
    }
}
