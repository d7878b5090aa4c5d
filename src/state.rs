//! Latest fetch results, per snapshot key and globally
//!
//! The state store is the read side for presentation. Each key is an
//! independent cell, so results for different locations never overwrite one
//! another. A single global status mirrors the most recent transition of any
//! key; per-key status is exposed alongside it.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::cache::SnapshotKey;
use crate::clock::{Clock, SystemClock};
use crate::data::WeatherSnapshot;
use crate::error::FetchError;

/// Capacity of the update channel; slow subscribers see `Lagged`
const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// Request lifecycle: Idle -> Loading -> Succeeded | Failed -> Loading ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    #[default]
    Idle,
    Loading,
    Succeeded,
    Failed,
}

/// Latest known result for one key
#[derive(Debug, Clone, Default)]
pub struct LatestResult {
    pub status: FetchStatus,
    /// Last successful snapshot; kept through later loading and failures
    pub snapshot: Option<WeatherSnapshot>,
    /// Error from the latest attempt, if it failed
    pub error: Option<FetchError>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Notification sent on every state transition
#[derive(Debug, Clone, PartialEq)]
pub struct StateUpdate {
    pub key: SnapshotKey,
    pub status: FetchStatus,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<SnapshotKey, LatestResult>,
    status: FetchStatus,
    error: Option<FetchError>,
}

/// Shared store of per-key fetch results
#[derive(Debug)]
pub struct StateStore {
    inner: RwLock<Inner>,
    updates: broadcast::Sender<StateUpdate>,
    clock: Arc<dyn Clock>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl StateStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            inner: RwLock::new(Inner::default()),
            updates,
            clock,
        }
    }

    /// Marks a fetch for `key` as started
    pub fn set_pending(&self, key: &SnapshotKey) {
        self.transition(key, FetchStatus::Loading, |entry| {
            entry.error = None;
        });
    }

    /// Records a successful fetch
    pub fn set_succeeded(&self, key: &SnapshotKey, snapshot: WeatherSnapshot) {
        self.transition(key, FetchStatus::Succeeded, |entry| {
            entry.snapshot = Some(snapshot);
            entry.error = None;
        });
    }

    /// Records a failed fetch; the last good snapshot is kept
    pub fn set_failed(&self, key: &SnapshotKey, error: FetchError) {
        self.transition(key, FetchStatus::Failed, |entry| {
            entry.error = Some(error);
        });
    }

    /// Latest result for `key` (default `Idle` entry if never fetched)
    pub fn get(&self, key: &SnapshotKey) -> LatestResult {
        self.inner
            .read()
            .entries
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    /// Last successful snapshot for `key`
    pub fn snapshot(&self, key: &SnapshotKey) -> Option<WeatherSnapshot> {
        self.inner
            .read()
            .entries
            .get(key)
            .and_then(|entry| entry.snapshot.clone())
    }

    /// Status of the most recent transition of any key
    pub fn status(&self) -> FetchStatus {
        self.inner.read().status
    }

    /// Error of the most recent transition of any key, if it failed
    pub fn error(&self) -> Option<FetchError> {
        self.inner.read().error.clone()
    }

    /// Subscribes to state transitions
    pub fn subscribe(&self) -> broadcast::Receiver<StateUpdate> {
        self.updates.subscribe()
    }

    fn transition(
        &self,
        key: &SnapshotKey,
        status: FetchStatus,
        apply: impl FnOnce(&mut LatestResult),
    ) {
        let now = self.clock.now();
        {
            let mut inner = self.inner.write();
            let entry = inner.entries.entry(key.clone()).or_default();
            entry.status = status;
            entry.updated_at = Some(now);
            apply(entry);
            let error = entry.error.clone();

            inner.status = status;
            inner.error = error;
        }

        // No subscribers is fine
        let _ = self.updates.send(StateUpdate {
            key: key.clone(),
            status,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::UnitSystem;
    use crate::testing::sample_snapshot;

    fn key(id: &str) -> SnapshotKey {
        SnapshotKey::new(id, UnitSystem::Metric)
    }

    #[test]
    fn test_unknown_key_is_idle() {
        let store = StateStore::default();
        let result = store.get(&key("nyc"));
        assert_eq!(result.status, FetchStatus::Idle);
        assert!(result.snapshot.is_none());
        assert_eq!(store.status(), FetchStatus::Idle);
    }

    #[test]
    fn test_lifecycle_pending_then_succeeded() {
        let store = StateStore::default();
        store.set_pending(&key("nyc"));
        assert_eq!(store.get(&key("nyc")).status, FetchStatus::Loading);
        assert_eq!(store.status(), FetchStatus::Loading);

        store.set_succeeded(&key("nyc"), sample_snapshot("nyc"));

        let result = store.get(&key("nyc"));
        assert_eq!(result.status, FetchStatus::Succeeded);
        assert_eq!(result.snapshot.unwrap().location_id, "nyc");
        assert!(result.updated_at.is_some());
        assert_eq!(store.status(), FetchStatus::Succeeded);
    }

    #[test]
    fn test_failure_keeps_last_good_snapshot() {
        let store = StateStore::default();
        store.set_succeeded(&key("nyc"), sample_snapshot("nyc"));
        store.set_pending(&key("nyc"));
        store.set_failed(&key("nyc"), FetchError::Network("timeout".into()));

        let result = store.get(&key("nyc"));
        assert_eq!(result.status, FetchStatus::Failed);
        assert!(result.snapshot.is_some(), "last good snapshot should survive");
        assert_eq!(result.error, Some(FetchError::Network("timeout".into())));
        assert_eq!(store.error(), Some(FetchError::Network("timeout".into())));
    }

    #[test]
    fn test_keys_are_isolated() {
        let store = StateStore::default();
        store.set_succeeded(&key("b"), sample_snapshot("b"));
        store.set_failed(&key("a"), FetchError::Network("down".into()));

        let b = store.get(&key("b"));
        assert_eq!(b.status, FetchStatus::Succeeded);
        assert!(b.error.is_none());
        // Global status reflects the most recent transition
        assert_eq!(store.status(), FetchStatus::Failed);
    }

    #[test]
    fn test_units_are_separate_cells() {
        let store = StateStore::default();
        store.set_succeeded(&key("nyc"), sample_snapshot("nyc"));

        let imperial = SnapshotKey::new("nyc", UnitSystem::Imperial);
        assert_eq!(store.get(&imperial).status, FetchStatus::Idle);
    }

    #[test]
    fn test_pending_clears_global_error() {
        let store = StateStore::default();
        store.set_failed(&key("a"), FetchError::Network("down".into()));
        store.set_pending(&key("b"));
        assert!(store.error().is_none());
    }

    #[tokio::test]
    async fn test_subscribers_receive_transitions() {
        let store = StateStore::default();
        let mut updates = store.subscribe();

        store.set_pending(&key("nyc"));
        store.set_succeeded(&key("nyc"), sample_snapshot("nyc"));

        let first = updates.recv().await.unwrap();
        let second = updates.recv().await.unwrap();
        assert_eq!(first.status, FetchStatus::Loading);
        assert_eq!(second.status, FetchStatus::Succeeded);
        assert_eq!(second.key, key("nyc"));
    }
}
