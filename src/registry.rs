//! Tracked-location registry
//!
//! Owns the set of locations subject to periodic refresh. Newly tracked
//! locations are announced on a broadcast channel so the refresh scheduler
//! can fetch just that location right away instead of refreshing everything.

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::debug;

use crate::data::{Location, TrackedLocation};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Change to the tracked set
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryEvent {
    /// A location started being tracked
    Added(Location),
    /// A location stopped being tracked (by id)
    Removed(String),
}

/// Ordered set of tracked locations, unique by id
#[derive(Debug)]
pub struct Registry {
    entries: RwLock<Vec<TrackedLocation>>,
    events: broadcast::Sender<RegistryEvent>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            entries: RwLock::new(Vec::new()),
            events,
        }
    }

    /// Pins a location for this session
    ///
    /// Idempotent by id. Returns `true` if the location was not tracked before.
    pub fn add(&self, location: Location) -> bool {
        self.insert(location, true, false)
    }

    /// Tracks a location as a favorite, or marks an already tracked one as favorite
    ///
    /// Returns `true` if the location was not tracked before.
    pub fn add_favorite(&self, location: Location) -> bool {
        self.insert(location, false, true)
    }

    /// Stops tracking a location regardless of pin or favorite state
    pub fn remove(&self, location_id: &str) -> bool {
        let removed = {
            let mut entries = self.entries.write();
            let before = entries.len();
            entries.retain(|entry| entry.location.id != location_id);
            entries.len() != before
        };

        if removed {
            debug!(location = location_id, "stopped tracking location");
            let _ = self.events.send(RegistryEvent::Removed(location_id.to_string()));
        }
        removed
    }

    /// Sets the favorite flag on a tracked location
    ///
    /// Unfavoriting a location that is not pinned stops tracking it. Returns
    /// `false` if the id is not tracked.
    pub fn set_favorite(&self, location_id: &str, favorite: bool) -> bool {
        let drop_entry = {
            let mut entries = self.entries.write();
            let Some(entry) = entries.iter_mut().find(|e| e.location.id == location_id) else {
                return false;
            };
            entry.is_favorite = favorite;
            !favorite && !entry.is_pinned
        };

        if drop_entry {
            self.remove(location_id);
        }
        true
    }

    /// Snapshot of tracked entries in insertion order
    pub fn list(&self) -> Vec<TrackedLocation> {
        self.entries.read().clone()
    }

    /// Tracked locations in insertion order
    pub fn locations(&self) -> Vec<Location> {
        self.entries
            .read()
            .iter()
            .map(|entry| entry.location.clone())
            .collect()
    }

    /// Tracked locations flagged as favorites
    pub fn favorites(&self) -> Vec<Location> {
        self.entries
            .read()
            .iter()
            .filter(|entry| entry.is_favorite)
            .map(|entry| entry.location.clone())
            .collect()
    }

    pub fn get(&self, location_id: &str) -> Option<TrackedLocation> {
        self.entries
            .read()
            .iter()
            .find(|entry| entry.location.id == location_id)
            .cloned()
    }

    pub fn is_tracked(&self, location_id: &str) -> bool {
        self.entries
            .read()
            .iter()
            .any(|entry| entry.location.id == location_id)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Subscribes to add/remove events
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    fn insert(&self, location: Location, pinned: bool, favorite: bool) -> bool {
        {
            let mut entries = self.entries.write();
            if let Some(existing) = entries.iter_mut().find(|e| e.location == location) {
                existing.is_pinned |= pinned;
                existing.is_favorite |= favorite;
                return false;
            }
            entries.push(TrackedLocation {
                location: location.clone(),
                is_favorite: favorite,
                is_pinned: pinned,
            });
        }

        debug!(location = %location.id, pinned, favorite, "tracking location");
        let _ = self.events.send(RegistryEvent::Added(location));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paris() -> Location {
        Location::new("Paris", 48.8566, 2.3522, "FR")
    }

    #[test]
    fn test_add_is_idempotent() {
        let registry = Registry::new();
        assert!(registry.add(Location::new_york()));
        assert!(!registry.add(Location::new_york()));
        assert_eq!(registry.len(), 1);
        assert!(registry.is_tracked("nyc"));
    }

    #[test]
    fn test_list_preserves_insertion_order() {
        let registry = Registry::new();
        registry.add(Location::new_york());
        registry.add(paris());

        let ids: Vec<String> = registry.locations().into_iter().map(|l| l.id).collect();
        assert_eq!(ids, vec!["nyc".to_string(), paris().id]);
    }

    #[test]
    fn test_remove_untracks() {
        let registry = Registry::new();
        registry.add(paris());
        assert!(registry.remove(&paris().id));
        assert!(!registry.remove(&paris().id));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unfavorite_removes_only_unpinned() {
        let registry = Registry::new();
        registry.add_favorite(paris());
        registry.add(Location::new_york());
        registry.add_favorite(Location::new_york());

        assert!(registry.set_favorite(&paris().id, false));
        assert!(registry.set_favorite("nyc", false));

        assert!(!registry.is_tracked(&paris().id), "unpinned favorite should go");
        let nyc = registry.get("nyc").expect("pinned location stays");
        assert!(!nyc.is_favorite);
        assert!(nyc.is_pinned);
    }

    #[test]
    fn test_set_favorite_unknown_id() {
        let registry = Registry::new();
        assert!(!registry.set_favorite("nowhere", true));
    }

    #[test]
    fn test_favorites_lists_flagged_entries() {
        let registry = Registry::new();
        registry.add(Location::new_york());
        registry.add_favorite(paris());

        assert_eq!(registry.favorites(), vec![paris()]);
    }

    #[tokio::test]
    async fn test_events_only_for_new_locations() {
        let registry = Registry::new();
        let mut events = registry.subscribe();

        registry.add(Location::new_york());
        registry.add(Location::new_york());
        registry.add_favorite(Location::new_york());
        registry.remove("nyc");

        assert_eq!(
            events.recv().await.unwrap(),
            RegistryEvent::Added(Location::new_york())
        );
        assert_eq!(
            events.recv().await.unwrap(),
            RegistryEvent::Removed("nyc".to_string())
        );
        assert!(events.try_recv().is_err());
    }
}
