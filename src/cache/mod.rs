//! Cache module for storing normalized snapshots
//!
//! This module provides a TTL-checked cache store over a pluggable backend.
//! Entries are never evicted eagerly: a stale entry is a miss for
//! [`CacheStore::get`] but can still be read with [`CacheStore::peek`] as a
//! last-known placeholder. Backend failures are logged and degrade to a
//! miss or a no-op write.

mod backend;
mod key;
mod store;

pub use backend::{CacheBackend, DiskBackend, MemoryBackend};
pub use key::{CacheKey, DataKind, SnapshotKey};
pub use store::{CacheEntry, CacheStore, DEFAULT_TTL};
