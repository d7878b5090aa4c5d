//! skywatch library
//!
//! Weather client core: per-location fetching with a TTL cache, in-flight
//! deduplication, a tracked-location registry with background refresh, and a
//! state store for presentation. The binary in `main.rs` is a thin CLI over it.

pub mod cache;
pub mod cli;
pub mod clock;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod data;
pub mod error;
pub mod preferences;
pub mod registry;
pub mod scheduler;
pub mod state;

#[cfg(test)]
mod testing;
