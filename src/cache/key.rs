//! Keys for the cache, the in-flight map and the state store

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::data::UnitSystem;

/// Prefix for every storage key, bumped when the stored shape changes
const CACHE_PREFIX: &str = "wx_v1_";

/// Identifies one snapshot: a location in one unit system
///
/// Displays as `"{location_id}_{units}"`, e.g. `nyc_metric`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotKey {
    pub location_id: String,
    pub units: UnitSystem,
}

impl SnapshotKey {
    pub fn new(location_id: impl Into<String>, units: UnitSystem) -> Self {
        Self {
            location_id: location_id.into(),
            units,
        }
    }
}

impl fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.location_id, self.units)
    }
}

/// Kind of data stored under a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    /// Current, hourly and daily forecast bundle
    Forecast,
}

impl DataKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Forecast => "forecast",
        }
    }
}

/// Composite cache key: (location, units, data kind)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub snapshot: SnapshotKey,
    pub kind: DataKind,
}

impl CacheKey {
    pub fn forecast(snapshot: SnapshotKey) -> Self {
        Self {
            snapshot,
            kind: DataKind::Forecast,
        }
    }

    /// The string the backend stores this entry under
    pub fn storage_key(&self) -> String {
        format!("{}{}_{}", CACHE_PREFIX, self.snapshot, self.kind.as_str())
    }
}
