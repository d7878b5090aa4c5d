//! Persisted user preferences
//!
//! Favorites, unit system and the auto-refresh toggle survive restarts as a
//! single JSON document in the platform config directory.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::data::{Location, UnitSystem};
use crate::error::StorageError;

const PREFERENCES_FILE: &str = "preferences.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub favorites: Vec<Location>,
    pub units: UnitSystem,
    pub auto_refresh: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            favorites: Vec::new(),
            units: UnitSystem::Metric,
            auto_refresh: true,
        }
    }
}

impl Preferences {
    /// Adds a favorite; returns `false` if one with the same id already exists
    pub fn add_favorite(&mut self, location: Location) -> bool {
        if self.is_favorite(&location.id) {
            return false;
        }
        self.favorites.push(location);
        true
    }

    pub fn remove_favorite(&mut self, location_id: &str) -> bool {
        let before = self.favorites.len();
        self.favorites.retain(|l| l.id != location_id);
        self.favorites.len() != before
    }

    pub fn is_favorite(&self, location_id: &str) -> bool {
        self.favorites.iter().any(|l| l.id == location_id)
    }
}

/// Reads and writes [`Preferences`] at a fixed path
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    path: PathBuf,
}

impl PreferenceStore {
    /// Store in the platform config directory
    ///
    /// Returns None if the config directory cannot be determined.
    pub fn new() -> Option<Self> {
        ProjectDirs::from("", "", "skywatch").map(|dirs| Self {
            path: dirs.config_dir().join(PREFERENCES_FILE),
        })
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads preferences, falling back to defaults when absent or unreadable
    pub fn load(&self) -> Preferences {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no saved preferences");
                return Preferences::default();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read preferences");
                return Preferences::default();
            }
        };

        serde_json::from_str(&contents).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "ignoring corrupt preferences");
            Preferences::default()
        })
    }

    /// Writes preferences atomically (temp file then rename)
    pub fn save(&self, preferences: &Preferences) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(preferences)?;
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, json)?;
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}
