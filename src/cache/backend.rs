//! Storage backends for the cache store
//!
//! A backend is a plain string key/value map. [`MemoryBackend`] lives for the
//! process; [`DiskBackend`] persists one JSON file per key in an
//! XDG-compliant cache directory (`~/.cache/skywatch/` on Linux).

use directories::ProjectDirs;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::Debug;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::error::StorageError;

/// Key/value storage underneath [`super::CacheStore`]
pub trait CacheBackend: Send + Sync + Debug {
    /// Returns the raw value stored under `key`, or `None` if absent
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replaces the value stored under `key`
    ///
    /// A failed store must leave every other key untouched.
    fn store(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// In-process backend
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl CacheBackend for MemoryBackend {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn store(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Backend that writes each entry to `<cache_dir>/<key>.json`
#[derive(Debug, Clone)]
pub struct DiskBackend {
    /// Directory where cache files are stored
    cache_dir: PathBuf,
}

impl DiskBackend {
    /// Creates a DiskBackend using the XDG-compliant cache directory
    ///
    /// Returns `None` if the cache directory cannot be determined (e.g., no home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "skywatch")?;
        Some(Self::with_dir(project_dirs.cache_dir().to_path_buf()))
    }

    /// Creates a DiskBackend with a custom cache directory
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    pub fn cache_dir(&self) -> &PathBuf {
        &self.cache_dir
    }

    /// Returns the path to a cache file for the given key
    fn cache_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", file_stem(key)))
    }
}

impl CacheBackend for DiskBackend {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.cache_path(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::create_dir_all(&self.cache_dir)?;

        // Write beside the target and rename so a failed write never leaves a
        // truncated entry behind.
        let path = self.cache_path(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// Maps a storage key onto a safe file name
///
/// Percent-encoding keeps distinct keys on distinct files and leaves no
/// path separators in the name.
fn file_stem(key: &str) -> String {
    urlencoding::encode(key).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_backend() -> (DiskBackend, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let backend = DiskBackend::with_dir(temp_dir.path().to_path_buf());
        (backend, temp_dir)
    }

    #[test]
    fn test_memory_backend_roundtrip_and_overwrite() {
        let backend = MemoryBackend::new();
        assert!(backend.load("a").unwrap().is_none());

        backend.store("a", "1").unwrap();
        backend.store("a", "2").unwrap();

        assert_eq!(backend.load("a").unwrap().as_deref(), Some("2"));
        assert_eq!(backend.len(), 1);
    }

    #[test]
    fn test_store_creates_file_in_cache_directory() {
        let (backend, temp_dir) = create_test_backend();

        backend.store("wx_v1_nyc_metric_forecast", "{}").expect("Store should succeed");

        let expected_path = temp_dir.path().join("wx_v1_nyc_metric_forecast.json");
        assert!(expected_path.exists(), "Cache file should exist");
        assert!(
            !temp_dir.path().join("wx_v1_nyc_metric_forecast.json.tmp").exists(),
            "Temp file should be renamed away"
        );
    }

    #[test]
    fn test_load_returns_none_for_missing_key() {
        let (backend, _temp_dir) = create_test_backend();
        assert!(backend.load("nonexistent_key").unwrap().is_none());
    }

    #[test]
    fn test_store_creates_directory_if_missing() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let nested_path = temp_dir.path().join("nested").join("cache");
        let backend = DiskBackend::with_dir(nested_path.clone());

        backend.store("nested_key", "value").expect("Store should succeed");

        assert!(nested_path.join("nested_key.json").exists());
    }

    #[test]
    fn test_unsafe_key_characters_are_encoded() {
        let (backend, temp_dir) = create_test_backend();

        backend.store("../escape/key", "x").expect("Store should succeed");

        assert!(temp_dir.path().join("..%2Fescape%2Fkey.json").exists());
        assert!(!temp_dir.path().join("..").join("escape").exists());
        assert_eq!(backend.load("../escape/key").unwrap().as_deref(), Some("x"));
    }

    #[test]
    fn test_similar_keys_do_not_share_a_file() {
        let (backend, _temp_dir) = create_test_backend();

        backend.store("wx_v1_a/b_metric_forecast", "slash").unwrap();
        backend.store("wx_v1_a_b_metric_forecast", "underscore").unwrap();
        backend.store("wx_v1_a%2Fb_metric_forecast", "percent").unwrap();

        assert_eq!(
            backend.load("wx_v1_a/b_metric_forecast").unwrap().as_deref(),
            Some("slash")
        );
        assert_eq!(
            backend.load("wx_v1_a_b_metric_forecast").unwrap().as_deref(),
            Some("underscore")
        );
        assert_eq!(
            backend.load("wx_v1_a%2Fb_metric_forecast").unwrap().as_deref(),
            Some("percent")
        );
    }

    #[test]
    fn test_failed_store_leaves_other_keys_intact() {
        let (backend, temp_dir) = create_test_backend();
        backend.store("good", "kept").unwrap();

        // A directory where the target file should go makes the rename fail
        fs::create_dir_all(temp_dir.path().join("blocked.json")).unwrap();
        assert!(backend.store("blocked", "lost").is_err());

        assert_eq!(backend.load("good").unwrap().as_deref(), Some("kept"));
    }

    #[test]
    fn test_new_creates_xdg_compliant_path() {
        if let Some(backend) = DiskBackend::new() {
            let path_str = backend.cache_dir.to_string_lossy();
            assert!(path_str.contains("skywatch"), "Cache path should contain project name");
        }
        // Test passes if new() returns None (e.g., no home directory in CI)
    }
}
