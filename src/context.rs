//! Session context shared by the coordinator, scheduler and presentation
//!
//! Everything process-wide lives here and is handed out by reference; there
//! are no global singletons.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::cache::{CacheBackend, CacheStore, DiskBackend, MemoryBackend};
use crate::clock::{Clock, SystemClock};
use crate::config::{CacheBackendKind, Config};
use crate::coordinator::FetchCoordinator;
use crate::data::{OpenMeteoClient, WeatherProvider};
use crate::error::FetchError;
use crate::registry::Registry;
use crate::state::StateStore;

/// Shared stores plus the coordinator that writes to them
#[derive(Clone)]
pub struct WeatherContext {
    pub cache: CacheStore,
    pub state: Arc<StateStore>,
    pub registry: Arc<Registry>,
    pub coordinator: FetchCoordinator,
}

impl WeatherContext {
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        cache: CacheStore,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        let state = Arc::new(StateStore::new(clock));
        let coordinator = FetchCoordinator::new(provider, cache.clone(), Arc::clone(&state), ttl);
        Self {
            cache,
            state,
            registry: Arc::new(Registry::new()),
            coordinator,
        }
    }

    /// Builds the production context: Open-Meteo over HTTP, configured cache backend
    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        let provider = OpenMeteoClient::with_base_url(&config.forecast_url, config.request_timeout())?;
        let cache = CacheStore::new(cache_backend(config), Arc::new(SystemClock));
        Ok(Self::new(
            Arc::new(provider),
            cache,
            Arc::new(SystemClock),
            config.cache_ttl(),
        ))
    }
}

fn cache_backend(config: &Config) -> Arc<dyn CacheBackend> {
    match config.cache_backend {
        CacheBackendKind::Memory => Arc::new(MemoryBackend::new()),
        CacheBackendKind::Disk => {
            let disk = config
                .cache_dir
                .clone()
                .map(DiskBackend::with_dir)
                .or_else(DiskBackend::new);
            match disk {
                Some(disk) => {
                    info!(dir = %disk.cache_dir().display(), "using disk cache");
                    Arc::new(disk)
                }
                None => {
                    warn!("no cache directory available, falling back to memory cache");
                    Arc::new(MemoryBackend::new())
                }
            }
        }
    }
}
