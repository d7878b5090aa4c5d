//! Shared fixtures for unit tests

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheStore, MemoryBackend};
use crate::clock::ManualClock;
use crate::context::WeatherContext;
use crate::data::open_meteo::{RawCurrent, RawDaily, RawHourly};
use crate::data::{
    CurrentConditions, ForecastResponse, UnitSystem, WeatherProvider, WeatherSnapshot,
};
use crate::error::FetchError;

pub fn sample_snapshot(location_id: &str) -> WeatherSnapshot {
    WeatherSnapshot {
        location_id: location_id.to_string(),
        units: UnitSystem::Metric,
        timezone: Some("UTC".to_string()),
        current: CurrentConditions {
            temperature: 21.0,
            humidity: 50.0,
            pressure_hpa: 1013.0,
            wind_speed: 5.0,
            observed_at: Utc.with_ymd_and_hms(2024, 7, 15, 12, 0, 0).unwrap(),
        },
        hourly: Vec::new(),
        daily: Vec::new(),
    }
}

/// A well-formed UTC response at 2024-07-15 12:00 whose current temperature is `temperature`
pub fn sample_response(temperature: f64) -> ForecastResponse {
    ForecastResponse {
        timezone: Some("UTC".to_string()),
        utc_offset_seconds: 0,
        current: Some(RawCurrent {
            time: Some(1721044800),
            temperature_2m: Some(temperature),
            relative_humidity_2m: Some(55.0),
            pressure_msl: Some(1015.2),
            wind_speed_10m: Some(12.0),
        }),
        hourly: Some(RawHourly {
            time: vec![1721044800, 1721048400],
            temperature_2m: vec![temperature, temperature + 1.0],
            precipitation_probability: Some(vec![Some(20.0), None]),
            wind_speed_10m: vec![12.0, 13.0],
        }),
        daily: Some(RawDaily {
            time: vec![1721001600],
            temperature_2m_max: vec![temperature + 4.0],
            temperature_2m_min: vec![temperature - 6.0],
            precipitation_probability_max: None,
        }),
    }
}

/// Provider that counts calls, optionally sleeps, and fails for chosen latitudes
#[derive(Debug, Default)]
pub struct StubProvider {
    calls: AtomicUsize,
    delay: Duration,
    failing_latitudes: Mutex<Vec<f64>>,
    temperature: Mutex<f64>,
}

impl StubProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn fail_for(&self, latitude: f64) {
        self.failing_latitudes.lock().push(latitude);
    }

    pub fn set_temperature(&self, temperature: f64) {
        *self.temperature.lock() = temperature;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherProvider for StubProvider {
    async fn fetch_forecast(
        &self,
        latitude: f64,
        _longitude: f64,
    ) -> Result<ForecastResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing_latitudes.lock().contains(&latitude) {
            return Err(FetchError::Network("connection refused".to_string()));
        }
        let temperature = *self.temperature.lock();
        Ok(sample_response(temperature))
    }
}

/// Context over an in-memory cache and a manual clock
pub fn test_context(provider: Arc<StubProvider>) -> (WeatherContext, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 7, 15, 12, 0, 0).unwrap(),
    ));
    let cache = CacheStore::new(Arc::new(MemoryBackend::new()), clock.clone());
    let context = WeatherContext::new(provider, cache, clock.clone(), crate::cache::DEFAULT_TTL);
    (context, clock)
}
