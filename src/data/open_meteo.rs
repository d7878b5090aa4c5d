//! Open-Meteo forecast API client
//!
//! This module defines the raw response schema as the provider sends it and
//! the [`WeatherProvider`] seam the fetch coordinator calls through. Every
//! field the normalizer reads is optional here; deciding what is required
//! happens in one place, [`super::normalize`].

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::error::FetchError;

/// Base URL for the Open-Meteo forecast API
pub const OPEN_METEO_BASE_URL: &str = "https://api.open-meteo.com/v1/forecast";

const CURRENT_FIELDS: &str = "temperature_2m,relative_humidity_2m,pressure_msl,wind_speed_10m";
const HOURLY_FIELDS: &str = "temperature_2m,precipitation_probability,wind_speed_10m";
const DAILY_FIELDS: &str = "temperature_2m_max,temperature_2m_min,precipitation_probability_max";

/// Upstream weather provider
///
/// Implementations return the provider document untouched; the coordinator
/// is the only caller.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn fetch_forecast(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<ForecastResponse, FetchError>;
}

/// Open-Meteo forecast response
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ForecastResponse {
    /// IANA timezone resolved by `timezone=auto`
    #[serde(default)]
    pub timezone: Option<String>,
    /// Offset of the resolved timezone from UTC at request time
    #[serde(default)]
    pub utc_offset_seconds: i32,
    #[serde(default)]
    pub current: Option<RawCurrent>,
    #[serde(default)]
    pub hourly: Option<RawHourly>,
    #[serde(default)]
    pub daily: Option<RawDaily>,
}

/// Current conditions block
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawCurrent {
    /// Unix seconds
    pub time: Option<i64>,
    pub temperature_2m: Option<f64>,
    pub relative_humidity_2m: Option<f64>,
    pub pressure_msl: Option<f64>,
    pub wind_speed_10m: Option<f64>,
}

/// Hourly block: parallel arrays indexed by `time`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawHourly {
    /// Unix seconds
    #[serde(default)]
    pub time: Vec<i64>,
    #[serde(default)]
    pub temperature_2m: Vec<f64>,
    /// Percent (0-100); items are null where the model has no value
    #[serde(default)]
    pub precipitation_probability: Option<Vec<Option<f64>>>,
    #[serde(default)]
    pub wind_speed_10m: Vec<f64>,
}

/// Daily block: parallel arrays indexed by `time`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawDaily {
    /// Unix seconds of local midnight for each day
    #[serde(default)]
    pub time: Vec<i64>,
    #[serde(default)]
    pub temperature_2m_max: Vec<f64>,
    #[serde(default)]
    pub temperature_2m_min: Vec<f64>,
    #[serde(default)]
    pub precipitation_probability_max: Option<Vec<Option<f64>>>,
}

/// Client for fetching forecasts from the Open-Meteo API
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    client: Client,
    base_url: String,
}

impl OpenMeteoClient {
    /// Creates a client against `base_url` with the given request timeout
    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("skywatch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoClient {
    async fn fetch_forecast(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<ForecastResponse, FetchError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("current", CURRENT_FIELDS.to_string()),
                ("hourly", HOURLY_FIELDS.to_string()),
                ("daily", DAILY_FIELDS.to_string()),
                ("timezone", "auto".to_string()),
                // Epoch seconds stay unambiguous across DST changes
                ("timeformat", "unixtime".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Network(format!(
                "upstream returned status {}",
                status
            )));
        }

        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| FetchError::malformed(format!("undecodable forecast body: {}", e)))
    }
}
