//! Core data models for skywatch
//!
//! This module contains the types shared by the cache, the fetch coordinator
//! and the state store: locations, unit systems and the normalized weather
//! snapshot produced from upstream forecasts.

pub mod normalize;
pub mod open_meteo;

pub use normalize::normalize;
pub use open_meteo::{ForecastResponse, OpenMeteoClient, WeatherProvider};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kilometres per statute mile, used for km/h to mph conversion
const KM_PER_MILE: f64 = 1.609_344;

/// A geographic location the user can track
///
/// Equality is by `id` only; two locations with the same id are the same
/// place even if their display names differ.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    /// Stable identifier, derived from coordinates unless given explicitly
    pub id: String,
    /// Human-readable name of the place
    pub name: String,
    /// Latitude coordinate
    pub latitude: f64,
    /// Longitude coordinate
    pub longitude: f64,
    /// Country name or code
    #[serde(default)]
    pub country: String,
    /// Optional region (state, province, admin area)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl Location {
    /// Creates a location whose id is derived from its coordinates
    pub fn new(
        name: impl Into<String>,
        latitude: f64,
        longitude: f64,
        country: impl Into<String>,
    ) -> Self {
        Self {
            id: Self::derive_id(latitude, longitude),
            name: name.into(),
            latitude,
            longitude,
            country: country.into(),
            region: None,
        }
    }

    /// Replaces the derived id with an explicit one (e.g. "nyc")
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the region
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Derives the stable id for a pair of coordinates
    ///
    /// Uses the shortest round-trip float formatting so the same coordinates
    /// always map to the same id.
    pub fn derive_id(latitude: f64, longitude: f64) -> String {
        format!("{}_{}", latitude, longitude)
    }

    /// The default location tracked when nothing else is configured
    pub fn new_york() -> Self {
        Self::new("New York", 40.7128, -74.006, "US").with_id("nyc")
    }

    /// Display label, e.g. "Portland, Oregon"
    pub fn label(&self) -> String {
        match self.region.as_deref() {
            Some(region) if !region.is_empty() => format!("{}, {}", self.name, region),
            _ => self.name.clone(),
        }
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Location {}

/// Unit system used for displayed magnitudes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    /// Celsius and km/h
    #[default]
    Metric,
    /// Fahrenheit and mph
    Imperial,
}

impl UnitSystem {
    /// Lowercase name used in keys and preferences
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Metric => "metric",
            Self::Imperial => "imperial",
        }
    }

    /// Parses a unit system name, accepting a few common aliases
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "metric" | "m" | "c" | "celsius" => Some(Self::Metric),
            "imperial" | "i" | "f" | "fahrenheit" => Some(Self::Imperial),
            _ => None,
        }
    }

    /// The other unit system
    pub fn toggled(&self) -> Self {
        match self {
            Self::Metric => Self::Imperial,
            Self::Imperial => Self::Metric,
        }
    }

    pub fn temperature_symbol(&self) -> &'static str {
        match self {
            Self::Metric => "°C",
            Self::Imperial => "°F",
        }
    }

    pub fn wind_speed_symbol(&self) -> &'static str {
        match self {
            Self::Metric => "km/h",
            Self::Imperial => "mph",
        }
    }

    /// Converts a Celsius reading into this unit system
    pub fn temperature_from_celsius(&self, celsius: f64) -> f64 {
        match self {
            Self::Metric => celsius,
            Self::Imperial => celsius * 9.0 / 5.0 + 32.0,
        }
    }

    /// Converts a km/h reading into this unit system
    pub fn wind_speed_from_kmh(&self, kmh: f64) -> f64 {
        match self {
            Self::Metric => kmh,
            Self::Imperial => kmh / KM_PER_MILE,
        }
    }
}

impl fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current conditions at observation time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temperature: f64,
    /// Relative humidity percentage (0-100)
    pub humidity: f64,
    /// Mean sea level pressure
    pub pressure_hpa: f64,
    pub wind_speed: f64,
    pub observed_at: DateTime<Utc>,
}

/// One hour of forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyPoint {
    pub at: DateTime<Utc>,
    pub temperature: f64,
    /// Probability of precipitation in [0, 1]
    pub precipitation_probability: f64,
    pub wind_speed: f64,
}

/// One day of forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub temp_min: f64,
    pub temp_max: f64,
    /// Maximum probability of precipitation in [0, 1]
    pub precipitation_probability: f64,
}

/// Normalized weather data for one location and unit system
///
/// `hourly` and `daily` are ascending by time with no duplicate timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub location_id: String,
    pub units: UnitSystem,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    pub current: CurrentConditions,
    pub hourly: Vec<HourlyPoint>,
    pub daily: Vec<DailyPoint>,
}

impl WeatherSnapshot {
    /// The first `days` daily points (fewer if the forecast is shorter)
    pub fn next_days(&self, days: usize) -> &[DailyPoint] {
        &self.daily[..days.min(self.daily.len())]
    }
}

/// A location subject to periodic refresh
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedLocation {
    pub location: Location,
    /// Stored in the user's favorites
    pub is_favorite: bool,
    /// Pinned for this session (added by search or command line)
    pub is_pinned: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_id_derived_from_coordinates() {
        let loc = Location::new("Paris", 48.8566, 2.3522, "FR");
        assert_eq!(loc.id, "48.8566_2.3522");
        assert_eq!(Location::derive_id(48.8566, 2.3522), loc.id);
    }

    #[test]
    fn test_location_equality_is_by_id() {
        let a = Location::new("Paris", 48.8566, 2.3522, "FR");
        let b = Location::new("Paris, France", 48.8566, 2.3522, "France");
        let c = Location::new("Lyon", 45.764, 4.8357, "FR");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_new_york_has_fixed_id() {
        let nyc = Location::new_york();
        assert_eq!(nyc.id, "nyc");
        assert!((nyc.latitude - 40.7128).abs() < 1e-9);
    }

    #[test]
    fn test_label_includes_region() {
        let loc = Location::new("Portland", 45.5152, -122.6784, "US").with_region("Oregon");
        assert_eq!(loc.label(), "Portland, Oregon");
        assert_eq!(Location::new_york().label(), "New York");
    }

    #[test]
    fn test_unit_system_parse_and_display() {
        assert_eq!(UnitSystem::parse("metric"), Some(UnitSystem::Metric));
        assert_eq!(UnitSystem::parse("Imperial"), Some(UnitSystem::Imperial));
        assert_eq!(UnitSystem::parse("F"), Some(UnitSystem::Imperial));
        assert_eq!(UnitSystem::parse("kelvin"), None);
        assert_eq!(UnitSystem::Imperial.to_string(), "imperial");
        assert_eq!(UnitSystem::Metric.toggled(), UnitSystem::Imperial);
    }

    #[test]
    fn test_unit_conversions() {
        assert!((UnitSystem::Imperial.temperature_from_celsius(100.0) - 212.0).abs() < 1e-9);
        assert!((UnitSystem::Metric.temperature_from_celsius(21.5) - 21.5).abs() < 1e-9);
        assert!((UnitSystem::Imperial.wind_speed_from_kmh(KM_PER_MILE) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_unit_system_serializes_lowercase() {
        let json = serde_json::to_string(&UnitSystem::Imperial).unwrap();
        assert_eq!(json, "\"imperial\"");
    }
}
