//! Conversion of raw Open-Meteo forecasts into [`WeatherSnapshot`]s
//!
//! `normalize` is deterministic: it never reads the wall clock, so the same
//! raw document always yields the same snapshot and can be cached as-is.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

use super::open_meteo::{ForecastResponse, RawCurrent, RawDaily, RawHourly};
use super::{CurrentConditions, DailyPoint, HourlyPoint, Location, UnitSystem, WeatherSnapshot};
use crate::error::FetchError;

/// Maps a raw forecast onto the canonical snapshot for `location` in `units`
///
/// Upstream values are in °C, km/h and hPa; temperatures and wind speeds are
/// converted for imperial output. Missing precipitation probabilities
/// become 0.
///
/// # Errors
/// `FetchError::MalformedResponse` if a required block or field is missing,
/// a timestamp is out of range, parallel arrays differ in length, or a
/// series is not strictly chronological.
pub fn normalize(
    raw: &ForecastResponse,
    location: &Location,
    units: UnitSystem,
) -> Result<WeatherSnapshot, FetchError> {
    let offset = Duration::seconds(i64::from(raw.utc_offset_seconds));

    let current = raw.current.as_ref().ok_or_else(|| missing("current"))?;
    let hourly = raw.hourly.as_ref().ok_or_else(|| missing("hourly"))?;
    let daily = raw.daily.as_ref().ok_or_else(|| missing("daily"))?;

    Ok(WeatherSnapshot {
        location_id: location.id.clone(),
        units,
        timezone: raw.timezone.clone(),
        current: normalize_current(current, units)?,
        hourly: normalize_hourly(hourly, units)?,
        daily: normalize_daily(daily, offset, units)?,
    })
}

fn normalize_current(current: &RawCurrent, units: UnitSystem) -> Result<CurrentConditions, FetchError> {
    let time = current.time.ok_or_else(|| missing("current.time"))?;

    Ok(CurrentConditions {
        temperature: units
            .temperature_from_celsius(required(current.temperature_2m, "current.temperature_2m")?),
        humidity: required(current.relative_humidity_2m, "current.relative_humidity_2m")?,
        pressure_hpa: required(current.pressure_msl, "current.pressure_msl")?,
        wind_speed: units
            .wind_speed_from_kmh(required(current.wind_speed_10m, "current.wind_speed_10m")?),
        observed_at: instant(time)?,
    })
}

fn normalize_hourly(hourly: &RawHourly, units: UnitSystem) -> Result<Vec<HourlyPoint>, FetchError> {
    let len = hourly.time.len();
    check_len("hourly.temperature_2m", hourly.temperature_2m.len(), len)?;
    check_len("hourly.wind_speed_10m", hourly.wind_speed_10m.len(), len)?;
    if let Some(probabilities) = &hourly.precipitation_probability {
        check_len("hourly.precipitation_probability", probabilities.len(), len)?;
    }

    let mut points: Vec<HourlyPoint> = Vec::with_capacity(len);
    for (i, &time) in hourly.time.iter().enumerate() {
        let at = instant(time)?;
        if let Some(prev) = points.last() {
            if at <= prev.at {
                return Err(FetchError::malformed(format!(
                    "hourly.time not strictly ascending at index {}",
                    i
                )));
            }
        }
        points.push(HourlyPoint {
            at,
            temperature: units.temperature_from_celsius(hourly.temperature_2m[i]),
            precipitation_probability: probability(hourly.precipitation_probability.as_deref(), i),
            wind_speed: units.wind_speed_from_kmh(hourly.wind_speed_10m[i]),
        });
    }

    Ok(points)
}

fn normalize_daily(
    daily: &RawDaily,
    offset: Duration,
    units: UnitSystem,
) -> Result<Vec<DailyPoint>, FetchError> {
    let len = daily.time.len();
    check_len("daily.temperature_2m_max", daily.temperature_2m_max.len(), len)?;
    check_len("daily.temperature_2m_min", daily.temperature_2m_min.len(), len)?;
    if let Some(probabilities) = &daily.precipitation_probability_max {
        check_len("daily.precipitation_probability_max", probabilities.len(), len)?;
    }

    let mut points: Vec<DailyPoint> = Vec::with_capacity(len);
    for (i, &time) in daily.time.iter().enumerate() {
        let date = local_date(time, offset)?;
        if let Some(prev) = points.last() {
            if date <= prev.date {
                return Err(FetchError::malformed(format!(
                    "daily.time not strictly ascending at index {}",
                    i
                )));
            }
        }
        points.push(DailyPoint {
            date,
            temp_min: units.temperature_from_celsius(daily.temperature_2m_min[i]),
            temp_max: units.temperature_from_celsius(daily.temperature_2m_max[i]),
            precipitation_probability: probability(daily.precipitation_probability_max.as_deref(), i),
        });
    }

    Ok(points)
}

fn instant(unix_seconds: i64) -> Result<DateTime<Utc>, FetchError> {
    Utc.timestamp_opt(unix_seconds, 0)
        .single()
        .ok_or_else(|| FetchError::malformed(format!("timestamp out of range: {}", unix_seconds)))
}

/// Calendar date of a day that starts at local midnight `unix_seconds`
///
/// `offset` is the request-time offset, which can be an hour away from the
/// offset in force on that day when the series crosses a DST change. Rounding
/// to the nearest day absorbs that hour.
fn local_date(unix_seconds: i64, offset: Duration) -> Result<NaiveDate, FetchError> {
    let midnight = instant(unix_seconds)? + offset;
    Ok((midnight + Duration::hours(12)).date_naive())
}

/// Percent value at `index` scaled to [0, 1]; absent or null is 0
fn probability(values: Option<&[Option<f64>]>, index: usize) -> f64 {
    values
        .and_then(|v| v.get(index).copied().flatten())
        .map(|percent| (percent / 100.0).clamp(0.0, 1.0))
        .unwrap_or(0.0)
}

fn required(value: Option<f64>, field: &str) -> Result<f64, FetchError> {
    value.ok_or_else(|| missing(field))
}

fn missing(field: &str) -> FetchError {
    FetchError::malformed(format!("missing required field: {}", field))
}

fn check_len(field: &str, actual: usize, expected: usize) -> Result<(), FetchError> {
    if actual != expected {
        return Err(FetchError::malformed(format!(
            "{} has {} entries, expected {} to match time",
            field, actual, expected
        )));
    }
    Ok(())
}
