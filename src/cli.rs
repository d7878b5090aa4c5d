//! Command-line interface parsing for skywatch
//!
//! This module handles parsing of CLI arguments using clap, including the
//! repeatable --city flag and the unit system override.

use clap::Parser;
use std::path::PathBuf;
use thiserror::Error;

use crate::data::{Location, UnitSystem};

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// The city argument is not of the form NAME@LAT,LON
    #[error("Invalid city: '{0}'. Expected NAME@LAT,LON, e.g. Paris@48.8566,2.3522")]
    InvalidCity(String),

    /// The unit system name is not recognized
    #[error("Invalid units: '{0}'. Valid units: metric, imperial")]
    InvalidUnits(String),
}

/// skywatch - Current conditions and forecasts for the places you track
#[derive(Parser, Debug)]
#[command(name = "skywatch")]
#[command(about = "Multi-location weather conditions with automatic refresh")]
#[command(version)]
pub struct Cli {
    /// Track a city for this session, as NAME@LAT,LON (repeatable)
    ///
    /// Examples:
    ///   skywatch --city Paris@48.8566,2.3522
    ///   skywatch --city Oslo@59.91,10.75 --city Lima@-12.05,-77.04
    #[arg(long = "city", value_name = "NAME@LAT,LON")]
    pub cities: Vec<String>,

    /// Unit system for displayed values (metric or imperial); saved as the new preference
    #[arg(long, value_name = "UNITS")]
    pub units: Option<String>,

    /// Also save the --city locations as favorites
    #[arg(long)]
    pub favorite: bool,

    /// Fetch every location once, print the results and exit
    #[arg(long)]
    pub once: bool,

    /// Disable periodic refresh; locations are still fetched when added
    #[arg(long)]
    pub no_auto_refresh: bool,

    /// Keep the cache in memory instead of on disk
    #[arg(long)]
    pub memory_cache: bool,

    /// Read configuration from PATH instead of the default location
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Configuration derived from CLI arguments for application startup
#[derive(Debug, Clone, Default)]
pub struct StartupConfig {
    /// Locations given with --city
    pub cities: Vec<Location>,
    /// Unit system override, if --units was given
    pub units: Option<UnitSystem>,
    pub favorite: bool,
    pub once: bool,
    pub auto_refresh: Option<bool>,
    pub memory_cache: bool,
    pub config_path: Option<PathBuf>,
}

/// Parses a NAME@LAT,LON city argument into a Location.
///
/// The location id is derived from the coordinates.
pub fn parse_city_arg(s: &str) -> Result<Location, CliError> {
    let invalid = || CliError::InvalidCity(s.to_string());

    let (name, coords) = s.rsplit_once('@').ok_or_else(invalid)?;
    let name = name.trim();
    if name.is_empty() {
        return Err(invalid());
    }

    let (lat, lon) = coords.split_once(',').ok_or_else(invalid)?;
    let latitude: f64 = lat.trim().parse().map_err(|_| invalid())?;
    let longitude: f64 = lon.trim().parse().map_err(|_| invalid())?;
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(invalid());
    }

    Ok(Location::new(name, latitude, longitude, ""))
}

/// Parses a unit system argument.
pub fn parse_units_arg(s: &str) -> Result<UnitSystem, CliError> {
    UnitSystem::parse(s).ok_or_else(|| CliError::InvalidUnits(s.to_string()))
}

impl StartupConfig {
    /// Creates a StartupConfig from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(StartupConfig)` with appropriate settings
    /// * `Err(CliError)` if a city or the unit system is invalid
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let cities = cli
            .cities
            .iter()
            .map(|c| parse_city_arg(c))
            .collect::<Result<Vec<_>, _>>()?;
        let units = cli.units.as_deref().map(parse_units_arg).transpose()?;

        Ok(StartupConfig {
            cities,
            units,
            favorite: cli.favorite,
            once: cli.once,
            // Only an explicit flag overrides the saved preference
            auto_refresh: cli.no_auto_refresh.then_some(false),
            memory_cache: cli.memory_cache,
            config_path: cli.config.clone(),
        })
    }
}
