//! skywatch - current conditions for the places you track
//!
//! Prints one line per location whenever a refresh completes, until Ctrl-C.
//! With `--once` it fetches everything a single time and exits.

use std::process::ExitCode;

use clap::Parser;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use skywatch::cache::SnapshotKey;
use skywatch::cli::{Cli, StartupConfig};
use skywatch::config::{CacheBackendKind, Config};
use skywatch::context::WeatherContext;
use skywatch::data::{Location, UnitSystem, WeatherSnapshot};
use skywatch::preferences::{PreferenceStore, Preferences};
use skywatch::scheduler::{RefreshConfig, RefreshScheduler};
use skywatch::state::{FetchStatus, StateUpdate};

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn format_snapshot(location: &Location, snapshot: &WeatherSnapshot) -> String {
    let units = snapshot.units;
    let current = &snapshot.current;
    let mut line = format!(
        "{}: {:.1}{} humidity {:.0}% wind {:.1} {} pressure {:.0} hPa",
        location.label(),
        current.temperature,
        units.temperature_symbol(),
        current.humidity,
        current.wind_speed,
        units.wind_speed_symbol(),
        current.pressure_hpa,
    );
    if let Some(today) = snapshot.next_days(1).first() {
        line.push_str(&format!(
            " | today {:.0}..{:.0}{} rain {:.0}%",
            today.temp_min,
            today.temp_max,
            units.temperature_symbol(),
            today.precipitation_probability * 100.0
        ));
    }
    line
}

/// Prints the latest result for `key`; returns false if it failed
fn print_result(context: &WeatherContext, key: &SnapshotKey) -> bool {
    let Some(tracked) = context.registry.get(&key.location_id) else {
        return true;
    };
    let result = context.state.get(key);
    match (result.status, &result.snapshot, &result.error) {
        (FetchStatus::Succeeded, Some(snapshot), _) => {
            println!("{}", format_snapshot(&tracked.location, snapshot));
            true
        }
        (FetchStatus::Failed, snapshot, error) => {
            let reason = error
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".to_string());
            match snapshot {
                Some(stale) => println!(
                    "{}: refresh failed ({}), last known: {}",
                    tracked.location.label(),
                    reason,
                    format_snapshot(&tracked.location, stale)
                ),
                None => println!("{}: unavailable ({})", tracked.location.label(), reason),
            }
            false
        }
        _ => true,
    }
}

fn seed_registry(context: &WeatherContext, startup: &StartupConfig, prefs: &mut Preferences) {
    for location in &prefs.favorites {
        context.registry.add_favorite(location.clone());
    }
    for city in &startup.cities {
        context.registry.add(city.clone());
        if startup.favorite {
            context.registry.add_favorite(city.clone());
            prefs.add_favorite(city.clone());
        }
    }
    if context.registry.is_empty() {
        context.registry.add(Location::new_york());
    }
}

async fn run_once(context: &WeatherContext, units: UnitSystem) -> ExitCode {
    let locations = context.registry.locations();
    let fetches = locations
        .iter()
        .map(|location| context.coordinator.fetch_snapshot(location, units));
    futures::future::join_all(fetches).await;

    let mut all_ok = true;
    for location in &locations {
        all_ok &= print_result(context, &SnapshotKey::new(location.id.clone(), units));
    }
    if all_ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

async fn run_watch(context: &WeatherContext, units: UnitSystem, refresh: RefreshConfig) {
    let mut updates = context.state.subscribe();
    let auto_refresh = refresh.auto_refresh;
    let scheduler = RefreshScheduler::spawn(context.clone(), units, refresh);
    if !auto_refresh {
        // No ticks will come, so load once up front
        scheduler.refresh_now(None).await;
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, shutting down");
                break;
            }
            update = updates.recv() => match update {
                Ok(StateUpdate { key, status }) => {
                    if matches!(status, FetchStatus::Succeeded | FetchStatus::Failed)
                        && key.units == scheduler.units()
                    {
                        print_result(context, &key);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "display fell behind state updates");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    scheduler.stop().await;
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Validate arguments before anything touches disk or network
    let startup = match StartupConfig::from_cli(&cli) {
        Ok(startup) => startup,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(ExitCode::from(2));
        }
    };

    init_tracing();

    let mut config = match &startup.config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if startup.memory_cache {
        config.cache_backend = CacheBackendKind::Memory;
    }
    config.validate()?;

    let pref_store = PreferenceStore::new();
    let mut prefs = pref_store
        .as_ref()
        .map(PreferenceStore::load)
        .unwrap_or_default();
    if let Some(units) = startup.units {
        prefs.units = units;
    }

    let context = WeatherContext::from_config(&config)?;
    seed_registry(&context, &startup, &mut prefs);

    if let Some(store) = &pref_store {
        if let Err(e) = store.save(&prefs) {
            warn!(path = %store.path().display(), error = %e, "failed to save preferences");
        }
    }

    if startup.once {
        return Ok(run_once(&context, prefs.units).await);
    }

    let refresh = RefreshConfig {
        interval: config.refresh_interval(),
        // --no-auto-refresh applies to this session only
        auto_refresh: startup.auto_refresh.unwrap_or(prefs.auto_refresh),
    };
    run_watch(&context, prefs.units, refresh).await;

    Ok(ExitCode::SUCCESS)
}
