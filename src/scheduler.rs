//! Background refresh scheduler
//!
//! Periodically refreshes every tracked location, fetches newly tracked
//! locations right away, and accepts manual "refresh now" requests over a
//! tokio channel. Stopping cancels the timer loop; fetches already
//! dispatched run to completion and still land in the cache and state store.

use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::context::WeatherContext;
use crate::data::{Location, UnitSystem};
use crate::registry::RegistryEvent;

/// Configuration for the refresh loop
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Interval between automatic refreshes
    pub interval: Duration,
    /// Whether interval ticks are issued at all
    pub auto_refresh: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            auto_refresh: true,
        }
    }
}

/// Requests sent from the handle to the refresh loop
#[derive(Debug)]
enum Command {
    /// Refresh one location by id, or all tracked locations
    RefreshNow(Option<String>),
}

/// Handle for controlling the background refresh loop
pub struct RefreshScheduler {
    commands: mpsc::Sender<Command>,
    units: watch::Sender<UnitSystem>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl RefreshScheduler {
    /// Spawns the refresh loop for `context`'s registry
    ///
    /// The first tick fires immediately, so every tracked location is loaded
    /// on start when auto-refresh is on.
    pub fn spawn(context: WeatherContext, units: UnitSystem, config: RefreshConfig) -> Self {
        let (commands, command_rx) = mpsc::channel(32);
        let (units_tx, units_rx) = watch::channel(units);
        let cancel = CancellationToken::new();
        // Subscribe before spawning so no add is missed
        let registry_events = context.registry.subscribe();

        info!(
            interval_secs = config.interval.as_secs(),
            auto_refresh = config.auto_refresh,
            units = %units,
            "starting refresh scheduler"
        );

        let task = tokio::spawn(run(
            context,
            config,
            command_rx,
            units_rx,
            registry_events,
            cancel.clone(),
        ));

        Self {
            commands,
            units: units_tx,
            cancel,
            task,
        }
    }

    /// Requests an immediate refresh of one location, or of all when `None`
    ///
    /// Still subject to the cache TTL and in-flight deduplication. Returns
    /// `false` if the scheduler has stopped.
    pub async fn refresh_now(&self, location_id: Option<&str>) -> bool {
        self.commands
            .send(Command::RefreshNow(location_id.map(str::to_string)))
            .await
            .is_ok()
    }

    /// Switches the unit system; a change triggers one refresh of all locations
    pub fn set_units(&self, units: UnitSystem) {
        self.units.send_if_modified(|current| {
            if *current == units {
                false
            } else {
                *current = units;
                true
            }
        });
    }

    pub fn units(&self) -> UnitSystem {
        *self.units.borrow()
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stops the loop and waits for it to exit
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "refresh loop ended abnormally");
        }
    }
}

async fn run(
    context: WeatherContext,
    config: RefreshConfig,
    mut commands: mpsc::Receiver<Command>,
    mut units: watch::Receiver<UnitSystem>,
    mut registry_events: broadcast::Receiver<RegistryEvent>,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(config.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            _ = interval.tick(), if config.auto_refresh => {
                let current = *units.borrow();
                dispatch(&context, context.registry.locations(), current);
            }

            Some(command) = commands.recv() => {
                let current = *units.borrow();
                match command {
                    Command::RefreshNow(None) => {
                        dispatch(&context, context.registry.locations(), current);
                    }
                    Command::RefreshNow(Some(id)) => match context.registry.get(&id) {
                        Some(tracked) => dispatch(&context, vec![tracked.location], current),
                        None => debug!(location = %id, "refresh requested for untracked location"),
                    },
                }
            }

            event = registry_events.recv() => {
                let current = *units.borrow();
                match event {
                    Ok(RegistryEvent::Added(location)) => dispatch(&context, vec![location], current),
                    Ok(RegistryEvent::Removed(_)) => {}
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "registry events lagged, refreshing all locations");
                        dispatch(&context, context.registry.locations(), current);
                    }
                    // The registry lives in the context we hold
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            changed = units.changed() => {
                if changed.is_err() {
                    // Handle dropped without stop()
                    break;
                }
                let current = *units.borrow_and_update();
                info!(units = %current, "unit system changed, refreshing all locations");
                dispatch(&context, context.registry.locations(), current);
            }
        }
    }

    info!("refresh scheduler stopped");
}

/// Fetches `locations` concurrently in a detached task
///
/// One location failing does not affect the others; failures are already
/// recorded in the state store by the coordinator.
fn dispatch(context: &WeatherContext, locations: Vec<Location>, units: UnitSystem) {
    if locations.is_empty() {
        return;
    }

    let coordinator = context.coordinator.clone();
    tokio::spawn(async move {
        let fetches = locations
            .iter()
            .map(|location| coordinator.fetch_snapshot(location, units));
        let results = futures::future::join_all(fetches).await;
        let failed = results.iter().filter(|r| r.is_err()).count();
        debug!(total = results.len(), failed, "refresh cycle finished");
    });
}
