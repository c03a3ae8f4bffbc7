//! # Telemetry Cache
//!
//! Thread-safe holder of the latest published snapshot.
//!
//! The simulation thread writes, the consumer side reads. Every update is
//! followed by derived notifications on the cache's own broadcast channel:
//! `Updated`, `BatteryLow` at or below the threshold, and `GpsFixChanged`
//! carrying the new fix. `GpsFixChanged` fires on every update, not only
//! when the fix differs from the previous value.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use drone_domain::TelemetrySnapshot;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::DEFAULT_LOW_BATTERY_PCT;
use crate::events::{CHANNEL_CAPACITY, EventSink, SimulationEvent, TelemetryEvent};

/// Shared handle to a [`TelemetryCache`].
pub type SharedTelemetryCache = Arc<TelemetryCache>;

/// Latest-snapshot cache with derived events.
#[derive(Debug)]
pub struct TelemetryCache {
    latest: Mutex<TelemetrySnapshot>,
    low_battery_threshold: u8,
    tx: broadcast::Sender<TelemetryEvent>,
}

impl TelemetryCache {
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_LOW_BATTERY_PCT)
    }

    /// Cache raising `BatteryLow` when battery is at or below `threshold` percent.
    pub fn with_threshold(threshold: u8) -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            latest: Mutex::new(TelemetrySnapshot::default()),
            low_battery_threshold: threshold,
            tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.tx.subscribe()
    }

    pub fn low_battery_threshold(&self) -> u8 {
        self.low_battery_threshold
    }

    /// Copy of the most recently stored snapshot.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.lock().clone()
    }

    /// Store `snap` and publish derived events once the lock is released.
    pub fn update_from_simulator(&self, snap: TelemetrySnapshot) {
        let battery = snap.battery;
        let fix = snap.gps_fix;

        *self.lock() = snap;

        let _ = self.tx.send(TelemetryEvent::Updated);
        if battery <= self.low_battery_threshold {
            tracing::warn!(battery, "Battery low");
            let _ = self.tx.send(TelemetryEvent::BatteryLow(battery));
        }
        let _ = self.tx.send(TelemetryEvent::GpsFixChanged(fix));
    }

    /// Spawn a task that feeds ticks from `rx` into the cache and relays
    /// every received event to `relay`, until the channel closes.
    ///
    /// Ticks are stored before they are relayed, so a relayed snapshot is
    /// already visible through [`snapshot`](Self::snapshot). Must be called
    /// from within a tokio runtime.
    pub fn spawn_forwarder(
        self: &Arc<Self>,
        mut rx: broadcast::Receiver<SimulationEvent>,
        relay: EventSink,
    ) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if let SimulationEvent::Tick(snap) = &event {
                            cache.update_from_simulator(snap.clone());
                        }
                        relay.relay(event);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Telemetry forwarder lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    // The guarded value is a plain copy, so a poisoned lock is still consistent.
    fn lock(&self) -> MutexGuard<'_, TelemetrySnapshot> {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for TelemetryCache {
    fn default() -> Self {
        Self::new()
    }
}
