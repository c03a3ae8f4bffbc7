//! Events published by the simulator.
//!
//! The engine and worker report through an [`EventSink`] handed to them at
//! construction; there is no process-wide logger.

use drone_domain::{GpsFix, TelemetrySnapshot};
use tokio::sync::broadcast;

/// Broadcast channel capacity
pub const CHANNEL_CAPACITY: usize = 1024;

/// Event emitted by the simulation engine and its worker.
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationEvent {
    /// New state produced by a tick
    Tick(TelemetrySnapshot),
    /// Operational notice, e.g. "simulator started"
    Notice(String),
}

/// Event derived by the telemetry cache from each published snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryEvent {
    Updated,
    BatteryLow(u8),
    GpsFixChanged(GpsFix),
}

/// Cloneable handle for publishing simulation events.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: broadcast::Sender<SimulationEvent>,
}

impl EventSink {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SimulationEvent> {
        self.tx.subscribe()
    }

    /// Publish a tick. Having no subscribers is not an error.
    pub fn tick(&self, snapshot: TelemetrySnapshot) {
        let _ = self.tx.send(SimulationEvent::Tick(snapshot));
    }

    /// Re-publish an event received from another sink.
    pub fn relay(&self, event: SimulationEvent) {
        let _ = self.tx.send(event);
    }

    /// Publish an operational notice and mirror it to the log.
    pub fn notice(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(notice = %message);
        let _ = self.tx.send(SimulationEvent::Notice(message));
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new()
    }
}
