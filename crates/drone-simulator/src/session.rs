//! # Drone Session
//!
//! Command surface for one simulated drone: start, stop, swap policy and
//! toggle failure mode, with a telemetry cache the consumer side reads from.
//!
//! Each run gets its own event channel between the engine and the session.
//! A forwarding task applies the run's ticks to the cache and relays every
//! event to the session's sink. When the run stops its channel closes, the
//! forwarder drains what is left and exits, so after [`DroneSession::stop`]
//! the cache holds the last snapshot the engine produced.

use std::sync::Arc;

use drone_domain::TelemetrySnapshot;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::cache::{SharedTelemetryCache, TelemetryCache};
use crate::config::SimulatorConfig;
use crate::error::Result;
use crate::events::{EventSink, SimulationEvent, TelemetryEvent};
use crate::factory::{create_policy, create_single_drone_simulator};
use crate::worker::EngineWorker;

/// One drone's simulator, worker thread and telemetry cache.
///
/// Must be driven from within a tokio runtime.
pub struct DroneSession {
    config: SimulatorConfig,
    events: EventSink,
    cache: SharedTelemetryCache,
    worker: EngineWorker,
    forwarder: Option<JoinHandle<()>>,
}

impl DroneSession {
    pub fn new(config: SimulatorConfig) -> Self {
        let events = EventSink::new();
        let cache = Arc::new(TelemetryCache::with_threshold(config.low_battery_threshold));
        Self {
            worker: EngineWorker::new(events.clone()),
            config,
            events,
            cache,
            forwarder: None,
        }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn cache(&self) -> SharedTelemetryCache {
        Arc::clone(&self.cache)
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    /// Ticks and operational notices of every run.
    pub fn subscribe_events(&self) -> broadcast::Receiver<SimulationEvent> {
        self.events.subscribe()
    }

    /// Events derived by the cache.
    pub fn subscribe_telemetry(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.cache.subscribe()
    }

    /// Create a simulator running `policy_name` and start it.
    ///
    /// Returns `Ok(false)` if a simulator is already running.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread cannot be started.
    pub fn start(&mut self, policy_name: &str) -> Result<bool> {
        if self.worker.is_running() {
            tracing::warn!(drone_id = %self.config.drone_id, "Session already running");
            return Ok(false);
        }

        let run_events = EventSink::new();
        let forwarder = self
            .cache
            .spawn_forwarder(run_events.subscribe(), self.events.clone());

        let engine = create_single_drone_simulator(
            &self.config.drone_id,
            policy_name,
            &self.config,
            run_events,
        );

        match self.worker.start_simulator(engine) {
            Ok(started) => {
                self.forwarder = Some(forwarder);
                Ok(started)
            }
            Err(e) => {
                forwarder.abort();
                Err(e)
            }
        }
    }

    /// Stop the running simulator and wait until its last tick reached the cache.
    ///
    /// Returns the engine's final state, or `None` if nothing was running.
    /// Blocks the calling thread while the worker joins.
    pub async fn stop(&mut self) -> Option<TelemetrySnapshot> {
        let engine = self.worker.stop_simulator();
        let final_state = engine.map(|e| e.state().clone());

        if let Some(forwarder) = self.forwarder.take() {
            if let Err(e) = forwarder.await {
                tracing::error!(error = %e, "Telemetry forwarder failed");
            }
        }
        final_state
    }

    /// Swap the running simulator's motion policy. Unknown names select hover.
    ///
    /// Returns `false` if nothing is running.
    pub fn set_policy(&self, policy_name: &str) -> bool {
        let policy = create_policy(policy_name);
        self.worker.set_policy(Some(policy))
    }

    /// Forward the failure-mode toggle to the running simulator.
    pub fn set_failure_mode(&self, enabled: bool) -> bool {
        if self.worker.set_failure_mode(enabled) {
            true
        } else {
            self.events
                .notice("failure mode toggle changed but simulator not running");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn fast_config() -> SimulatorConfig {
        SimulatorConfig {
            tick_interval: Duration::from_millis(10),
            ..SimulatorConfig::default()
        }
    }

    #[tokio::test]
    async fn test_start_stop_updates_cache() {
        let mut session = DroneSession::new(SimulatorConfig {
            low_battery_threshold: 5,
            ..fast_config()
        });
        assert_eq!(session.config().tick_interval, Duration::from_millis(10));
        assert_eq!(session.cache().low_battery_threshold(), 5);
        assert!(session.start("hover").unwrap());
        assert!(session.is_running());
        assert!(!session.start("hover").unwrap());

        tokio::time::sleep(Duration::from_millis(80)).await;
        let last = session.stop().await.expect("was running");

        assert!(!session.is_running());
        assert_eq!(session.cache().snapshot(), last);
        assert!(last.battery < 100);
        assert!(session.stop().await.is_none());
    }

    #[tokio::test]
    async fn test_commands_when_stopped() {
        let session = DroneSession::new(fast_config());
        let mut events = session.subscribe_events();

        assert!(!session.set_policy("random_walk"));
        assert!(!session.set_failure_mode(true));
        assert_eq!(
            events.try_recv().unwrap(),
            SimulationEvent::Notice(
                "failure mode toggle changed but simulator not running".to_string()
            )
        );
    }
}
