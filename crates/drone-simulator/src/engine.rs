//! Simulation engine: tick scheduling, motion policy application and
//! post-processing for a single drone.

use std::sync::mpsc::SyncSender;
use std::time::Duration;

use chrono::{DateTime, Utc};
use drone_domain::TelemetrySnapshot;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::DEFAULT_TICK_MS;
use crate::events::EventSink;
use crate::policy::{MotionPolicy, uniform};

/// Shortest tick period the run loop accepts.
const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Engine-level post-processing applied after every policy step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineTuning {
    /// Max GPS noise added to lat/lon in degrees
    pub gps_drift_deg: f64,
    /// Chance per tick that the fix is forced to `NoFix`
    pub gps_loss_probability: f64,
    /// Battery percent drawn every tick independent of motion
    pub base_drain_pct: u8,
}

impl Default for EngineTuning {
    fn default() -> Self {
        Self {
            gps_drift_deg: 1e-6,
            gps_loss_probability: 0.01,
            base_drain_pct: 1,
        }
    }
}

/// Engine lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    #[default]
    Idle,
    Running,
}

/// Command delivered to an engine running on its worker thread.
#[derive(Debug)]
pub enum EngineCommand {
    SetPolicy(Option<MotionPolicy>),
    SetFailureMode(bool),
    /// Stop ticking; `ack` fires once the engine is idle.
    Stop { ack: std::sync::mpsc::Sender<()> },
}

/// Drone simulation engine.
///
/// Owns the current snapshot between ticks. Each tick runs the active policy,
/// adds GPS drift, occasionally drops the fix, draws the base battery load
/// and publishes the result on the [`EventSink`].
pub struct SimulationEngine {
    id: String,
    state: TelemetrySnapshot,
    policy: Option<MotionPolicy>,
    status: EngineState,
    last_update: DateTime<Utc>,
    tick_interval: Duration,
    tuning: EngineTuning,
    failure_mode: bool,
    ticks: u64,
    events: EventSink,
}

impl SimulationEngine {
    /// Create an idle engine with no policy for drone `id`.
    pub fn new(id: impl Into<String>, events: EventSink) -> Self {
        let id = id.into();
        Self {
            state: TelemetrySnapshot::new(id.clone()),
            id,
            policy: None,
            status: EngineState::Idle,
            last_update: Utc::now(),
            tick_interval: Duration::from_millis(DEFAULT_TICK_MS),
            tuning: EngineTuning::default(),
            failure_mode: false,
            ticks: 0,
            events,
        }
    }

    /// Replace the starting state. The snapshot id is forced to the engine's id.
    #[must_use]
    pub fn with_initial_state(mut self, mut snapshot: TelemetrySnapshot) -> Self {
        snapshot.id.clone_from(&self.id);
        self.state = snapshot;
        self
    }

    #[must_use]
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval.max(MIN_TICK_INTERVAL);
        self
    }

    #[must_use]
    pub fn with_tuning(mut self, tuning: EngineTuning) -> Self {
        self.tuning = tuning;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: MotionPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current state, as last produced by a tick.
    pub fn state(&self) -> &TelemetrySnapshot {
        &self.state
    }

    pub fn status(&self) -> EngineState {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == EngineState::Running
    }

    pub fn policy(&self) -> Option<MotionPolicy> {
        self.policy
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    pub fn failure_mode(&self) -> bool {
        self.failure_mode
    }

    /// Number of ticks that produced a snapshot.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Idle -> Running. Records the tick reference time.
    pub fn start(&mut self) {
        if self.is_running() {
            tracing::warn!(drone_id = %self.id, "Simulator already running");
            return;
        }
        self.last_update = Utc::now();
        self.status = EngineState::Running;
        self.events.notice(format!("simulator {} started", self.id));
    }

    /// Running -> Idle.
    pub fn stop(&mut self) {
        if !self.is_running() {
            return;
        }
        self.status = EngineState::Idle;
        self.events.notice(format!("simulator {} stopped", self.id));
    }

    /// Swap the active policy. `None` leaves the engine ticking without effect.
    pub fn set_policy(&mut self, policy: Option<MotionPolicy>) {
        self.policy = policy;
        let name = policy.map_or("none", |p| p.name());
        self.events.notice(format!("motion policy switched to {name}"));
    }

    /// Reserved hook: recorded and announced, ticks ignore it.
    pub fn set_failure_mode(&mut self, enabled: bool) {
        self.failure_mode = enabled;
        self.events.notice(format!(
            "failure mode toggled: {}",
            if enabled { "ON" } else { "OFF" }
        ));
    }

    /// Run one periodic tick using the wall-clock time since the previous one.
    ///
    /// Returns `None` when idle or when no policy is assigned.
    pub fn tick(&mut self) -> Option<TelemetrySnapshot> {
        if !self.is_running() || self.policy.is_none() {
            return None;
        }
        let now = Utc::now();
        let dt = elapsed_secs(self.last_update, now);
        self.last_update = now;
        self.advance_at(now, dt)
    }

    /// Step the simulation by `dt` seconds regardless of lifecycle state.
    ///
    /// Returns `None` (and emits nothing) when no policy is assigned.
    #[cfg(test)]
    pub(crate) fn advance(&mut self, dt: f64) -> Option<TelemetrySnapshot> {
        self.advance_at(Utc::now(), dt)
    }

    fn advance_at(&mut self, now: DateTime<Utc>, dt: f64) -> Option<TelemetrySnapshot> {
        let policy = self.policy?;
        let mut rng = rand::thread_rng();

        let mut next = policy.step(&self.state, dt.max(0.0));

        let drift = self.tuning.gps_drift_deg;
        next.latitude += uniform(&mut rng, -drift, drift);
        next.longitude += uniform(&mut rng, -drift, drift);

        if uniform(&mut rng, 0.0, 1.0) < self.tuning.gps_loss_probability {
            next.gps_fix = drone_domain::GpsFix::NoFix;
        }

        next.battery = next.battery.saturating_sub(self.tuning.base_drain_pct);
        next.timestamp_ms = now.timestamp_millis().max(self.state.timestamp_ms);

        self.state = next.clone();
        self.ticks += 1;

        tracing::debug!(
            drone_id = %self.id,
            tick = self.ticks,
            dt,
            lat = next.latitude,
            lon = next.longitude,
            battery = next.battery,
            fix = %next.gps_fix,
            "Tick"
        );

        self.events.tick(next.clone());
        Some(next)
    }

    /// Drive the engine until stopped.
    ///
    /// Starts the engine, confirms through `started`, then ticks every
    /// `tick_interval` while serving `commands` between ticks. A dropped
    /// command channel stops the engine. Returns the idle engine.
    pub async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<EngineCommand>,
        started: SyncSender<()>,
    ) -> Self {
        self.start();
        let _ = started.send(());

        let period = self.tick_interval;
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                command = commands.recv() => {
                    let Some(command) = command else {
                        tracing::warn!(drone_id = %self.id, "Command channel closed");
                        self.stop();
                        break;
                    };
                    if !self.handle(command) {
                        break;
                    }
                }

                _ = interval.tick() => {
                    self.tick();
                }
            }
        }

        self
    }

    /// Apply a command. Returns `false` once the engine has stopped.
    fn handle(&mut self, command: EngineCommand) -> bool {
        match command {
            EngineCommand::SetPolicy(policy) => {
                self.set_policy(policy);
                true
            }
            EngineCommand::SetFailureMode(enabled) => {
                self.set_failure_mode(enabled);
                true
            }
            EngineCommand::Stop { ack } => {
                self.stop();
                let _ = ack.send(());
                false
            }
        }
    }
}

impl std::fmt::Debug for SimulationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationEngine")
            .field("id", &self.id)
            .field("status", &self.status)
            .field("policy", &self.policy.map(|p| p.name()))
            .field("ticks", &self.ticks)
            .field("battery", &self.state.battery)
            .finish_non_exhaustive()
    }
}

/// Seconds between two instants, clamped at zero for clock skew.
#[allow(clippy::cast_precision_loss)]
fn elapsed_secs(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds().max(0) as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SimulationEvent;
    use drone_domain::GpsFix;

    fn quiet_tuning() -> EngineTuning {
        EngineTuning {
            gps_loss_probability: 0.0,
            ..EngineTuning::default()
        }
    }

    #[test]
    fn test_no_policy_is_noop() {
        let sink = EventSink::new();
        let mut rx = sink.subscribe();
        let mut engine = SimulationEngine::new("DRONE-001", sink);

        let before = engine.state().clone();
        assert!(engine.advance(0.5).is_none());
        assert_eq!(engine.state(), &before);
        assert_eq!(engine.ticks(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_tick_while_idle_is_noop() {
        let sink = EventSink::new();
        let mut rx = sink.subscribe();
        let mut engine =
            SimulationEngine::new("DRONE-001", sink).with_policy(MotionPolicy::hover());
        assert_eq!(engine.status(), EngineState::Idle);

        let before = engine.state().clone();
        for _ in 0..5 {
            assert!(engine.tick().is_none());
        }
        assert_eq!(engine.state(), &before);
        assert_eq!(engine.ticks(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_start_stop_transitions() {
        let mut engine = SimulationEngine::new("DRONE-001", EventSink::new());
        engine.start();
        assert!(engine.is_running());
        engine.start();
        assert!(engine.is_running());
        engine.stop();
        assert_eq!(engine.status(), EngineState::Idle);
        engine.stop();
        assert_eq!(engine.status(), EngineState::Idle);
    }

    #[test]
    fn test_running_tick_emits_snapshot() {
        let sink = EventSink::new();
        let mut rx = sink.subscribe();
        let mut engine = SimulationEngine::new("DRONE-001", sink)
            .with_policy(MotionPolicy::hover())
            .with_tuning(quiet_tuning());

        engine.start();
        let snap = engine.tick().expect("policy assigned");
        assert_eq!(snap.battery, 99);
        assert_eq!(snap.id, "DRONE-001");

        // start notice, then the tick
        assert!(matches!(rx.try_recv().unwrap(), SimulationEvent::Notice(_)));
        assert_eq!(rx.try_recv().unwrap(), SimulationEvent::Tick(snap));
    }

    #[test]
    fn test_battery_drains_one_per_tick() {
        let mut engine = SimulationEngine::new("DRONE-001", EventSink::new())
            .with_policy(MotionPolicy::hover())
            .with_tuning(quiet_tuning());

        let mut previous = 100;
        for n in 1..=120u32 {
            let snap = engine.advance(0.5).unwrap();
            assert!(snap.battery <= previous);
            let expected = 100u32.saturating_sub(n);
            assert_eq!(u32::from(snap.battery), expected);
            previous = snap.battery;
        }
    }

    #[test]
    fn test_gps_loss_forced() {
        let mut engine = SimulationEngine::new("DRONE-001", EventSink::new())
            .with_policy(MotionPolicy::hover())
            .with_tuning(EngineTuning {
                gps_loss_probability: 1.0,
                ..EngineTuning::default()
            });
        assert_eq!(engine.advance(0.5).unwrap().gps_fix, GpsFix::NoFix);

        let mut engine = SimulationEngine::new("DRONE-001", EventSink::new())
            .with_policy(MotionPolicy::hover())
            .with_tuning(quiet_tuning());
        for _ in 0..200 {
            assert_eq!(engine.advance(0.5).unwrap().gps_fix, GpsFix::Fix3D);
        }
    }

    #[test]
    fn test_hover_with_drift_stays_close() {
        let mut engine = SimulationEngine::new("DRONE-001", EventSink::new())
            .with_policy(MotionPolicy::hover());
        let mut previous = engine.state().clone();
        for _ in 0..100 {
            let next = engine.advance(0.5).unwrap();
            assert!(previous.displacement_deg(&next) <= 1e-5 + 1e-6);
            previous = next;
        }
    }

    #[test]
    fn test_policy_swap_increases_displacement() {
        let start = TelemetrySnapshot::new("DRONE-001").with_motion(30.0, 20.0);
        let mut engine = SimulationEngine::new("DRONE-001", EventSink::new())
            .with_initial_state(start)
            .with_policy(MotionPolicy::hover())
            .with_tuning(quiet_tuning());

        let before = engine.state().clone();
        let hovered = engine.advance(1.0).unwrap();
        assert!(before.displacement_deg(&hovered) <= 1.1e-5);

        engine.set_policy(Some(MotionPolicy::random_walk()));
        let walked = engine.advance(1.0).unwrap();
        assert!(hovered.displacement_deg(&walked) > 1.1e-5);
    }

    #[test]
    fn test_timestamps_non_decreasing() {
        let mut engine = SimulationEngine::new("DRONE-001", EventSink::new())
            .with_initial_state(TelemetrySnapshot {
                timestamp_ms: i64::MAX / 2,
                ..TelemetrySnapshot::default()
            })
            .with_policy(MotionPolicy::hover());
        let snap = engine.advance(0.5).unwrap();
        assert_eq!(snap.timestamp_ms, i64::MAX / 2);
    }

    #[test]
    fn test_initial_state_keeps_engine_id() {
        let engine = SimulationEngine::new("DRONE-001", EventSink::new())
            .with_initial_state(TelemetrySnapshot::new("other"));
        assert_eq!(engine.state().id, "DRONE-001");
    }

    #[test]
    fn test_elapsed_clamps_skew() {
        let now = Utc::now();
        let earlier = now - chrono::Duration::milliseconds(1500);
        assert!((elapsed_secs(earlier, now) - 1.5).abs() < 1e-9);
        assert_eq!(elapsed_secs(now, earlier), 0.0);
    }

    #[tokio::test]
    async fn test_run_loop_ticks_and_stops() {
        let sink = EventSink::new();
        let mut rx = sink.subscribe();
        let engine = SimulationEngine::new("DRONE-001", sink)
            .with_policy(MotionPolicy::hover())
            .with_tuning(quiet_tuning())
            .with_tick_interval(Duration::from_millis(10));

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (started_tx, started_rx) = std::sync::mpsc::sync_channel(1);
        let handle = tokio::spawn(engine.run(cmd_rx, started_tx));

        time::sleep(Duration::from_millis(120)).await;
        assert!(started_rx.try_recv().is_ok());

        let (ack_tx, ack_rx) = std::sync::mpsc::channel();
        cmd_tx.send(EngineCommand::Stop { ack: ack_tx }).unwrap();
        let engine = handle.await.unwrap();

        assert!(ack_rx.try_recv().is_ok());
        assert_eq!(engine.status(), EngineState::Idle);
        assert!(engine.ticks() >= 3, "ticks {}", engine.ticks());

        let mut last_battery = 100;
        let mut ticks = 0;
        while let Ok(event) = rx.try_recv() {
            if let SimulationEvent::Tick(snap) = event {
                assert!(snap.battery < last_battery);
                last_battery = snap.battery;
                ticks += 1;
            }
        }
        assert_eq!(ticks, engine.ticks());
    }

    #[tokio::test]
    async fn test_closed_command_channel_stops_engine() {
        let engine = SimulationEngine::new("DRONE-001", EventSink::new())
            .with_tick_interval(Duration::from_millis(5));
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (started_tx, _started_rx) = std::sync::mpsc::sync_channel(1);

        drop(cmd_tx);
        let engine = engine.run(cmd_rx, started_tx).await;
        assert_eq!(engine.status(), EngineState::Idle);
        assert_eq!(engine.ticks(), 0);
    }
}
