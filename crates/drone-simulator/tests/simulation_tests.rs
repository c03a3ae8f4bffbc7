use std::time::Duration;

use drone_domain::{GpsFix, TelemetrySnapshot};
use drone_simulator::*;
use tokio::sync::broadcast;

fn no_gps_loss() -> EngineTuning {
    EngineTuning {
        gps_loss_probability: 0.0,
        ..EngineTuning::default()
    }
}

fn next_tick(rx: &mut broadcast::Receiver<SimulationEvent>) -> TelemetrySnapshot {
    loop {
        match rx.blocking_recv().expect("engine event") {
            SimulationEvent::Tick(snap) => return snap,
            SimulationEvent::Notice(_) => {}
        }
    }
}

#[test]
fn test_hover_battery_drains_one_per_tick_on_worker_thread() {
    let events = EventSink::new();
    let mut rx = events.subscribe();
    let engine = SimulationEngine::new("DRONE-001", events.clone())
        .with_policy(MotionPolicy::hover())
        .with_tuning(no_gps_loss())
        .with_tick_interval(Duration::from_millis(5));

    let mut worker = EngineWorker::new(events);
    assert!(worker.start_simulator(engine).unwrap());

    let mut previous = 100u8;
    for n in 1..=30u8 {
        let snap = next_tick(&mut rx);
        assert!(snap.battery <= previous);
        assert_eq!(snap.battery, 100 - n);
        assert_eq!(snap.gps_fix, GpsFix::Fix3D);
        assert!((0.0..360.0).contains(&snap.heading));
        previous = snap.battery;
    }

    let engine = worker.stop_simulator().unwrap();
    assert_eq!(engine.status(), EngineState::Idle);
    assert!(engine.ticks() >= 30);
}

#[test]
fn test_policy_swap_while_running() {
    let events = EventSink::new();
    let mut rx = events.subscribe();
    let engine = SimulationEngine::new("DRONE-001", events.clone())
        .with_initial_state(TelemetrySnapshot::new("DRONE-001").with_motion(45.0, 50.0))
        .with_policy(MotionPolicy::hover())
        .with_tuning(no_gps_loss())
        .with_tick_interval(Duration::from_millis(100));

    let mut worker = EngineWorker::new(events);
    worker.start_simulator(engine).unwrap();

    let first = next_tick(&mut rx);
    let mut previous = next_tick(&mut rx);
    assert!(first.displacement_deg(&previous) <= 1.1e-5);

    assert!(worker.set_policy(Some(MotionPolicy::random_walk())));

    let mut exceeded = false;
    for _ in 0..10 {
        let next = next_tick(&mut rx);
        if previous.displacement_deg(&next) > 1.1e-5 {
            exceeded = true;
            break;
        }
        previous = next;
    }
    worker.stop_simulator();

    assert!(exceeded, "random walk never moved further than hover jitter");
}

#[test]
fn test_stop_twice_matches_stop_once() {
    let events = EventSink::new();
    let mut worker = EngineWorker::new(events.clone());
    worker
        .start_simulator(
            SimulationEngine::new("DRONE-001", events)
                .with_tick_interval(Duration::from_millis(5)),
        )
        .unwrap();

    let first = worker.stop_simulator();
    assert!(first.is_some_and(|e| e.status() == EngineState::Idle));
    assert!(!worker.is_running());

    assert!(worker.stop_simulator().is_none());
    assert!(!worker.is_running());
}

#[test]
fn test_worker_restarts_after_stop() {
    let events = EventSink::new();
    let mut worker = EngineWorker::new(events.clone());

    for _ in 0..3 {
        let engine = SimulationEngine::new("DRONE-001", events.clone())
            .with_policy(MotionPolicy::hover())
            .with_tick_interval(Duration::from_millis(5));
        assert!(worker.start_simulator(engine).unwrap());
        assert!(worker.stop_simulator().is_some());
    }
}

#[tokio::test]
async fn test_session_raises_battery_low_from_worker_ticks() {
    let config = SimulatorConfig {
        tick_interval: Duration::from_millis(10),
        low_battery_threshold: 99,
        tuning: no_gps_loss(),
        ..SimulatorConfig::default()
    };
    let mut session = DroneSession::new(config);
    let mut telemetry = session.subscribe_telemetry();

    session.start("hover").unwrap();

    let mut saw_low = None;
    for _ in 0..3 {
        let event = tokio::time::timeout(Duration::from_secs(2), telemetry.recv())
            .await
            .expect("telemetry within timeout")
            .unwrap();
        if let TelemetryEvent::BatteryLow(pct) = event {
            saw_low = Some(pct);
            break;
        }
    }
    assert_eq!(saw_low, Some(99));

    let last = session.stop().await.unwrap();
    assert_eq!(session.cache().snapshot(), last);
}

#[tokio::test]
async fn test_session_policy_swap_and_notices() {
    let config = SimulatorConfig {
        tick_interval: Duration::from_millis(10),
        ..SimulatorConfig::default()
    };
    let mut session = DroneSession::new(config);
    let mut events = session.subscribe_events();

    session.start("not-a-policy").unwrap();
    assert!(session.set_policy("random_walk"));
    assert!(session.set_failure_mode(true));
    tokio::time::sleep(Duration::from_millis(50)).await;
    session.stop().await.unwrap();

    let mut notices = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SimulationEvent::Notice(message) = event {
            notices.push(message);
        }
    }

    assert!(notices.contains(&"simulator DRONE-001 started".to_string()));
    assert!(notices.contains(&"motion policy switched to random_walk".to_string()));
    assert!(notices.contains(&"failure mode toggled: ON".to_string()));
    assert!(notices.contains(&"simulator DRONE-001 stopped".to_string()));
    assert!(notices.contains(&"worker: thread stopped".to_string()));
}
