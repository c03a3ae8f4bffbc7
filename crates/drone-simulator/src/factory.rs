//! Construction of motion policies and ready-to-run simulators.

use crate::config::SimulatorConfig;
use crate::engine::SimulationEngine;
use crate::events::EventSink;
use crate::policy::MotionPolicy;

/// Build the policy called `name`.
///
/// Unrecognized names fall back to [`MotionPolicy::hover`].
pub fn create_policy(name: &str) -> MotionPolicy {
    name.parse().unwrap_or_else(|err| {
        tracing::debug!(error = %err, "Falling back to hover policy");
        MotionPolicy::hover()
    })
}

/// Build an idle engine for `drone_id` from `config`, with the policy called
/// `policy_name` installed.
pub fn create_single_drone_simulator(
    drone_id: &str,
    policy_name: &str,
    config: &SimulatorConfig,
    events: EventSink,
) -> SimulationEngine {
    let policy = create_policy(policy_name);
    let initial = config.initial_snapshot();

    let engine = SimulationEngine::new(drone_id, events)
        .with_initial_state(initial)
        .with_tick_interval(config.tick_interval)
        .with_tuning(config.tuning)
        .with_policy(policy);

    tracing::info!(
        drone_id,
        policy = policy.name(),
        tick = ?config.tick_interval,
        "Created simulator"
    );
    engine
}
