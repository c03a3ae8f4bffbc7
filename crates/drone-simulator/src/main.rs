//! Drone Simulator CLI
//!
//! Runs one simulated drone on its worker thread and logs the telemetry the
//! cache publishes.

use anyhow::Result;
use clap::Parser;
use drone_simulator::{
    DroneSession, MotionPolicy, SimulatorConfig, TelemetryEvent, VERSION, create_policy,
};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "drone-simulator")]
#[command(about = "Simulate a single drone's telemetry")]
struct Args {
    /// Drone identifier (overrides DRONE_ID)
    #[arg(short = 'i', long)]
    drone_id: Option<String>,

    /// Motion policy: hover or random_walk (overrides SIM_POLICY)
    #[arg(short, long)]
    policy: Option<String>,

    /// Tick interval in milliseconds (overrides SIM_TICK_MS)
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Telemetry updates to observe before stopping
    #[arg(short, long, default_value = "40")]
    duration: u32,

    /// Switch to the other policy after this many updates
    #[arg(long)]
    switch_after: Option<u32>,

    /// Print every snapshot as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Emit log lines as JSON
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let mut config = SimulatorConfig::from_env()?;
    if let Some(id) = args.drone_id.clone() {
        config.drone_id = id;
    }
    if let Some(policy) = args.policy.clone() {
        config.policy = policy;
    }
    if let Some(ms) = args.tick_ms {
        config.tick_interval = Duration::from_millis(ms);
    }

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("drone_simulator={}", config.log_level)));
    let registry = tracing_subscriber::registry().with(filter);
    if args.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    let mut session = DroneSession::new(config);
    let mut telemetry = session.subscribe_telemetry();
    let cache = session.cache();
    let policy_name = session.config().policy.clone();

    info!(
        version = VERSION,
        low_battery_pct = cache.low_battery_threshold(),
        "Starting simulation: {} ({} policy, {:?} ticks)",
        session.config().drone_id,
        policy_name,
        session.config().tick_interval
    );

    session.start(&policy_name)?;
    let mut current = create_policy(&policy_name);
    let mut updates = 0u32;

    while updates < args.duration {
        let event = tokio::select! {
            event = telemetry.recv() => event,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        };

        match event {
            Ok(TelemetryEvent::Updated) => {
                updates += 1;
                let snap = cache.snapshot();
                if args.json {
                    println!("{}", serde_json::to_string(&snap)?);
                }
                info!(
                    at = ?snap.recorded_at(),
                    "Tick {}/{} | {:.6}, {:.6} @ {:.2}m | hdg {:.1} spd {:.2} | batt {}% | GPS {}",
                    updates,
                    args.duration,
                    snap.latitude,
                    snap.longitude,
                    snap.altitude,
                    snap.heading,
                    snap.speed,
                    snap.battery,
                    snap.gps_fix
                );

                if args.switch_after == Some(updates) {
                    let next = match current {
                        MotionPolicy::Hover(_) => "random_walk",
                        MotionPolicy::RandomWalk(_) => "hover",
                    };
                    info!("Switching policy: {} -> {}", current, next);
                    session.set_policy(next);
                    current = create_policy(next);
                }
            }
            Ok(TelemetryEvent::BatteryLow(pct)) => warn!("Battery low: {}%", pct),
            Ok(TelemetryEvent::GpsFixChanged(fix)) => {
                if !fix.has_position() {
                    warn!("GPS fix lost");
                }
            }
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "Telemetry consumer lagged"),
            Err(RecvError::Closed) => break,
        }
    }

    match session.stop().await {
        Some(last) => info!(
            "Simulation complete: {} ticks observed, battery {}%, GPS {}",
            updates, last.battery, last.gps_fix
        ),
        None => info!("Simulation complete"),
    }

    Ok(())
}
