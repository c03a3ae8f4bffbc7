//! # Drone Simulator
//!
//! Single-drone telemetry simulator. A [`SimulationEngine`] ticks on its own
//! thread under an [`EngineWorker`], applies a pluggable [`MotionPolicy`] plus
//! GPS drift, signal loss and battery drain, and publishes each snapshot to a
//! thread-safe [`TelemetryCache`] read by the consumer side.
//!
//! ## Features
//!
//! - Hover and random-walk motion policies, swappable while running
//! - Dedicated simulation thread with acknowledged, joined shutdown
//! - Broadcast events for ticks, notices and derived telemetry alerts
//! - Environment-based configuration

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod factory;
pub mod policy;
pub mod session;
pub mod worker;

pub use cache::{SharedTelemetryCache, TelemetryCache};
pub use config::SimulatorConfig;
pub use engine::{EngineState, EngineTuning, SimulationEngine};
pub use error::{Result, SimError};
pub use events::{EventSink, SimulationEvent, TelemetryEvent};
pub use factory::{create_policy, create_single_drone_simulator};
pub use policy::MotionPolicy;
pub use session::DroneSession;
pub use worker::EngineWorker;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
