//! Simulator error types

use thiserror::Error;

/// Simulator errors
///
/// Lifecycle misuse (double start, double stop) and ticks without a policy
/// are not errors; they degrade to logged no-ops.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("Unknown motion policy: '{0}'")]
    UnknownPolicy(String),

    #[error("Failed to spawn simulation thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),

    #[error("Failed to build simulation runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("Simulation thread exited before confirming start")]
    WorkerStartup,

    #[error("Invalid configuration: {key}='{value}'")]
    InvalidConfig { key: String, value: String },
}

pub type Result<T> = std::result::Result<T, SimError>;
