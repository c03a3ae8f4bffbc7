//! # Motion Policies
//!
//! Enum-dispatched algorithms that compute the next telemetry state from the
//! current one.
//!
//! ## Available Policies
//!
//! - `Hover` - Hold position with tiny jitter, speed bleeds off (default)
//! - `RandomWalk` - Wander with randomly drifting heading and speed
//!
//! Policies carry configuration only. Any memory of motion lives in the
//! snapshot itself, so a policy can be called repeatedly with unrelated
//! inputs.
//!
//! ## Example
//!
//! ```rust
//! use drone_domain::TelemetrySnapshot;
//! use drone_simulator::policy::MotionPolicy;
//!
//! let policy: MotionPolicy = "random_walk".parse().unwrap();
//! let next = policy.step(&TelemetrySnapshot::new("DRONE-001").with_motion(45.0, 5.0), 1.0);
//! assert!(next.speed >= 0.0);
//! ```

pub mod hover;
pub mod random_walk;

use std::fmt;
use std::str::FromStr;

use drone_domain::TelemetrySnapshot;
use rand::Rng;

use crate::error::SimError;

pub use hover::Hover;
pub use random_walk::RandomWalk;

/// Motion policy enum - determines how the drone moves each tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionPolicy {
    Hover(Hover),
    RandomWalk(RandomWalk),
}

impl MotionPolicy {
    pub fn hover() -> Self {
        Self::Hover(Hover::default())
    }

    pub fn random_walk() -> Self {
        Self::RandomWalk(RandomWalk::default())
    }

    /// Compute the next state. `dt` is seconds since the previous tick;
    /// negative or NaN values are treated as zero.
    #[must_use]
    pub fn step(&self, current: &TelemetrySnapshot, dt: f64) -> TelemetrySnapshot {
        let dt = dt.max(0.0);
        match self {
            Self::Hover(p) => p.step(current, dt),
            Self::RandomWalk(p) => p.step(current, dt),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Hover(_) => "hover",
            Self::RandomWalk(_) => "random_walk",
        }
    }
}

impl Default for MotionPolicy {
    fn default() -> Self {
        Self::hover()
    }
}

impl fmt::Display for MotionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MotionPolicy {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();

        match key.as_str() {
            "hover" => Ok(Self::hover()),
            "randomwalk" => Ok(Self::random_walk()),
            _ => Err(SimError::UnknownPolicy(s.to_string())),
        }
    }
}

/// Uniform sample from `[low, high)`, or `low` when the range is empty.
pub(crate) fn uniform(rng: &mut impl Rng, low: f64, high: f64) -> f64 {
    if low < high { rng.gen_range(low..high) } else { low }
}
