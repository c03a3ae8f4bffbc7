//! Station-keeping policy.

use drone_domain::{TelemetrySnapshot, drain_battery, normalize_heading};

use super::uniform;

/// Hold position. Lat/lon wobble by at most `position_jitter_deg` per step
/// regardless of `dt`, the heading wanders slightly and speed decays
/// geometrically toward zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hover {
    /// Max per-step lat/lon wobble in degrees
    pub position_jitter_deg: f64,
    /// Max per-step heading wobble in degrees
    pub heading_jitter_deg: f64,
    /// Multiplicative speed factor per step, below 1
    pub speed_decay: f64,
    /// Battery percent drained per second
    pub drain_pct_per_sec: f64,
}

impl Default for Hover {
    fn default() -> Self {
        Self {
            position_jitter_deg: 1e-5,
            heading_jitter_deg: 1.0,
            speed_decay: 0.98,
            drain_pct_per_sec: 0.02,
        }
    }
}

impl Hover {
    pub fn step(&self, current: &TelemetrySnapshot, dt: f64) -> TelemetrySnapshot {
        let mut rng = rand::thread_rng();
        let mut next = current.clone();

        next.latitude += uniform(&mut rng, -1.0, 1.0) * self.position_jitter_deg;
        next.longitude += uniform(&mut rng, -1.0, 1.0) * self.position_jitter_deg;

        next.heading = normalize_heading(
            next.heading + uniform(&mut rng, -self.heading_jitter_deg, self.heading_jitter_deg),
        );

        next.battery = drain_battery(next.battery, dt * self.drain_pct_per_sec);
        next.speed = (next.speed * self.speed_decay).max(0.0);

        next
    }
}
