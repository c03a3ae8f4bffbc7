//! Random-walk policy.

use drone_domain::{TelemetrySnapshot, drain_battery, normalize_heading};

use super::uniform;

/// Flat-earth degrees of latitude per meter.
pub const DEG_PER_METER: f64 = 1.0 / 111_320.0;

/// Floor for `cos(latitude)` when converting meters to degrees of longitude.
const MIN_COS_LATITUDE: f64 = 1e-6;

/// Wander: heading and speed drift by per-second random deltas and the
/// position advances along the heading by `speed * dt`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RandomWalk {
    /// Max heading change in degrees per second, either direction
    pub max_turn_deg_per_sec: f64,
    /// Lower bound of the speed change in m/s per second
    pub min_accel_mps2: f64,
    /// Upper bound of the speed change in m/s per second
    pub max_accel_mps2: f64,
    /// Battery percent drained per second regardless of speed
    pub idle_drain_pct_per_sec: f64,
    /// Extra battery percent per second for each m/s of speed
    pub drain_pct_per_mps: f64,
    /// Bounds of the altitude change in m per second
    pub climb_range_mps: (f64, f64),
}

impl Default for RandomWalk {
    fn default() -> Self {
        Self {
            max_turn_deg_per_sec: 15.0,
            min_accel_mps2: -1.0,
            max_accel_mps2: 1.5,
            idle_drain_pct_per_sec: 0.05,
            drain_pct_per_mps: 0.01,
            climb_range_mps: (-0.2, 0.5),
        }
    }
}

impl RandomWalk {
    pub fn step(&self, current: &TelemetrySnapshot, dt: f64) -> TelemetrySnapshot {
        let mut rng = rand::thread_rng();
        let mut next = current.clone();

        let turn = uniform(&mut rng, -self.max_turn_deg_per_sec, self.max_turn_deg_per_sec);
        next.heading = normalize_heading(next.heading + turn * dt);

        let accel = uniform(&mut rng, self.min_accel_mps2, self.max_accel_mps2);
        next.speed = (next.speed + accel * dt).max(0.0);

        let distance_m = next.speed * dt;
        let bearing = next.heading.to_radians();
        next.latitude += bearing.cos() * distance_m * DEG_PER_METER;

        let cos_lat = next.latitude.to_radians().cos().abs().max(MIN_COS_LATITUDE);
        next.longitude += bearing.sin() * distance_m * DEG_PER_METER / cos_lat;

        next.battery = drain_battery(
            next.battery,
            dt * (self.idle_drain_pct_per_sec + next.speed * self.drain_pct_per_mps),
        );

        let (climb_min, climb_max) = self.climb_range_mps;
        next.altitude += uniform(&mut rng, climb_min, climb_max) * dt;

        next
    }
}
