//! # Drone Telemetry - Domain Model
//!
//! Value types describing one instant of simulated drone telemetry. These
//! types are the single source of truth shared by the motion policies, the
//! simulation engine and the telemetry cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Full turn in degrees.
pub const FULL_TURN_DEG: f64 = 360.0;

/// Maximum battery charge in percent.
pub const BATTERY_FULL_PCT: u8 = 100;

// =============================================================================
// ENUMS
// =============================================================================

/// Quality of the GPS position lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GpsFix {
    /// No reliable lock
    NoFix,
    /// Latitude/longitude only
    #[serde(rename = "FIX_2D")]
    Fix2D,
    /// Latitude/longitude/altitude
    #[default]
    #[serde(rename = "FIX_3D")]
    Fix3D,
}

impl GpsFix {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoFix => "NO_FIX",
            Self::Fix2D => "2D",
            Self::Fix3D => "3D",
        }
    }

    /// Whether the receiver currently provides a usable position.
    #[must_use]
    pub fn has_position(&self) -> bool {
        !matches!(self, Self::NoFix)
    }
}

impl std::fmt::Display for GpsFix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// VALUE OBJECTS
// =============================================================================

/// One sample of the simulated drone's observable state.
///
/// Snapshots are plain values: every tick produces a fresh copy and
/// observers only ever receive clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    /// Degrees in `[0, 360)`
    pub heading: f64,
    /// Meters per second, never negative
    pub speed: f64,
    /// Percent in `[0, 100]`
    pub battery: u8,
    pub gps_fix: GpsFix,
    /// Epoch milliseconds of the sample
    pub timestamp_ms: i64,
}

impl TelemetrySnapshot {
    /// Fresh snapshot at the origin with a full battery and a 3D fix.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            latitude: 0.0,
            longitude: 0.0,
            altitude: 0.0,
            heading: 0.0,
            speed: 0.0,
            battery: BATTERY_FULL_PCT,
            gps_fix: GpsFix::Fix3D,
            timestamp_ms: 0,
        }
    }

    #[must_use]
    pub fn with_position(mut self, latitude: f64, longitude: f64, altitude: f64) -> Self {
        self.latitude = latitude;
        self.longitude = longitude;
        self.altitude = altitude;
        self
    }

    /// Set heading and speed, normalizing the heading and flooring the speed at zero.
    #[must_use]
    pub fn with_motion(mut self, heading: f64, speed: f64) -> Self {
        self.heading = normalize_heading(heading);
        self.speed = speed.max(0.0);
        self
    }

    /// Set the battery level, clamped to 100%.
    #[must_use]
    pub fn with_battery(mut self, battery: u8) -> Self {
        self.battery = battery.min(BATTERY_FULL_PCT);
        self
    }

    /// Sample time as a UTC timestamp, if representable.
    #[must_use]
    pub fn recorded_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp_ms)
    }

    /// Largest per-axis change in degrees between two samples.
    #[must_use]
    pub fn displacement_deg(&self, other: &Self) -> f64 {
        (other.latitude - self.latitude)
            .abs()
            .max((other.longitude - self.longitude).abs())
    }
}

impl Default for TelemetrySnapshot {
    fn default() -> Self {
        Self::new(String::new())
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Wrap an angle into `[0, 360)`.
///
/// `rem_euclid` can round tiny negative inputs up to exactly 360.0, which is
/// folded back to zero.
#[must_use]
pub fn normalize_heading(deg: f64) -> f64 {
    let wrapped = deg.rem_euclid(FULL_TURN_DEG);
    if wrapped >= FULL_TURN_DEG { 0.0 } else { wrapped }
}

/// Subtract the whole-percent part of `amount` from `battery`, floored at 0.
///
/// Fractions, negative amounts and NaN drain nothing.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn drain_battery(battery: u8, amount: f64) -> u8 {
    if amount.is_nan() || amount < 1.0 {
        return battery;
    }
    let units = amount.trunc();
    if units >= f64::from(battery) {
        0
    } else {
        battery - units as u8
    }
}
