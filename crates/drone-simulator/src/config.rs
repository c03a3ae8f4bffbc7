//! # Simulator Configuration
//!
//! Environment-based configuration for the drone simulator.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use drone_domain::TelemetrySnapshot;

use crate::engine::EngineTuning;
use crate::error::{Result, SimError};

/// Nominal tick period of the reference design.
pub const DEFAULT_TICK_MS: u64 = 500;

/// Battery percentage at or below which the cache raises a low-battery event.
pub const DEFAULT_LOW_BATTERY_PCT: u8 = 20;

/// Simulator configuration
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Identifier stamped on every snapshot
    pub drone_id: String,

    /// Period between engine ticks
    pub tick_interval: Duration,

    /// Motion policy name used when a session starts
    pub policy: String,

    /// Low battery threshold in percent (inclusive)
    pub low_battery_threshold: u8,

    /// Engine post-processing parameters
    pub tuning: EngineTuning,

    /// Starting position
    pub home: HomePosition,

    /// Starting ground speed in m/s
    pub initial_speed_mps: f64,

    /// Logging level
    pub log_level: String,
}

/// Where the drone starts
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HomePosition {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_m: f64,
}

impl SimulatorConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] if a value is present but cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = EngineTuning::default();

        Ok(Self {
            drone_id: lookup("DRONE_ID").unwrap_or_else(|| "DRONE-001".to_string()),

            tick_interval: Duration::from_millis(parse_or(
                &lookup,
                "SIM_TICK_MS",
                DEFAULT_TICK_MS,
            )?),

            policy: lookup("SIM_POLICY").unwrap_or_else(|| "hover".to_string()),

            low_battery_threshold: parse_or(
                &lookup,
                "SIM_LOW_BATTERY_PCT",
                DEFAULT_LOW_BATTERY_PCT,
            )?,

            tuning: EngineTuning {
                gps_drift_deg: parse_checked(
                    &lookup,
                    "SIM_GPS_DRIFT_DEG",
                    defaults.gps_drift_deg,
                    |d| d.is_finite() && d >= 0.0,
                )?,
                gps_loss_probability: parse_checked(
                    &lookup,
                    "SIM_GPS_LOSS_PROBABILITY",
                    defaults.gps_loss_probability,
                    f64::is_finite,
                )?
                .clamp(0.0, 1.0),
                base_drain_pct: parse_or(&lookup, "SIM_BASE_DRAIN_PCT", defaults.base_drain_pct)?,
            },

            home: HomePosition {
                latitude: parse_or(&lookup, "SIM_HOME_LAT", 0.0)?,
                longitude: parse_or(&lookup, "SIM_HOME_LON", 0.0)?,
                altitude_m: parse_or(&lookup, "SIM_HOME_ALT_M", 0.0)?,
            },

            initial_speed_mps: parse_or(&lookup, "SIM_INITIAL_SPEED_MPS", 0.0)?,

            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Snapshot the engine starts from.
    #[must_use]
    pub fn initial_snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot::new(self.drone_id.clone())
            .with_position(self.home.latitude, self.home.longitude, self.home.altitude_m)
            .with_motion(0.0, self.initial_speed_mps)
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            drone_id: "DRONE-001".to_string(),
            tick_interval: Duration::from_millis(DEFAULT_TICK_MS),
            policy: "hover".to_string(),
            low_battery_threshold: DEFAULT_LOW_BATTERY_PCT,
            tuning: EngineTuning::default(),
            home: HomePosition::default(),
            initial_speed_mps: 0.0,
            log_level: "info".to_string(),
        }
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T> {
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| SimError::InvalidConfig {
            key: key.to_string(),
            value: raw,
        }),
        None => Ok(default),
    }
}

/// Like [`parse_or`], but a parsed value must also satisfy `valid`.
fn parse_checked(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: f64,
    valid: impl Fn(f64) -> bool,
) -> Result<f64> {
    let value = parse_or(lookup, key, default)?;
    if valid(value) {
        Ok(value)
    } else {
        Err(SimError::InvalidConfig {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}
