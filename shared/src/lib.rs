//! Wonder Shared Protocol Types
//!
//! This crate provides the protocol-level types shared by the robot client and
//! its transports: device identity, sensor telemetry, typed commands and the
//! link state machine. Nothing in here performs I/O.

pub mod command;
pub mod sensors;
pub mod state_machine;

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

pub use command::{clamp_head_pan, clamp_head_tilt, CommandError, CommandKind, Rgb, RobotCommand};
pub use sensors::{RawSensor, RawTelemetry, SensorId, SensorReading, TelemetrySnapshot};

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Stable identity of a robot as reported by the transport
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(String);

impl DeviceId {
    /// Create a device ID from anything string-like
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Description of a connected robot, carried by the transport's connect event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Stable device identity used to demultiplex telemetry
    pub id: DeviceId,
    /// Human-readable robot name
    pub name: String,
}

impl DeviceInfo {
    pub fn new(id: impl Into<DeviceId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Command pacing parameters
pub mod pacing {
    /// Nominal interval between telemetry packets from the robot
    pub const TELEMETRY_INTERVAL_MS: u64 = 50;

    /// How long `connect()` waits for the transport's connected event
    pub const CONNECT_TIMEOUT_MS: u64 = 10_000;

    /// Default upper bound on waiting for the telemetry tick after a command
    pub const COMMAND_TIMEOUT_MS: u64 = 5_000;

    /// Packets ignored by an action watcher before it starts checking for completion
    pub const ACTION_SETTLE_MS: u64 = 500;

    /// Default upper bound on a completion-aware action (sound, pose, head move)
    pub const ACTION_TIMEOUT_MS: u64 = 30_000;
}

/// Physical limits of the robot
pub mod limits {
    /// Head pan range in degrees (symmetric)
    pub const HEAD_PAN_MAX_DEG: f64 = 120.0;

    /// Lowest head tilt in degrees
    pub const HEAD_TILT_MIN_DEG: f64 = -22.5;

    /// Highest head tilt in degrees
    pub const HEAD_TILT_MAX_DEG: f64 = 7.0;

    /// A head move is done once the reported angle is within this many degrees
    pub const HEAD_POSITION_TOLERANCE_DEG: f64 = 2.0;

    /// `BODY_POSE.watermark` value reported once a pose has finished
    pub const POSE_COMPLETE_WATERMARK: f64 = 255.0;

    /// Number of LEDs in the eye ring
    pub const EYE_RING_LEDS: usize = 12;
}

/// Link health thresholds
pub mod health {
    /// Telemetry silence after which the link is reported as stalled
    pub const TELEMETRY_STALL_MS: u64 = 1_000;

    /// How often the health monitor evaluates the link
    pub const CHECK_INTERVAL_MS: u64 = 250;

    /// Battery voltage below which a low-battery event is raised
    pub const BATTERY_LOW_VOLTS: f64 = 3.6;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_id_display() {
        let id = DeviceId::new("dash-01");
        assert_eq!(id.to_string(), "dash-01");
        assert_eq!(id.as_str(), "dash-01");
        assert_eq!(DeviceId::from("dash-01"), id);
    }

    #[test]
    fn test_device_info_creation() {
        let info = DeviceInfo::new("dash-01", "Dash");
        assert_eq!(info.id, DeviceId::new("dash-01"));
        assert_eq!(info.name, "Dash");
    }

    #[test]
    fn test_now_ms_is_positive() {
        assert!(now_ms() > 0);
    }
}
