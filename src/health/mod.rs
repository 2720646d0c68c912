//! Health Module
//!
//! Link health monitoring for a connected robot.

mod monitor;

pub use monitor::{HealthConfig, HealthEvent, HealthMonitor};
