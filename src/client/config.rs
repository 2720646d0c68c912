//! Client configuration

use std::time::Duration;

use wonder_shared::{limits, pacing};

use crate::connection::ReconnectPolicy;

/// Configuration for a [`RobotClient`](super::RobotClient)
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// What to do when the transport says it is already connected
    pub reconnect_policy: ReconnectPolicy,
    /// How long `connect()` waits for the robot to announce itself
    pub connect_timeout: Duration,
    /// Default wait for the telemetry tick after a command (`None` waits forever)
    pub command_timeout: Option<Duration>,
    /// Packets ignored by an action before it checks for completion
    pub action_settle: Duration,
    /// Upper bound on any completion-aware action
    pub action_timeout: Duration,
    /// How close the reported head angle must get to the target
    pub head_position_tolerance_deg: f64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            reconnect_policy: ReconnectPolicy::default(),
            connect_timeout: Duration::from_millis(pacing::CONNECT_TIMEOUT_MS),
            command_timeout: Some(Duration::from_millis(pacing::COMMAND_TIMEOUT_MS)),
            action_settle: Duration::from_millis(pacing::ACTION_SETTLE_MS),
            action_timeout: Duration::from_millis(pacing::ACTION_TIMEOUT_MS),
            head_position_tolerance_deg: limits::HEAD_POSITION_TOLERANCE_DEG,
        }
    }
}
