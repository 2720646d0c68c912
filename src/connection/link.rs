//! Shared link state
//!
//! The link state machine is shared between the client, its event loop and
//! the health monitor. Times are measured on the tokio clock from the link's
//! creation so they follow paused time in tests.

use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;
use wonder_shared::state_machine::{
    is_valid_transition, HealthCondition, LinkEvent, LinkState, LinkStateMachine,
    TransitionResult,
};
use wonder_shared::DeviceId;

/// Cloneable handle to one client's link state machine
#[derive(Clone)]
pub struct Link {
    fsm: Arc<RwLock<LinkStateMachine>>,
    epoch: Instant,
}

impl Link {
    pub fn new() -> Self {
        Self {
            fsm: Arc::new(RwLock::new(LinkStateMachine::new())),
            epoch: Instant::now(),
        }
    }

    /// Milliseconds since this link was created
    pub fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    pub async fn state(&self) -> LinkState {
        self.fsm.read().await.state()
    }

    pub async fn device(&self) -> Option<DeviceId> {
        self.fsm.read().await.device().cloned()
    }

    /// Feed an event to the state machine
    pub async fn process(&self, event: LinkEvent) -> TransitionResult {
        let now = self.now_ms();
        let mut fsm = self.fsm.write().await;
        let from = fsm.state();
        let result = fsm.process_event_at(event, now);
        if let TransitionResult::Success(to) = result {
            debug_assert!(
                is_valid_transition(from, to),
                "state machine took {:?} -> {:?}",
                from,
                to
            );
        }
        match &result {
            TransitionResult::Success(to) if *to != from => {
                debug!("[LINK] {:?} -> {:?}", from, to);
            }
            TransitionResult::Invalid { from, event } => {
                debug!("[LINK] Ignoring {:?} in {:?}", event, from);
            }
            _ => {}
        }
        result
    }

    /// Record a qualifying telemetry packet
    pub async fn record_telemetry(&self, battery_volts: Option<f64>) {
        let now = self.now_ms();
        let mut fsm = self.fsm.write().await;
        fsm.update_telemetry(now);
        if let Some(volts) = battery_volts {
            fsm.update_battery(volts);
        }
    }

    pub async fn check_health(&self, stall_after_ms: u64, battery_low_volts: f64) -> Vec<HealthCondition> {
        let now = self.now_ms();
        self.fsm
            .read()
            .await
            .check_health(now, stall_after_ms, battery_low_volts)
    }
}

impl Default for Link {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_connect_and_disconnect_transitions() {
        let link = Link::new();
        let device = DeviceId::new("dash-01");

        assert_eq!(
            link.process(LinkEvent::ConnectRequested).await,
            TransitionResult::Success(LinkState::Connecting)
        );
        assert_eq!(
            link.process(LinkEvent::AlreadyConnected(device.clone())).await,
            TransitionResult::Success(LinkState::Connected)
        );
        assert_eq!(link.device().await, Some(device.clone()));

        // Re-announcement of the bound device keeps the link up
        assert_eq!(
            link.process(LinkEvent::ConnectEvent(device)).await,
            TransitionResult::Success(LinkState::Connected)
        );
        assert_eq!(
            link.process(LinkEvent::Disconnected).await,
            TransitionResult::Success(LinkState::Disconnected)
        );
    }

    #[tokio::test]
    async fn test_invalid_event_leaves_state_unchanged() {
        let link = Link::new();

        let result = link.process(LinkEvent::ConnectFailed).await;
        assert!(matches!(result, TransitionResult::Invalid { from: LinkState::Disconnected, .. }));
        assert_eq!(link.state().await, LinkState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_follows_tokio_clock() {
        let link = Link::new();
        link.process(LinkEvent::ConnectRequested).await;
        link.process(LinkEvent::ConnectEvent(DeviceId::new("dash-01"))).await;

        tokio::time::advance(Duration::from_millis(1500)).await;
        assert_eq!(
            link.check_health(1_000, 3.6).await,
            vec![HealthCondition::TelemetryStalled { silent_for_ms: 1500 }]
        );

        link.record_telemetry(Some(3.3)).await;
        assert_eq!(
            link.check_health(1_000, 3.6).await,
            vec![HealthCondition::BatteryLow { volts: 3.3 }]
        );
    }
}
