//! Link State Machine
//!
//! Tracks the client's connection to one robot and the liveness of its
//! telemetry stream.

use crate::DeviceId;

/// Connection state of a client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

/// Events that can trigger state transitions
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// `connect()` was called
    ConnectRequested,
    /// The transport reported a new connection to this device
    ConnectEvent(DeviceId),
    /// The transport was already connected; the last-known session is reused
    AlreadyConnected(DeviceId),
    /// Connecting failed or timed out
    ConnectFailed,
    /// The transport lost the device
    Disconnected,
}

/// Result of a state transition attempt
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionResult {
    /// Transition was valid; carries the new state
    Success(LinkState),
    /// Transition was invalid from current state
    Invalid { from: LinkState, event: LinkEvent },
}

/// Conditions reported by [`LinkStateMachine::check_health`]
#[derive(Debug, Clone, PartialEq)]
pub enum HealthCondition {
    /// No qualifying telemetry for `silent_for_ms`
    TelemetryStalled { silent_for_ms: u64 },
    /// Last reported battery voltage is below the threshold
    BatteryLow { volts: f64 },
}

/// The link state machine for one client
#[derive(Debug)]
pub struct LinkStateMachine {
    current_state: LinkState,
    device: Option<DeviceId>,
    connected_at_ms: u64,
    last_telemetry_ms: u64,
    battery_volts: Option<f64>,
}

impl Default for LinkStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkStateMachine {
    /// Create a new state machine in Disconnected state
    pub fn new() -> Self {
        Self {
            current_state: LinkState::Disconnected,
            device: None,
            connected_at_ms: 0,
            last_telemetry_ms: 0,
            battery_volts: None,
        }
    }

    pub fn state(&self) -> LinkState {
        self.current_state
    }

    pub fn is_connected(&self) -> bool {
        self.current_state == LinkState::Connected
    }

    /// Device bound by the last successful connect
    pub fn device(&self) -> Option<&DeviceId> {
        self.device.as_ref()
    }

    /// Record a qualifying telemetry packet
    pub fn update_telemetry(&mut self, timestamp_ms: u64) {
        self.last_telemetry_ms = timestamp_ms;
    }

    /// Record the latest battery voltage
    pub fn update_battery(&mut self, volts: f64) {
        self.battery_volts = Some(volts);
    }

    /// Process an event and return the transition result
    pub fn process_event(&mut self, event: LinkEvent) -> TransitionResult {
        self.process_event_at(event, crate::now_ms())
    }

    /// Same as [`process_event`](Self::process_event) with an explicit clock
    pub fn process_event_at(&mut self, event: LinkEvent, now_ms: u64) -> TransitionResult {
        let next = match (self.current_state, &event) {
            (LinkState::Disconnected, LinkEvent::ConnectRequested) => Some(LinkState::Connecting),
            (LinkState::Connected, LinkEvent::ConnectRequested) => Some(LinkState::Connected),

            (LinkState::Connecting, LinkEvent::ConnectEvent(id))
            | (LinkState::Connecting, LinkEvent::AlreadyConnected(id)) => {
                self.device = Some(id.clone());
                self.connected_at_ms = now_ms;
                self.last_telemetry_ms = 0;
                self.battery_volts = None;
                Some(LinkState::Connected)
            }
            // Transport re-announcing the device we are bound to
            (LinkState::Connected, LinkEvent::ConnectEvent(id)) if self.device.as_ref() == Some(id) => {
                Some(LinkState::Connected)
            }

            (LinkState::Connecting, LinkEvent::ConnectFailed) => Some(LinkState::Disconnected),
            (LinkState::Connecting | LinkState::Connected, LinkEvent::Disconnected) => {
                Some(LinkState::Disconnected)
            }

            _ => None,
        };

        match next {
            Some(state) => {
                self.current_state = state;
                TransitionResult::Success(state)
            }
            None => TransitionResult::Invalid {
                from: self.current_state,
                event,
            },
        }
    }

    /// Milliseconds since the last qualifying packet, or since connecting if
    /// none arrived yet. `None` while not connected.
    pub fn telemetry_silence_ms(&self, current_time_ms: u64) -> Option<u64> {
        if !self.is_connected() {
            return None;
        }
        let last = self.last_telemetry_ms.max(self.connected_at_ms);
        Some(current_time_ms.saturating_sub(last))
    }

    /// Check if telemetry has been silent for longer than `stall_after_ms`
    pub fn is_telemetry_stalled(&self, current_time_ms: u64, stall_after_ms: u64) -> bool {
        self.telemetry_silence_ms(current_time_ms)
            .is_some_and(|silence| silence > stall_after_ms)
    }

    /// Check if the last reported battery voltage is below `low_volts`
    pub fn is_battery_low(&self, low_volts: f64) -> bool {
        self.battery_volts.is_some_and(|v| v < low_volts)
    }

    /// Check all health conditions and return the ones currently present
    pub fn check_health(
        &self,
        current_time_ms: u64,
        stall_after_ms: u64,
        battery_low_volts: f64,
    ) -> Vec<HealthCondition> {
        let mut conditions = Vec::new();

        if self.is_telemetry_stalled(current_time_ms, stall_after_ms) {
            conditions.push(HealthCondition::TelemetryStalled {
                silent_for_ms: self.telemetry_silence_ms(current_time_ms).unwrap_or_default(),
            });
        }

        if self.is_connected() && self.is_battery_low(battery_low_volts) {
            if let Some(volts) = self.battery_volts {
                conditions.push(HealthCondition::BatteryLow { volts });
            }
        }

        conditions
    }
}

/// Check if a transition from one state to another is generally valid
pub fn is_valid_transition(from: LinkState, to: LinkState) -> bool {
    use LinkState::*;

    match (from, to) {
        (a, b) if a == b => true,
        (Disconnected, Connecting) => true,
        (Connecting, Connected) => true,
        (Connecting, Disconnected) => true,
        (Connected, Disconnected) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected_fsm(at_ms: u64) -> LinkStateMachine {
        let mut fsm = LinkStateMachine::new();
        fsm.process_event_at(LinkEvent::ConnectRequested, at_ms);
        fsm.process_event_at(LinkEvent::ConnectEvent(DeviceId::new("dash-01")), at_ms);
        fsm
    }

    #[test]
    fn test_initial_state() {
        let fsm = LinkStateMachine::new();
        assert_eq!(fsm.state(), LinkState::Disconnected);
        assert!(fsm.device().is_none());
    }

    #[test]
    fn test_connect_sequence() {
        let mut fsm = LinkStateMachine::new();

        assert_eq!(
            fsm.process_event(LinkEvent::ConnectRequested),
            TransitionResult::Success(LinkState::Connecting)
        );
        assert_eq!(
            fsm.process_event(LinkEvent::ConnectEvent(DeviceId::new("dash-01"))),
            TransitionResult::Success(LinkState::Connected)
        );
        assert_eq!(fsm.device(), Some(&DeviceId::new("dash-01")));
    }

    #[test]
    fn test_already_connected_binds_device() {
        let mut fsm = LinkStateMachine::new();
        fsm.process_event(LinkEvent::ConnectRequested);
        let result = fsm.process_event(LinkEvent::AlreadyConnected(DeviceId::new("dash-07")));
        assert_eq!(result, TransitionResult::Success(LinkState::Connected));
        assert_eq!(fsm.device(), Some(&DeviceId::new("dash-07")));
    }

    #[test]
    fn test_connect_failed_returns_to_disconnected() {
        let mut fsm = LinkStateMachine::new();
        fsm.process_event(LinkEvent::ConnectRequested);
        assert_eq!(
            fsm.process_event(LinkEvent::ConnectFailed),
            TransitionResult::Success(LinkState::Disconnected)
        );
    }

    #[test]
    fn test_invalid_transitions() {
        let mut fsm = LinkStateMachine::new();

        // Cannot receive a connect event without asking for one
        let result = fsm.process_event(LinkEvent::ConnectEvent(DeviceId::new("dash-01")));
        assert!(matches!(
            result,
            TransitionResult::Invalid {
                from: LinkState::Disconnected,
                ..
            }
        ));

        // A different device announcing itself does not rebind a live link
        let mut fsm = connected_fsm(1_000);
        let result = fsm.process_event(LinkEvent::ConnectEvent(DeviceId::new("dash-02")));
        assert!(matches!(result, TransitionResult::Invalid { .. }));
        assert_eq!(fsm.device(), Some(&DeviceId::new("dash-01")));
    }

    #[test]
    fn test_disconnect() {
        let mut fsm = connected_fsm(1_000);
        assert_eq!(
            fsm.process_event(LinkEvent::Disconnected),
            TransitionResult::Success(LinkState::Disconnected)
        );
        assert!(!fsm.is_connected());
    }

    #[test]
    fn test_telemetry_stall_detection() {
        let mut fsm = connected_fsm(1_000);

        // Never received telemetry: measured from the connect time
        assert!(!fsm.is_telemetry_stalled(1_500, 1_000));
        assert!(fsm.is_telemetry_stalled(2_001, 1_000));

        fsm.update_telemetry(2_000);
        assert!(!fsm.is_telemetry_stalled(2_500, 1_000));
        assert!(fsm.is_telemetry_stalled(3_500, 1_000));

        // Not connected: never stalled
        let idle = LinkStateMachine::new();
        assert!(!idle.is_telemetry_stalled(u64::MAX, 1_000));
    }

    #[test]
    fn test_check_health() {
        let mut fsm = connected_fsm(1_000);
        assert!(fsm.check_health(1_100, 1_000, 3.6).is_empty());

        fsm.update_battery(3.4);
        let conditions = fsm.check_health(5_000, 1_000, 3.6);
        assert_eq!(
            conditions,
            vec![
                HealthCondition::TelemetryStalled { silent_for_ms: 4_000 },
                HealthCondition::BatteryLow { volts: 3.4 },
            ]
        );
    }

    #[test]
    fn test_valid_transitions() {
        assert!(is_valid_transition(LinkState::Disconnected, LinkState::Connecting));
        assert!(is_valid_transition(LinkState::Connected, LinkState::Connected));
        assert!(!is_valid_transition(LinkState::Disconnected, LinkState::Connected));
    }
}
