//! In-process transport driven by hand
//!
//! Records everything the client sends and lets the caller push connect
//! announcements, telemetry and disconnects at exact points. Used by tests
//! and anywhere a deterministic robot stand-in is needed.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;
use wonder_shared::{DeviceId, DeviceInfo, RawTelemetry, RobotCommand};

use super::traits::{RobotTransport, TransportError, TransportEvent};

/// How the loopback answers a connect request
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectBehavior {
    /// Accept and announce this robot, then report `AlreadyConnected`
    /// on later requests
    Announce(DeviceInfo),
    /// Report that a connection already exists
    AlreadyConnected,
    /// Accept the request but never announce anything
    Silent,
    /// Reject the request
    Fail(TransportError),
}

struct LoopbackState {
    subscribers: Vec<mpsc::UnboundedSender<TransportEvent>>,
    behavior: ConnectBehavior,
    connected: Vec<DeviceId>,
    sent: Vec<(DeviceId, RobotCommand)>,
    connect_requests: usize,
}

/// Hand-driven [`RobotTransport`]
#[derive(Clone)]
pub struct LoopbackTransport {
    state: Arc<Mutex<LoopbackState>>,
}

impl LoopbackTransport {
    /// A loopback that never announces a robot on its own
    pub fn new() -> Self {
        Self::with_behavior(ConnectBehavior::Silent)
    }

    /// A loopback that announces `device` on the first connect request
    pub fn announcing(device: DeviceInfo) -> Self {
        Self::with_behavior(ConnectBehavior::Announce(device))
    }

    pub fn with_behavior(behavior: ConnectBehavior) -> Self {
        Self {
            state: Arc::new(Mutex::new(LoopbackState {
                subscribers: Vec::new(),
                behavior,
                connected: Vec::new(),
                sent: Vec::new(),
                connect_requests: 0,
            })),
        }
    }

    pub fn set_behavior(&self, behavior: ConnectBehavior) {
        self.lock().behavior = behavior;
    }

    /// Announce a robot as connected
    pub fn announce(&self, device: DeviceInfo) {
        let mut state = self.lock();
        if !state.connected.contains(&device.id) {
            state.connected.push(device.id.clone());
        }
        broadcast(&mut state, TransportEvent::Connected(device));
    }

    /// Deliver a telemetry packet to every subscriber
    pub fn push_telemetry(&self, packet: RawTelemetry) {
        broadcast(&mut self.lock(), TransportEvent::Telemetry(packet));
    }

    /// Drop a robot's connection
    pub fn disconnect(&self, device: &DeviceId) {
        let mut state = self.lock();
        state.connected.retain(|id| id != device);
        broadcast(&mut state, TransportEvent::Disconnected(device.clone()));
    }

    /// Commands sent so far, oldest first
    pub fn sent_commands(&self) -> Vec<(DeviceId, RobotCommand)> {
        self.lock().sent.clone()
    }

    pub fn connect_requests(&self) -> usize {
        self.lock().connect_requests
    }

    pub fn subscriber_count(&self) -> usize {
        let mut state = self.lock();
        state.subscribers.retain(|tx| !tx.is_closed());
        state.subscribers.len()
    }

    fn lock(&self) -> MutexGuard<'_, LoopbackState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn broadcast(state: &mut LoopbackState, event: TransportEvent) {
    state.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
}

#[async_trait]
impl RobotTransport for LoopbackTransport {
    fn subscribe(&self) -> mpsc::UnboundedReceiver<TransportEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().subscribers.push(tx);
        rx
    }

    async fn connect(&self) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.connect_requests += 1;

        match state.behavior.clone() {
            ConnectBehavior::Announce(device) => {
                debug!("[LOOPBACK] Announcing {}", device.id);
                state.behavior = ConnectBehavior::AlreadyConnected;
                state.connected.push(device.id.clone());
                broadcast(&mut state, TransportEvent::Connected(device));
                Ok(())
            }
            ConnectBehavior::AlreadyConnected => Err(TransportError::AlreadyConnected),
            ConnectBehavior::Silent => Ok(()),
            ConnectBehavior::Fail(e) => Err(e),
        }
    }

    fn send(&self, device: &DeviceId, command: &RobotCommand) -> Result<(), TransportError> {
        let mut state = self.lock();
        if !state.connected.contains(device) {
            return Err(TransportError::NotConnected(device.clone()));
        }
        state.sent.push((device.clone(), command.clone()));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Loopback"
    }
}
