//! Transport trait abstraction for pluggable robot SDK backends

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use wonder_shared::{DeviceId, DeviceInfo, RawTelemetry, RobotCommand};

/// Errors reported by a transport
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// A connection already exists; not fatal for the client
    #[error("Transport is already connected")]
    AlreadyConnected,

    #[error("No robot found")]
    NoDevice,

    #[error("Device {0} is not connected")]
    NotConnected(DeviceId),

    #[error("Transport closed")]
    Closed,

    #[error("Transport rejected the request: {0}")]
    Rejected(String),
}

/// Events pushed by a transport to its subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A robot finished connecting
    Connected(DeviceInfo),
    /// A telemetry packet from some robot
    Telemetry(RawTelemetry),
    /// A robot dropped off
    Disconnected(DeviceId),
}

/// The command/telemetry surface of a robot SDK
#[async_trait]
pub trait RobotTransport: Send + Sync + 'static {
    /// Subscribe to transport events. Each call returns an independent
    /// receiver that sees every event pushed after the call, in order.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<TransportEvent>;

    /// Ask the transport to connect. Success means the request was accepted;
    /// the robot is announced later by [`TransportEvent::Connected`].
    async fn connect(&self) -> Result<(), TransportError>;

    /// Fire a command at a robot. Never waits for the robot.
    fn send(&self, device: &DeviceId, command: &RobotCommand) -> Result<(), TransportError>;

    /// Human-readable name for this transport
    fn name(&self) -> &'static str;
}
