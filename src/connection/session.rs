//! A live, connected-robot context

use std::fmt;
use std::sync::Arc;

use tracing::debug;
use wonder_shared::{DeviceId, DeviceInfo, RobotCommand};

use crate::transport::{RobotTransport, TransportError};

/// Handle to fire commands at one connected robot
#[derive(Clone)]
pub struct Session {
    device: DeviceInfo,
    transport: Arc<dyn RobotTransport>,
}

impl Session {
    pub fn new(device: DeviceInfo, transport: Arc<dyn RobotTransport>) -> Self {
        Self { device, transport }
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device.id
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    /// Hand a command to the transport without waiting for the robot
    pub fn fire(&self, command: &RobotCommand) -> Result<(), TransportError> {
        debug!(
            "[SESSION] {} -> {} {:?}",
            self.device.id,
            command.name(),
            command.kind().codes()
        );
        self.transport.send(&self.device.id, command)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("device", &self.device)
            .field("transport", &self.transport.name())
            .finish()
    }
}
