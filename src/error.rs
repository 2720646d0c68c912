//! Client error types

use std::time::Duration;

use thiserror::Error;
use wonder_shared::CommandError;

use crate::transport::TransportError;

/// Errors surfaced to callers of [`RobotClient`](crate::RobotClient)
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Not connected to a robot")]
    NotConnected,

    #[error("Transport is already connected and no session can be reused")]
    AlreadyConnected,

    #[error("Robot did not connect within {0:?}")]
    ConnectTimeout(Duration),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Invalid command: {0}")]
    InvalidCommand(#[from] CommandError),

    #[error("{command} was not followed by telemetry within {timeout:?}")]
    CommandTimeout {
        command: &'static str,
        timeout: Duration,
    },

    #[error("{action} did not finish within {timeout:?}")]
    ActionTimeout {
        action: &'static str,
        timeout: Duration,
    },

    #[error("Wait for {0} was cancelled")]
    Cancelled(&'static str),

    #[error("Robot disconnected")]
    Disconnected,
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;
