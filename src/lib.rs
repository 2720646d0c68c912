//! Command pacing and telemetry dispatch for Wonder robots
//!
//! [`RobotClient`] connects to one robot through a [`RobotTransport`],
//! releases each command's completion on the telemetry tick that follows it,
//! and fans every telemetry packet out to self-removing observers.

pub mod client;
pub mod command;
pub mod connection;
pub mod error;
pub mod health;
pub mod telemetry;
pub mod transport;

pub use wonder_shared as shared;

pub use client::{ActionCompletion, ClientConfig, RobotClient};
pub use command::Completion;
pub use connection::{ReconnectPolicy, SessionRegistry};
pub use error::{ClientError, Result};
pub use health::{HealthConfig, HealthEvent, HealthMonitor};
pub use telemetry::{fallible, ObserverId, ObserverRegistry, SnapshotStream, TelemetryObserver};
pub use transport::{RobotTransport, TransportError, TransportEvent};
