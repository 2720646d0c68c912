//! Transport Module
//!
//! The robot SDK surface the client drives, plus in-process backends.

pub mod loopback;
pub mod sim;
pub mod traits;

pub use loopback::{ConnectBehavior, LoopbackTransport};
pub use sim::{SimConfig, SimulatedRobot};
pub use traits::{RobotTransport, TransportError, TransportEvent};
