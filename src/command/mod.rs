//! Command Module
//!
//! Paces fire-and-forget robot commands against the telemetry stream.

mod gate;
mod timeout;

pub use gate::{CommandGate, Completion, GateHandle};
pub use timeout::{await_completion, await_until};
