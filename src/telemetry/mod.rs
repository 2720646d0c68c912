//! Telemetry Module
//!
//! Demultiplexes raw telemetry by device and fans it out to self-removing
//! observers.

mod dispatcher;
mod observer;
mod stream;

pub use dispatcher::{DispatchOutcome, ObserverRegistry, TelemetryDispatcher};
pub use observer::{fallible, Fallible, ObserverError, ObserverId, TelemetryObserver};
pub use stream::{snapshot_stream, SnapshotStream, SNAPSHOT_BUFFER};
