//! Telemetry observers
//!
//! An observer is called once per qualifying telemetry packet and decides by
//! its return value whether it wants the next one.

use std::fmt;

use wonder_shared::TelemetrySnapshot;

/// Error type returned by fallible observers
pub type ObserverError = anyhow::Error;

/// Receives telemetry snapshots until it asks to be removed
pub trait TelemetryObserver: Send + 'static {
    /// Return `Ok(true)` to keep listening, `Ok(false)` to be removed.
    /// An error also removes the observer.
    fn on_telemetry(&mut self, snapshot: &TelemetrySnapshot) -> Result<bool, ObserverError>;
}

impl<F> TelemetryObserver for F
where
    F: FnMut(&TelemetrySnapshot) -> bool + Send + 'static,
{
    fn on_telemetry(&mut self, snapshot: &TelemetrySnapshot) -> Result<bool, ObserverError> {
        Ok(self(snapshot))
    }
}

/// Adapter for closures that can fail, see [`fallible`]
pub struct Fallible<F>(F);

/// Wrap a closure returning `anyhow::Result<bool>` as an observer
pub fn fallible<F>(f: F) -> Fallible<F>
where
    F: FnMut(&TelemetrySnapshot) -> anyhow::Result<bool> + Send + 'static,
{
    Fallible(f)
}

impl<F> TelemetryObserver for Fallible<F>
where
    F: FnMut(&TelemetrySnapshot) -> anyhow::Result<bool> + Send + 'static,
{
    fn on_telemetry(&mut self, snapshot: &TelemetrySnapshot) -> Result<bool, ObserverError> {
        (self.0)(snapshot)
    }
}

/// Handle identifying a registered observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(pub(crate) u64);

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
