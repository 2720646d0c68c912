//! Snapshot streams
//!
//! A consumable alternative to callbacks: every qualifying snapshot is
//! forwarded into a bounded channel by an observer that removes itself once
//! the stream is dropped. A stream that is not polled keeps at most
//! [`SNAPSHOT_BUFFER`] snapshots; later packets are skipped until it drains.

use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::trace;
use wonder_shared::TelemetrySnapshot;

use super::dispatcher::ObserverRegistry;
use crate::error::Result;

/// Stream of telemetry snapshots, starting with the next qualifying packet
pub type SnapshotStream = BoxStream<'static, TelemetrySnapshot>;

/// Snapshots a stream holds before it starts skipping packets
pub const SNAPSHOT_BUFFER: usize = 64;

/// Register a forwarding observer and return the stream it feeds
pub fn snapshot_stream(registry: &ObserverRegistry) -> Result<SnapshotStream> {
    let (tx, rx) = mpsc::channel::<TelemetrySnapshot>(SNAPSHOT_BUFFER);

    registry.add(move |snapshot: &TelemetrySnapshot| match tx.try_send(snapshot.clone()) {
        Ok(()) => true,
        Err(TrySendError::Full(skipped)) => {
            trace!("[TELEMETRY] Stream full, skipping packet {}", skipped.sequence());
            true
        }
        Err(TrySendError::Closed(_)) => false,
    })?;

    Ok(stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|snapshot| (snapshot, rx))
    })
    .boxed())
}
