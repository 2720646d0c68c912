//! Telemetry dispatcher
//!
//! Demultiplexes raw packets by device identity and fans each qualifying
//! packet out to the ordered observer list.
//!
//! Fan-out walks the list once with in-place compaction, so an observer that
//! drops out never causes its neighbour to be skipped or called twice.
//! Registrations made while a packet is being dispatched (including from
//! inside an observer) are parked in a channel and applied before the next
//! packet.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};
use wonder_shared::{DeviceId, RawTelemetry, TelemetrySnapshot};

use super::observer::{ObserverId, TelemetryObserver};
use crate::error::{ClientError, Result};

struct ObserverSlot {
    id: ObserverId,
    observer: Box<dyn TelemetryObserver>,
}

enum Registration {
    Add(ObserverSlot),
    Remove(ObserverId),
}

/// What happened to one raw packet
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The packet came from another device and was ignored
    Dropped,
    /// The packet was delivered to the observers
    Delivered {
        snapshot: TelemetrySnapshot,
        /// Observers called for this packet
        invoked: usize,
        /// Observers that finished, failed or panicked during this packet
        removed: usize,
    },
}

/// Cloneable handle for adding and removing observers from anywhere,
/// including from inside an observer
#[derive(Clone)]
pub struct ObserverRegistry {
    tx: mpsc::UnboundedSender<Registration>,
    next_id: Arc<AtomicU64>,
}

impl ObserverRegistry {
    /// Append an observer. It sees packets dispatched after this call.
    pub fn add(&self, observer: impl TelemetryObserver) -> Result<ObserverId> {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.tx
            .send(Registration::Add(ObserverSlot {
                id,
                observer: Box::new(observer),
            }))
            .map_err(|_| ClientError::Disconnected)?;
        Ok(id)
    }

    /// Remove an observer before its next packet. Unknown IDs are ignored.
    pub fn remove(&self, id: ObserverId) -> Result<()> {
        self.tx
            .send(Registration::Remove(id))
            .map_err(|_| ClientError::Disconnected)
    }

    /// Whether the dispatcher behind this registry is gone
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Fans telemetry for one device out to its observers
pub struct TelemetryDispatcher {
    device_id: DeviceId,
    observers: Vec<ObserverSlot>,
    registrations: mpsc::UnboundedReceiver<Registration>,
    next_id: Arc<AtomicU64>,
    sequence: u64,
}

impl TelemetryDispatcher {
    /// Create a dispatcher bound to `device_id` and the registry feeding it
    pub fn new(device_id: DeviceId) -> (Self, ObserverRegistry) {
        let (tx, registrations) = mpsc::unbounded_channel();
        let next_id = Arc::new(AtomicU64::new(0));

        let registry = ObserverRegistry {
            tx,
            next_id: next_id.clone(),
        };
        let dispatcher = Self {
            device_id,
            observers: Vec::new(),
            registrations,
            next_id,
            sequence: 0,
        };

        (dispatcher, registry)
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// Append an observer directly (not during a dispatch)
    pub fn add_observer(&mut self, observer: impl TelemetryObserver) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.observers.push(ObserverSlot {
            id,
            observer: Box::new(observer),
        });
        id
    }

    /// Number of live observers, counting pending registrations
    pub fn observer_count(&mut self) -> usize {
        self.apply_registrations();
        self.observers.len()
    }

    /// IDs of live observers in call order, counting pending registrations
    pub fn observer_ids(&mut self) -> Vec<ObserverId> {
        self.apply_registrations();
        self.observers.iter().map(|slot| slot.id).collect()
    }

    /// Qualifying packets dispatched so far
    pub fn packets_dispatched(&self) -> u64 {
        self.sequence
    }

    /// Handle one raw packet from the transport
    pub fn dispatch(&mut self, packet: RawTelemetry) -> DispatchOutcome {
        if packet.device_id != self.device_id {
            trace!(
                "[TELEMETRY] Dropping packet from {} (bound to {})",
                packet.device_id,
                self.device_id
            );
            return DispatchOutcome::Dropped;
        }

        self.apply_registrations();

        self.sequence += 1;
        let snapshot = TelemetrySnapshot::from_raw(packet, self.sequence);

        let before = self.observers.len();
        self.observers.retain_mut(|slot| notify(slot, &snapshot));
        let removed = before - self.observers.len();

        DispatchOutcome::Delivered {
            snapshot,
            invoked: before,
            removed,
        }
    }

    fn apply_registrations(&mut self) {
        while let Ok(registration) = self.registrations.try_recv() {
            match registration {
                Registration::Add(slot) => self.observers.push(slot),
                Registration::Remove(id) => self.observers.retain(|slot| slot.id != id),
            }
        }
    }
}

/// Call one observer, isolating failures: an error or panic removes only
/// that observer.
fn notify(slot: &mut ObserverSlot, snapshot: &TelemetrySnapshot) -> bool {
    let result = panic::catch_unwind(AssertUnwindSafe(|| slot.observer.on_telemetry(snapshot)));

    match result {
        Ok(Ok(true)) => true,
        Ok(Ok(false)) => {
            debug!("[TELEMETRY] Observer {} finished", slot.id);
            false
        }
        Ok(Err(e)) => {
            warn!("[TELEMETRY] Observer {} failed, removing: {:#}", slot.id, e);
            false
        }
        Err(_) => {
            warn!("[TELEMETRY] Observer {} panicked, removing", slot.id);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::fallible;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use wonder_shared::{RawSensor, SensorId, SensorReading};

    fn packet(device: &str) -> RawTelemetry {
        RawTelemetry::new(
            device,
            vec![RawSensor::new(
                SensorId::HeadPositionPan,
                SensorReading::new().with("degree", 0.0),
            )],
        )
    }

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    #[test]
    fn test_self_removing_observer_scenario() {
        let (mut dispatcher, _registry) = TelemetryDispatcher::new(DeviceId::new("dash-01"));

        let o_calls = counter();
        let p_calls = counter();

        let o = o_calls.clone();
        dispatcher.add_observer(move |_: &TelemetrySnapshot| {
            let count = o.fetch_add(1, Ordering::SeqCst) + 1;
            count < 3
        });
        let p = p_calls.clone();
        dispatcher.add_observer(move |_: &TelemetrySnapshot| {
            p.fetch_add(1, Ordering::SeqCst);
            true
        });

        for _ in 0..5 {
            dispatcher.dispatch(packet("dash-01"));
        }

        assert_eq!(o_calls.load(Ordering::SeqCst), 3);
        assert_eq!(p_calls.load(Ordering::SeqCst), 5);
        assert_eq!(dispatcher.observer_count(), 1);
    }

    #[test]
    fn test_removal_does_not_skip_neighbours() {
        let (mut dispatcher, _registry) = TelemetryDispatcher::new(DeviceId::new("dash-01"));
        let order = Arc::new(Mutex::new(Vec::new()));

        // a and c drop out on the first packet, b and d stay
        for (name, keep) in [("a", false), ("b", true), ("c", false), ("d", true)] {
            let order = order.clone();
            dispatcher.add_observer(move |_: &TelemetrySnapshot| {
                order.lock().unwrap().push(name);
                keep
            });
        }

        let outcome = dispatcher.dispatch(packet("dash-01"));
        assert!(matches!(
            outcome,
            DispatchOutcome::Delivered {
                invoked: 4,
                removed: 2,
                ..
            }
        ));
        assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c", "d"]);

        order.lock().unwrap().clear();
        dispatcher.dispatch(packet("dash-01"));
        assert_eq!(*order.lock().unwrap(), vec!["b", "d"]);
    }

    #[test]
    fn test_foreign_device_packet_is_dropped() {
        let (mut dispatcher, _registry) = TelemetryDispatcher::new(DeviceId::new("dash-01"));
        let calls = counter();
        let c = calls.clone();
        dispatcher.add_observer(move |_: &TelemetrySnapshot| {
            c.fetch_add(1, Ordering::SeqCst);
            true
        });

        assert!(matches!(
            dispatcher.dispatch(packet("dash-99")),
            DispatchOutcome::Dropped
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        dispatcher.dispatch(packet("dash-01"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.packets_dispatched(), 1);
    }

    #[test]
    fn test_observer_added_during_dispatch_waits_for_next_packet() {
        let (mut dispatcher, registry) = TelemetryDispatcher::new(DeviceId::new("dash-01"));
        let late_calls = counter();

        let late = late_calls.clone();
        let mut spawned = false;
        dispatcher.add_observer(move |_: &TelemetrySnapshot| {
            if !spawned {
                spawned = true;
                let late = late.clone();
                registry
                    .add(move |_: &TelemetrySnapshot| {
                        late.fetch_add(1, Ordering::SeqCst);
                        true
                    })
                    .unwrap();
            }
            true
        });

        dispatcher.dispatch(packet("dash-01"));
        assert_eq!(late_calls.load(Ordering::SeqCst), 0);

        dispatcher.dispatch(packet("dash-01"));
        assert_eq!(late_calls.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.observer_count(), 2);
    }

    #[test]
    fn test_duplicates_are_called_in_insertion_order() {
        let (mut dispatcher, registry) = TelemetryDispatcher::new(DeviceId::new("dash-01"));
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut ids = Vec::new();
        for name in ["a", "b", "a"] {
            let order = order.clone();
            let id = registry
                .add(move |s: &TelemetrySnapshot| {
                    order.lock().unwrap().push((name, s.sequence()));
                    true
                })
                .unwrap();
            ids.push(id);
        }

        dispatcher.dispatch(packet("dash-01"));
        dispatcher.dispatch(packet("dash-01"));
        assert_eq!(
            *order.lock().unwrap(),
            vec![("a", 1), ("b", 1), ("a", 1), ("a", 2), ("b", 2), ("a", 2)]
        );
        assert_eq!(dispatcher.observer_ids(), ids);
    }

    #[test]
    fn test_remove_by_id() {
        let (mut dispatcher, registry) = TelemetryDispatcher::new(DeviceId::new("dash-01"));
        let calls = counter();
        let c = calls.clone();
        let id = registry
            .add(move |_: &TelemetrySnapshot| {
                c.fetch_add(1, Ordering::SeqCst);
                true
            })
            .unwrap();

        dispatcher.dispatch(packet("dash-01"));
        registry.remove(id).unwrap();
        dispatcher.dispatch(packet("dash-01"));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.observer_count(), 0);
    }

    #[test]
    fn test_failing_observers_are_isolated() {
        let (mut dispatcher, _registry) = TelemetryDispatcher::new(DeviceId::new("dash-01"));
        let healthy_calls = counter();

        dispatcher.add_observer(fallible(|_: &TelemetrySnapshot| {
            anyhow::bail!("sensor parse failed")
        }));
        dispatcher.add_observer(|_: &TelemetrySnapshot| -> bool { panic!("observer bug") });
        let h = healthy_calls.clone();
        dispatcher.add_observer(move |_: &TelemetrySnapshot| {
            h.fetch_add(1, Ordering::SeqCst);
            true
        });

        let outcome = dispatcher.dispatch(packet("dash-01"));
        assert!(matches!(
            outcome,
            DispatchOutcome::Delivered { removed: 2, .. }
        ));

        dispatcher.dispatch(packet("dash-01"));
        assert_eq!(healthy_calls.load(Ordering::SeqCst), 2);
        assert_eq!(dispatcher.observer_count(), 1);
    }

    #[test]
    fn test_registry_reports_closed_dispatcher() {
        let (dispatcher, registry) = TelemetryDispatcher::new(DeviceId::new("dash-01"));
        drop(dispatcher);
        assert!(registry.is_closed());
        assert!(matches!(
            registry.add(|_: &TelemetrySnapshot| true),
            Err(ClientError::Disconnected)
        ));
    }
}
