//! Client event loop
//!
//! The only task that touches the observer list and the waiter queue. Each
//! qualifying packet is fanned out to the observers first, then releases one
//! waiter, before the next packet is read. Only waiters armed before the
//! fan-out started are candidates, so a command fired from an observer waits
//! for the following packet.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use wonder_shared::state_machine::LinkEvent;
use wonder_shared::DeviceId;

use crate::command::CommandGate;
use crate::connection::{Link, SessionRegistry};
use crate::telemetry::{DispatchOutcome, TelemetryDispatcher};
use crate::transport::TransportEvent;

pub(crate) struct EventLoop {
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
    pub dispatcher: TelemetryDispatcher,
    pub gate: CommandGate,
    pub link: Link,
    pub registry: SessionRegistry,
}

impl EventLoop {
    pub async fn run(mut self) {
        let device = self.dispatcher.device_id().clone();
        debug!("[CLIENT] Event loop started for {}", device);

        loop {
            match self.events.recv().await {
                Some(TransportEvent::Telemetry(packet)) => self.on_telemetry(packet).await,
                Some(TransportEvent::Disconnected(id)) if id == device => {
                    warn!("[CLIENT] {} disconnected", device);
                    break;
                }
                Some(TransportEvent::Connected(info)) => {
                    self.link.process(LinkEvent::ConnectEvent(info.id)).await;
                }
                Some(TransportEvent::Disconnected(_)) => {}
                None => {
                    warn!("[CLIENT] Transport event stream closed");
                    break;
                }
            }
        }

        self.shutdown(&device).await;
    }

    async fn on_telemetry(&mut self, packet: wonder_shared::RawTelemetry) {
        self.gate.begin_tick();
        if let DispatchOutcome::Delivered { snapshot, .. } = self.dispatcher.dispatch(packet) {
            self.gate.on_tick();
            self.link.record_telemetry(snapshot.battery_volts()).await;
        }
    }

    async fn shutdown(&mut self, device: &DeviceId) {
        let abandoned = self.gate.abandon_all();
        if abandoned > 0 {
            warn!("[CLIENT] Failing {} pending command(s)", abandoned);
        }
        self.link.process(LinkEvent::Disconnected).await;
        self.registry.unregister(device).await;
        info!(
            "[CLIENT] Session {} closed after {} packets",
            device,
            self.dispatcher.packets_dispatched()
        );
    }
}
