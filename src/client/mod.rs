//! Robot client
//!
//! Connects to one robot through a [`RobotTransport`], paces commands against
//! the telemetry stream and fans telemetry out to observers.

mod actions;
mod commands;
mod config;
mod event_loop;

pub use actions::ActionCompletion;
pub use config::ClientConfig;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{info, warn};
use wonder_shared::state_machine::{LinkEvent, LinkState};
use wonder_shared::{DeviceInfo, RobotCommand};

use crate::command::{await_completion, await_until, CommandGate, Completion, GateHandle};
use crate::connection::{Link, ReconnectPolicy, Session, SessionRegistry};
use crate::error::{ClientError, Result};
use crate::health::{HealthConfig, HealthMonitor};
use crate::telemetry::{
    snapshot_stream, ObserverId, ObserverRegistry, SnapshotStream, TelemetryDispatcher,
    TelemetryObserver,
};
use crate::transport::{RobotTransport, TransportError, TransportEvent};
use event_loop::EventLoop;

/// Everything that exists only while connected
struct Active {
    session: Session,
    observers: ObserverRegistry,
    gate: GateHandle,
    task: JoinHandle<()>,
}

impl Drop for Active {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Command/telemetry client for a single robot
pub struct RobotClient {
    transport: Arc<dyn RobotTransport>,
    registry: SessionRegistry,
    config: ClientConfig,
    link: Link,
    active: Option<Active>,
}

impl RobotClient {
    pub fn new(
        transport: Arc<dyn RobotTransport>,
        registry: SessionRegistry,
        config: ClientConfig,
    ) -> Self {
        Self {
            transport,
            registry,
            config,
            link: Link::new(),
            active: None,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Connect to the robot and start processing its telemetry.
    ///
    /// Calling this while connected returns the bound device again.
    pub async fn connect(&mut self) -> Result<DeviceInfo> {
        if let Ok(active) = self.active() {
            return Ok(active.session.device().clone());
        }
        self.active = None;

        self.link.process(LinkEvent::ConnectRequested).await;
        let mut events = self.transport.subscribe();

        let session = match self.open_session(&mut events).await {
            Ok(session) => session,
            Err(e) => {
                warn!("[CLIENT] Connect failed: {}", e);
                self.link.process(LinkEvent::ConnectFailed).await;
                return Err(e);
            }
        };

        let device = session.device().clone();
        self.registry.register(session.clone()).await;

        let (dispatcher, observers) = TelemetryDispatcher::new(device.id.clone());
        let (gate, gate_handle) = CommandGate::new();
        let event_loop = EventLoop {
            events,
            dispatcher,
            gate,
            link: self.link.clone(),
            registry: self.registry.clone(),
        };
        let task = tokio::spawn(event_loop.run());

        self.active = Some(Active {
            session,
            observers,
            gate: gate_handle,
            task,
        });

        Ok(device)
    }

    async fn open_session(
        &self,
        events: &mut mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Result<Session> {
        match self.transport.connect().await {
            Ok(()) => {
                let device = self.await_connected(events).await?;
                info!("[CLIENT] Connected to {} via {}", device.id, self.transport.name());
                self.link.process(LinkEvent::ConnectEvent(device.id.clone())).await;
                Ok(Session::new(device, self.transport.clone()))
            }
            Err(TransportError::AlreadyConnected) => {
                if self.config.reconnect_policy == ReconnectPolicy::Fail {
                    return Err(ClientError::AlreadyConnected);
                }
                let last = self
                    .registry
                    .last_connected()
                    .await
                    .ok_or(ClientError::AlreadyConnected)?;
                info!("[CLIENT] Already connected, reusing session {}", last.device_id());
                self.link
                    .process(LinkEvent::AlreadyConnected(last.device_id().clone()))
                    .await;
                Ok(Session::new(last.device().clone(), self.transport.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn await_connected(
        &self,
        events: &mut mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Result<DeviceInfo> {
        let wait = async {
            loop {
                match events.recv().await {
                    Some(TransportEvent::Connected(device)) => return Ok(device),
                    Some(_) => continue,
                    None => return Err(ClientError::Transport(TransportError::Closed)),
                }
            }
        };

        timeout(self.config.connect_timeout, wait)
            .await
            .map_err(|_| ClientError::ConnectTimeout(self.config.connect_timeout))?
    }

    fn active(&self) -> Result<&Active> {
        match &self.active {
            Some(active) if !active.task.is_finished() => Ok(active),
            _ => Err(ClientError::NotConnected),
        }
    }

    pub async fn state(&self) -> LinkState {
        self.link.state().await
    }

    /// The connected robot, if any
    pub fn device(&self) -> Option<DeviceInfo> {
        self.active().ok().map(|a| a.session.device().clone())
    }

    pub fn is_connected(&self) -> bool {
        self.active().is_ok()
    }

    /// Send a command and return a completion that resolves on the next
    /// qualifying telemetry packet
    pub fn fire(&self, command: RobotCommand) -> Result<Completion> {
        let active = self.active()?;
        command.validate()?;
        active.session.fire(&command)?;
        active.gate.arm()
    }

    /// Send a command and wait for the next telemetry tick, bounded by the
    /// configured command timeout
    pub async fn send_and_await(&self, command: RobotCommand) -> Result<()> {
        let name = command.name();
        let completion = self.fire(command)?;
        await_completion(completion, self.config.command_timeout, name).await
    }

    pub async fn send_and_await_timeout(&self, command: RobotCommand, limit: Duration) -> Result<()> {
        let name = command.name();
        let completion = self.fire(command)?;
        await_completion(completion, Some(limit), name).await
    }

    /// Send a command and wait for the next telemetry tick unless `cancel`
    /// resolves first
    pub async fn send_and_await_until<C>(&self, command: RobotCommand, cancel: C) -> Result<()>
    where
        C: Future<Output = ()>,
    {
        let name = command.name();
        let completion = self.fire(command)?;
        await_until(completion, cancel, name).await
    }

    /// Register an observer; it sees packets from the next one on
    pub fn add_observer(&self, observer: impl TelemetryObserver) -> Result<ObserverId> {
        self.active()?.observers.add(observer)
    }

    pub fn remove_observer(&self, id: ObserverId) -> Result<()> {
        self.active()?.observers.remove(id)
    }

    /// Registry handle usable from other tasks and from inside observers
    pub fn observers(&self) -> Result<ObserverRegistry> {
        Ok(self.active()?.observers.clone())
    }

    /// Snapshots of every qualifying packet from now on.
    ///
    /// The stream buffers up to
    /// [`SNAPSHOT_BUFFER`](crate::telemetry::SNAPSHOT_BUFFER) snapshots;
    /// while it is full, newer packets are skipped for this stream only.
    pub fn telemetry(&self) -> Result<SnapshotStream> {
        snapshot_stream(&self.active()?.observers)
    }

    /// Start watching this client's link health
    pub fn health_monitor(&self, config: HealthConfig) -> HealthMonitor {
        HealthMonitor::start(self.link.clone(), config)
    }
}
