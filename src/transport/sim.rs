//! Simulated robot
//!
//! A background task that behaves like a connected robot: it streams
//! telemetry at a fixed interval while connected, slews the head towards
//! commanded angles, reports sound playback and pose progress, and drops
//! the connection on request. Time follows the tokio clock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, trace};
use wonder_shared::sensors::{RawSensor, SensorId, SensorReading};
use wonder_shared::{limits, pacing, DeviceId, DeviceInfo, RawTelemetry, RobotCommand};

use super::traits::{RobotTransport, TransportError, TransportEvent};

/// Simulated robot configuration
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub device: DeviceInfo,
    pub telemetry_interval: Duration,
    /// Maximum head movement per telemetry tick
    pub head_slew_deg: f64,
    /// How long any sound clip plays
    pub sound_duration: Duration,
    pub battery_volts: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            device: DeviceInfo::new("dash-sim", "Dash"),
            telemetry_interval: Duration::from_millis(pacing::TELEMETRY_INTERVAL_MS),
            head_slew_deg: 6.0,
            sound_duration: Duration::from_millis(800),
            battery_volts: 4.1,
        }
    }
}

enum Control {
    Subscribe(mpsc::UnboundedSender<TransportEvent>),
    Connect(oneshot::Sender<Result<(), TransportError>>),
    Command(RobotCommand),
    Disconnect,
    SetBattery(f64),
    PauseTelemetry(bool),
}

/// Handle to a running simulated robot
#[derive(Clone)]
pub struct SimulatedRobot {
    device: DeviceInfo,
    control: mpsc::UnboundedSender<Control>,
    connected: Arc<AtomicBool>,
}

impl SimulatedRobot {
    /// Start the simulation task. Must be called from within a tokio runtime.
    /// The task stops once every handle is dropped.
    pub fn spawn(config: SimConfig) -> Self {
        let (control, rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(false));

        let device = config.device.clone();
        let sim = SimState::new(config, connected.clone());
        tokio::spawn(sim.run(rx));

        Self {
            device,
            control,
            connected,
        }
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Drop the connection as if the robot went out of range
    pub fn disconnect(&self) {
        let _ = self.control.send(Control::Disconnect);
    }

    /// Change the reported battery voltage
    pub fn set_battery(&self, volts: f64) {
        let _ = self.control.send(Control::SetBattery(volts));
    }

    /// Stop or resume telemetry without dropping the connection
    pub fn pause_telemetry(&self, paused: bool) {
        let _ = self.control.send(Control::PauseTelemetry(paused));
    }
}

#[async_trait]
impl RobotTransport for SimulatedRobot {
    fn subscribe(&self) -> mpsc::UnboundedReceiver<TransportEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        // A stopped simulation leaves the receiver closed
        let _ = self.control.send(Control::Subscribe(tx));
        rx
    }

    async fn connect(&self) -> Result<(), TransportError> {
        let (tx, rx) = oneshot::channel();
        self.control
            .send(Control::Connect(tx))
            .map_err(|_| TransportError::Closed)?;
        rx.await.map_err(|_| TransportError::Closed)?
    }

    fn send(&self, device: &DeviceId, command: &RobotCommand) -> Result<(), TransportError> {
        if *device != self.device.id || !self.is_connected() {
            return Err(TransportError::NotConnected(device.clone()));
        }
        self.control
            .send(Control::Command(command.clone()))
            .map_err(|_| TransportError::Closed)
    }

    fn name(&self) -> &'static str {
        "Simulated"
    }
}

/// Robot state owned by the simulation task
struct SimState {
    config: SimConfig,
    connected: Arc<AtomicBool>,
    subscribers: Vec<mpsc::UnboundedSender<TransportEvent>>,
    telemetry_paused: bool,
    pan: f64,
    tilt: f64,
    pan_target: f64,
    tilt_target: f64,
    sound_until: Option<Instant>,
    pose: Option<(Instant, Duration)>,
    battery_volts: f64,
}

impl SimState {
    fn new(config: SimConfig, connected: Arc<AtomicBool>) -> Self {
        let battery_volts = config.battery_volts;
        Self {
            config,
            connected,
            subscribers: Vec::new(),
            telemetry_paused: false,
            pan: 0.0,
            tilt: 0.0,
            pan_target: 0.0,
            tilt_target: 0.0,
            sound_until: None,
            pose: None,
            battery_volts,
        }
    }

    async fn run(mut self, mut control: mpsc::UnboundedReceiver<Control>) {
        let mut ticker = time::interval(self.config.telemetry_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let streaming = self.is_connected() && !self.telemetry_paused;

            tokio::select! {
                msg = control.recv() => match msg {
                    Some(msg) => self.handle(msg),
                    None => break,
                },
                _ = ticker.tick(), if streaming => self.tick(),
            }
        }

        debug!("[SIM] {} stopped", self.config.device.id);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn handle(&mut self, msg: Control) {
        match msg {
            Control::Subscribe(tx) => self.subscribers.push(tx),
            Control::Connect(reply) => {
                let result = if self.is_connected() {
                    Err(TransportError::AlreadyConnected)
                } else {
                    info!("[SIM] {} connected", self.config.device.id);
                    self.connected.store(true, Ordering::SeqCst);
                    self.broadcast(TransportEvent::Connected(self.config.device.clone()));
                    Ok(())
                };
                let _ = reply.send(result);
            }
            Control::Command(command) => self.apply(command),
            Control::Disconnect => {
                if self.is_connected() {
                    info!("[SIM] {} disconnected", self.config.device.id);
                    self.connected.store(false, Ordering::SeqCst);
                    self.broadcast(TransportEvent::Disconnected(self.config.device.id.clone()));
                }
            }
            Control::SetBattery(volts) => self.battery_volts = volts,
            Control::PauseTelemetry(paused) => self.telemetry_paused = paused,
        }
    }

    fn apply(&mut self, command: RobotCommand) {
        let now = Instant::now();
        match command {
            RobotCommand::HeadPan { degrees } => {
                self.pan_target = degrees.clamp(-limits::HEAD_PAN_MAX_DEG, limits::HEAD_PAN_MAX_DEG);
            }
            RobotCommand::HeadTilt { degrees } => {
                self.tilt_target = degrees.clamp(limits::HEAD_TILT_MIN_DEG, limits::HEAD_TILT_MAX_DEG);
            }
            RobotCommand::Sound { ref name, .. } => {
                debug!("[SIM] Playing {}", name);
                self.sound_until = Some(now + self.config.sound_duration);
            }
            RobotCommand::Pose { time_s, .. } => {
                let duration = Duration::try_from_secs_f64(time_s).unwrap_or_default();
                self.pose = Some((now, duration));
            }
            other => trace!("[SIM] {} has no simulated effect", other.name()),
        }
    }

    fn tick(&mut self) {
        let now = Instant::now();
        let slew = self.config.head_slew_deg;
        self.pan = step_towards(self.pan, self.pan_target, slew);
        self.tilt = step_towards(self.tilt, self.tilt_target, slew);

        if self.sound_until.is_some_and(|until| now >= until) {
            self.sound_until = None;
        }

        let watermark = match self.pose {
            Some((started, duration)) => {
                let elapsed = now.duration_since(started);
                if elapsed >= duration {
                    self.pose = None;
                    limits::POSE_COMPLETE_WATERMARK
                } else {
                    let progress = elapsed.as_secs_f64() / duration.as_secs_f64();
                    (progress * limits::POSE_COMPLETE_WATERMARK).floor()
                }
            }
            None => limits::POSE_COMPLETE_WATERMARK,
        };

        let packet = RawTelemetry::new(
            self.config.device.id.clone(),
            vec![
                RawSensor::new(
                    SensorId::HeadPositionPan,
                    SensorReading::new().with("degree", self.pan),
                ),
                RawSensor::new(
                    SensorId::HeadPositionTilt,
                    SensorReading::new().with("degree", self.tilt),
                ),
                RawSensor::new(
                    SensorId::SoundPlaying,
                    SensorReading::new().with("flag", bool_field(self.sound_until.is_some())),
                ),
                RawSensor::new(
                    SensorId::BodyPose,
                    SensorReading::new().with("watermark", watermark),
                ),
                RawSensor::new(
                    SensorId::Battery,
                    SensorReading::new().with("voltage", self.battery_volts),
                ),
            ],
        );
        self.broadcast(TransportEvent::Telemetry(packet));
    }

    fn broadcast(&mut self, event: TransportEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

fn step_towards(current: f64, target: f64, max_step: f64) -> f64 {
    let delta = target - current;
    if delta.abs() <= max_step {
        target
    } else {
        current + max_step.copysign(delta)
    }
}

fn bool_field(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}
