//! Health Monitor
//!
//! Runs a background task that watches the link for stalled telemetry and a
//! low battery and reports each condition once when it appears.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};
use wonder_shared::health;
use wonder_shared::state_machine::{HealthCondition, LinkState};

use crate::connection::Link;

/// Health monitor configuration
#[derive(Debug, Clone)]
pub struct HealthConfig {
    pub check_interval: Duration,
    /// Silence after which telemetry counts as stalled
    pub stall_after: Duration,
    pub battery_low_volts: f64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_millis(health::CHECK_INTERVAL_MS),
            stall_after: Duration::from_millis(health::TELEMETRY_STALL_MS),
            battery_low_volts: health::BATTERY_LOW_VOLTS,
        }
    }
}

/// Reported on the edges of a health condition
#[derive(Debug, Clone, PartialEq)]
pub enum HealthEvent {
    TelemetryStalled { silent_for_ms: u64 },
    TelemetryResumed,
    BatteryLow { volts: f64 },
}

/// Watches one client's link until dropped
pub struct HealthMonitor {
    events: mpsc::UnboundedReceiver<HealthEvent>,
    task: JoinHandle<()>,
}

impl HealthMonitor {
    /// Start the monitoring background task
    pub fn start(link: Link, config: HealthConfig) -> Self {
        let (tx, events) = mpsc::unbounded_channel();
        let task = tokio::spawn(watch(link, config, tx));
        Self { events, task }
    }

    /// Receive the next health event. `None` once monitoring has stopped.
    pub async fn recv_event(&mut self) -> Option<HealthEvent> {
        self.events.recv().await
    }

    /// Non-blocking variant of [`recv_event`](Self::recv_event)
    pub fn try_recv_event(&mut self) -> Option<HealthEvent> {
        self.events.try_recv().ok()
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn watch(link: Link, config: HealthConfig, tx: mpsc::UnboundedSender<HealthEvent>) {
    let stall_ms = config.stall_after.as_millis() as u64;
    let mut ticker = interval(config.check_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut stalled = false;
    let mut battery_low = false;

    loop {
        ticker.tick().await;

        if link.state().await != LinkState::Connected {
            stalled = false;
            battery_low = false;
            continue;
        }

        let conditions = link.check_health(stall_ms, config.battery_low_volts).await;
        let mut now_stalled = false;
        let mut now_low = false;

        for condition in conditions {
            match condition {
                HealthCondition::TelemetryStalled { silent_for_ms } => {
                    now_stalled = true;
                    if !stalled {
                        warn!("[HEALTH] No telemetry for {}ms", silent_for_ms);
                        if tx.send(HealthEvent::TelemetryStalled { silent_for_ms }).is_err() {
                            return;
                        }
                    }
                }
                HealthCondition::BatteryLow { volts } => {
                    now_low = true;
                    if !battery_low {
                        warn!("[HEALTH] Battery low: {:.2}V", volts);
                        if tx.send(HealthEvent::BatteryLow { volts }).is_err() {
                            return;
                        }
                    }
                }
            }
        }

        if stalled && !now_stalled {
            info!("[HEALTH] Telemetry resumed");
            if tx.send(HealthEvent::TelemetryResumed).is_err() {
                return;
            }
        }

        stalled = now_stalled;
        battery_low = now_low;
    }
}
