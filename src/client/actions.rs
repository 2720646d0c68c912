//! Completion-aware actions
//!
//! Commands such as sounds, poses and head moves take longer than one
//! telemetry tick. An action fires its command through the gate, then
//! watches telemetry until the robot reports the action done. Packets within
//! the settle period are ignored since the robot may not have started yet.

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{self, Instant};
use tracing::debug;
use wonder_shared::{clamp_head_pan, clamp_head_tilt, limits, RobotCommand, TelemetrySnapshot};

use super::RobotClient;
use crate::error::{ClientError, Result};
use crate::telemetry::ObserverRegistry;

/// Resolves once the robot reports an action finished
#[must_use = "an action completion does nothing unless waited on"]
#[derive(Debug)]
pub struct ActionCompletion {
    rx: oneshot::Receiver<()>,
    action: &'static str,
    timeout: Duration,
}

impl ActionCompletion {
    pub fn action(&self) -> &'static str {
        self.action
    }

    /// Wait for the action, bounded by the configured action timeout
    pub async fn wait(self) -> Result<()> {
        match time::timeout(self.timeout, self.rx).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(ClientError::Disconnected),
            Err(_) => Err(ClientError::ActionTimeout {
                action: self.action,
                timeout: self.timeout,
            }),
        }
    }
}

/// Register an observer that signals once `done` holds after `settle`
fn watch_until<F>(
    observers: &ObserverRegistry,
    settle: Duration,
    action: &'static str,
    mut done: F,
) -> Result<oneshot::Receiver<()>>
where
    F: FnMut(&TelemetrySnapshot) -> bool + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    let mut tx = Some(tx);
    let settled_at = Instant::now() + settle;

    observers.add(move |snapshot: &TelemetrySnapshot| {
        let waiting = tx.as_ref().is_some_and(|tx| !tx.is_closed());
        if !waiting {
            return false;
        }
        if Instant::now() < settled_at || !done(snapshot) {
            return true;
        }

        debug!("[ACTION] {} finished at packet {}", action, snapshot.sequence());
        if let Some(tx) = tx.take() {
            let _ = tx.send(());
        }
        false
    })?;

    Ok(rx)
}

/// Whether a reported head angle is strictly within `tolerance` of `target`
fn head_in_position(reported: f64, target: f64, tolerance: f64) -> bool {
    (reported - target).abs() < tolerance
}

impl RobotClient {
    async fn start_action<F>(&self, command: RobotCommand, done: F) -> Result<ActionCompletion>
    where
        F: FnMut(&TelemetrySnapshot) -> bool + Send + 'static,
    {
        let action = command.name();
        self.send_and_await(command).await?;

        let rx = watch_until(&self.active()?.observers, self.config.action_settle, action, done)?;
        Ok(ActionCompletion {
            rx,
            action,
            timeout: self.config.action_timeout,
        })
    }

    /// Play a sound clip and wait until it stops
    pub async fn play_sound(&self, name: &str, volume: f64) -> Result<()> {
        self.play_sound_async(name, volume).await?.wait().await
    }

    pub async fn play_sound_async(&self, name: &str, volume: f64) -> Result<ActionCompletion> {
        self.start_action(RobotCommand::sound(name, volume), |s| {
            s.is_sound_playing() == Some(false)
        })
        .await
    }

    /// Move to a relative pose and wait until the robot reports it reached
    pub async fn pose(&self, x_cm: f64, y_cm: f64, degrees: f64, time_s: f64) -> Result<()> {
        self.pose_async(x_cm, y_cm, degrees, time_s).await?.wait().await
    }

    pub async fn pose_async(
        &self,
        x_cm: f64,
        y_cm: f64,
        degrees: f64,
        time_s: f64,
    ) -> Result<ActionCompletion> {
        let command = RobotCommand::Pose {
            x_cm,
            y_cm,
            degrees,
            time_s,
        };
        self.start_action(command, |s| {
            s.pose_watermark() == Some(limits::POSE_COMPLETE_WATERMARK)
        })
        .await
    }

    /// Pan the head and wait until it is within tolerance of the target
    pub async fn head_pan(&self, degrees: f64) -> Result<()> {
        self.head_pan_async(degrees).await?.wait().await
    }

    pub async fn head_pan_async(&self, degrees: f64) -> Result<ActionCompletion> {
        let target = clamp_head_pan(degrees);
        let tolerance = self.config.head_position_tolerance_deg;
        self.start_action(RobotCommand::head_pan(target), move |s| {
            s.head_pan_degrees()
                .is_some_and(|d| head_in_position(d, target, tolerance))
        })
        .await
    }

    /// Tilt the head and wait until it is within tolerance of the target
    pub async fn head_tilt(&self, degrees: f64) -> Result<()> {
        self.head_tilt_async(degrees).await?.wait().await
    }

    pub async fn head_tilt_async(&self, degrees: f64) -> Result<ActionCompletion> {
        let target = clamp_head_tilt(degrees);
        let tolerance = self.config.head_position_tolerance_deg;
        self.start_action(RobotCommand::head_tilt(target), move |s| {
            s.head_tilt_degrees()
                .is_some_and(|d| head_in_position(d, target, tolerance))
        })
        .await
    }
}
