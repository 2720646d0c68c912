//! Typed command forwarders
//!
//! One method per robot command. Each resolves on the telemetry tick that
//! follows it, like [`RobotClient::send_and_await`].

use wonder_shared::{Rgb, RobotCommand};

use super::RobotClient;
use crate::error::Result;

impl RobotClient {
    /// Light the eye ring: one flag per LED, all at `brightness`
    pub async fn eye_ring(&self, leds: &[bool], brightness: u8) -> Result<()> {
        self.send_and_await(RobotCommand::EyeRing {
            leds: leds.to_vec(),
            brightness,
        })
        .await
    }

    pub async fn rgb_all(&self, color: Rgb) -> Result<()> {
        self.send_and_await(RobotCommand::RgbAll(color)).await
    }

    pub async fn rgb_eye(&self, color: Rgb) -> Result<()> {
        self.send_and_await(RobotCommand::RgbEye(color)).await
    }

    pub async fn rgb_left_ear(&self, color: Rgb) -> Result<()> {
        self.send_and_await(RobotCommand::RgbLeftEar(color)).await
    }

    pub async fn rgb_right_ear(&self, color: Rgb) -> Result<()> {
        self.send_and_await(RobotCommand::RgbRightEar(color)).await
    }

    pub async fn rgb_chest(&self, color: Rgb) -> Result<()> {
        self.send_and_await(RobotCommand::RgbChest(color)).await
    }

    pub async fn rgb_button_main(&self, color: Rgb) -> Result<()> {
        self.send_and_await(RobotCommand::RgbButtonMain(color)).await
    }

    /// Drive at a linear (cm/s) and angular (deg/s) velocity
    pub async fn linear_angular(&self, cm_per_s: f64, deg_per_s: f64) -> Result<()> {
        self.send_and_await(RobotCommand::LinearAngular {
            cm_per_s,
            deg_per_s,
        })
        .await
    }

    pub async fn wheel_speeds(&self, left_cm_s: f64, right_cm_s: f64) -> Result<()> {
        self.send_and_await(RobotCommand::WheelSpeeds {
            left_cm_s,
            right_cm_s,
        })
        .await
    }

    /// Start moving the head; the angle is clamped to the pan range
    pub async fn set_head_pan(&self, degrees: f64) -> Result<()> {
        self.send_and_await(RobotCommand::head_pan(degrees)).await
    }

    /// Start moving the head; the angle is clamped to the tilt range
    pub async fn set_head_tilt(&self, degrees: f64) -> Result<()> {
        self.send_and_await(RobotCommand::head_tilt(degrees)).await
    }

    /// Start a relative pose move without waiting for it to finish
    pub async fn set_pose(&self, x_cm: f64, y_cm: f64, degrees: f64, time_s: f64) -> Result<()> {
        self.send_and_await(RobotCommand::Pose {
            x_cm,
            y_cm,
            degrees,
            time_s,
        })
        .await
    }

    /// Start a sound clip without waiting for it to finish
    pub async fn start_sound(&self, name: &str, volume: f64) -> Result<()> {
        self.send_and_await(RobotCommand::sound(name, volume)).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use wonder_shared::{CommandKind, DeviceInfo, RawTelemetry};

    use super::*;
    use crate::client::ClientConfig;
    use crate::connection::SessionRegistry;
    use crate::error::ClientError;
    use crate::transport::LoopbackTransport;

    async fn connected() -> (RobotClient, LoopbackTransport) {
        let transport = LoopbackTransport::announcing(DeviceInfo::new("dash-01", "Dash"));
        let mut client = RobotClient::new(
            Arc::new(transport.clone()),
            SessionRegistry::new(),
            ClientConfig::default(),
        );
        client.connect().await.unwrap();
        (client, transport)
    }

    /// Keep telemetry flowing so forwarders resolve
    fn pump(transport: &LoopbackTransport) -> tokio::task::JoinHandle<()> {
        let transport = transport.clone();
        tokio::spawn(async move {
            loop {
                transport.push_telemetry(RawTelemetry::new("dash-01", Vec::new()));
                tokio::task::yield_now().await;
            }
        })
    }

    #[tokio::test]
    async fn test_forwarders_send_typed_commands() {
        let (client, transport) = connected().await;
        let pump = pump(&transport);

        client.rgb_all(Rgb::new(1, 2, 3)).await.unwrap();
        client.set_head_pan(500.0).await.unwrap();
        client.set_head_tilt(-90.0).await.unwrap();
        client.wheel_speeds(10.0, -10.0).await.unwrap();
        client.start_sound("HI", 0.5).await.unwrap();
        pump.abort();

        let sent: Vec<RobotCommand> = transport
            .sent_commands()
            .into_iter()
            .map(|(_, command)| command)
            .collect();
        assert_eq!(
            sent,
            vec![
                RobotCommand::RgbAll(Rgb::new(1, 2, 3)),
                RobotCommand::HeadPan { degrees: 120.0 },
                RobotCommand::HeadTilt { degrees: -22.5 },
                RobotCommand::WheelSpeeds {
                    left_cm_s: 10.0,
                    right_cm_s: -10.0
                },
                RobotCommand::sound("HI", 0.5),
            ]
        );
        assert_eq!(sent[0].kind(), CommandKind::LightRgbAll);
    }

    #[tokio::test]
    async fn test_eye_ring_needs_every_led() {
        let (client, transport) = connected().await;

        let result = client.eye_ring(&[true; 6], 255).await;
        assert!(matches!(result, Err(ClientError::InvalidCommand(_))));
        assert!(transport.sent_commands().is_empty());
    }

    #[tokio::test]
    async fn test_pose_rejects_non_positive_time() {
        let (client, _transport) = connected().await;

        let result = client.set_pose(10.0, 0.0, 0.0, 0.0).await;
        assert!(matches!(result, Err(ClientError::InvalidCommand(_))));
    }
}
