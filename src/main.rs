use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::StreamExt;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use wonder_client::shared::{Rgb, RobotCommand, TelemetrySnapshot};
use wonder_client::transport::{SimConfig, SimulatedRobot};
use wonder_client::{ClientConfig, HealthConfig, HealthEvent, RobotClient, SessionRegistry};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let robot = SimulatedRobot::spawn(SimConfig::default());
    info!("Simulated robot: {}", robot.device().id);

    let registry = SessionRegistry::new();
    let mut client = RobotClient::new(
        Arc::new(robot.clone()),
        registry.clone(),
        ClientConfig::default(),
    );

    let device = client.connect().await?;
    info!("Connected to {} ({})", device.name, device.id);

    // Reconnecting while connected hands back the same robot
    let mut second = RobotClient::new(Arc::new(robot.clone()), registry, ClientConfig::default());
    let reused = second.connect().await?;
    info!("Second client bound to {}", reused.id);
    drop(second);

    let mut health = client.health_monitor(HealthConfig::default());
    tokio::spawn(async move {
        while let Some(event) = health.recv_event().await {
            match event {
                HealthEvent::TelemetryStalled { silent_for_ms } => {
                    warn!("Telemetry stalled for {}ms", silent_for_ms)
                }
                HealthEvent::TelemetryResumed => info!("Telemetry resumed"),
                HealthEvent::BatteryLow { volts } => warn!("Battery low: {:.2}V", volts),
            }
        }
    });

    let mut seen = 0u32;
    client.add_observer(move |snapshot: &TelemetrySnapshot| {
        seen += 1;
        if seen % 20 == 0 {
            info!(
                "Packet {}: pan {:?} tilt {:?}",
                snapshot.sequence(),
                snapshot.head_pan_degrees(),
                snapshot.head_tilt_degrees()
            );
        }
        seen < 200
    })?;

    client.rgb_all(Rgb::new(0, 64, 255)).await?;
    client.eye_ring(&[true; 12], 200).await?;

    client.head_pan(60.0).await?;
    client.head_tilt(-20.0).await?;
    client.play_sound("HI", 0.8).await?;
    client.pose(20.0, 0.0, 90.0, 1.5).await?;

    let mut snapshots = client.telemetry()?.take(3);
    while let Some(snapshot) = snapshots.next().await {
        info!("Snapshot {} with {} sensors", snapshot.sequence(), snapshot.sensors().count());
    }

    robot.set_battery(3.4);
    client.rgb_chest(Rgb::new(255, 0, 0)).await?;
    tokio::time::sleep(Duration::from_millis(300)).await;

    robot.disconnect();
    let last = client
        .send_and_await_timeout(RobotCommand::RgbAll(Rgb::OFF), Duration::from_secs(1))
        .await;
    match last {
        Ok(()) => info!("Last command completed"),
        Err(e) => info!("Last command ended: {}", e),
    }

    info!("Final link state: {:?}", client.state().await);
    Ok(())
}
