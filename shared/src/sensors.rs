//! Sensor Telemetry Types
//!
//! Raw telemetry as delivered by a transport, the sensor catalogue, and the
//! immutable snapshot handed to observers.

use std::collections::BTreeMap;

use crate::DeviceId;

/// Sensors reported by the robot, keyed by their numeric protocol code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum SensorId {
    ButtonMain = 1000,
    Button1 = 1001,
    Button2 = 1002,
    Button3 = 1003,
    HeadPositionPan = 2000,
    HeadPositionTilt = 2001,
    BodyPose = 2002,
    Accelerometer = 2003,
    Gyroscope = 2004,
    DistanceFrontLeftFacing = 3000,
    DistanceFrontRightFacing = 3001,
    DistanceBack = 3002,
    EncoderLeftWheel = 3003,
    EncoderRightWheel = 3004,
    Microphone = 3005,
    Battery = 3006,
    Beacon = 3007,
    MicEvent = 3008,
    BeaconV2 = 3009,
    Attitude = 3010,
    Gestures = 3011,
    Kidnap = 4001,
    StallBump = 4002,
    SoundPlaying = 4003,
    AnimationPlaying = 4006,
    Raw1 = 5101,
    Raw2 = 5102,
    PingResponse = 9000,
}

impl SensorId {
    /// Every known sensor, in code order
    pub const ALL: [SensorId; 28] = [
        SensorId::ButtonMain,
        SensorId::Button1,
        SensorId::Button2,
        SensorId::Button3,
        SensorId::HeadPositionPan,
        SensorId::HeadPositionTilt,
        SensorId::BodyPose,
        SensorId::Accelerometer,
        SensorId::Gyroscope,
        SensorId::DistanceFrontLeftFacing,
        SensorId::DistanceFrontRightFacing,
        SensorId::DistanceBack,
        SensorId::EncoderLeftWheel,
        SensorId::EncoderRightWheel,
        SensorId::Microphone,
        SensorId::Battery,
        SensorId::Beacon,
        SensorId::MicEvent,
        SensorId::BeaconV2,
        SensorId::Attitude,
        SensorId::Gestures,
        SensorId::Kidnap,
        SensorId::StallBump,
        SensorId::SoundPlaying,
        SensorId::AnimationPlaying,
        SensorId::Raw1,
        SensorId::Raw2,
        SensorId::PingResponse,
    ];

    /// Numeric protocol code
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Look up a sensor by its protocol code
    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.code() == code)
    }

    /// Protocol name, as used by the robot SDK
    pub fn name(self) -> &'static str {
        match self {
            SensorId::ButtonMain => "BUTTON_MAIN",
            SensorId::Button1 => "BUTTON_1",
            SensorId::Button2 => "BUTTON_2",
            SensorId::Button3 => "BUTTON_3",
            SensorId::HeadPositionPan => "HEAD_POSITION_PAN",
            SensorId::HeadPositionTilt => "HEAD_POSITION_TILT",
            SensorId::BodyPose => "BODY_POSE",
            SensorId::Accelerometer => "ACCELEROMETER",
            SensorId::Gyroscope => "GYROSCOPE",
            SensorId::DistanceFrontLeftFacing => "DISTANCE_FRONT_LEFT_FACING",
            SensorId::DistanceFrontRightFacing => "DISTANCE_FRONT_RIGHT_FACING",
            SensorId::DistanceBack => "DISTANCE_BACK",
            SensorId::EncoderLeftWheel => "ENCODER_LEFT_WHEEL",
            SensorId::EncoderRightWheel => "ENCODER_RIGHT_WHEEL",
            SensorId::Microphone => "MICROPHONE",
            SensorId::Battery => "BATTERY",
            SensorId::Beacon => "BEACON",
            SensorId::MicEvent => "MIC_EVENT",
            SensorId::BeaconV2 => "BEACON_V2",
            SensorId::Attitude => "ATTITUDE",
            SensorId::Gestures => "GESTURES",
            SensorId::Kidnap => "KIDNAP",
            SensorId::StallBump => "STALLBUMP",
            SensorId::SoundPlaying => "SOUND_PLAYING",
            SensorId::AnimationPlaying => "ANIMATION_PLAYING",
            SensorId::Raw1 => "RAW1",
            SensorId::Raw2 => "RAW2",
            SensorId::PingResponse => "PING_RESPONSE",
        }
    }
}

/// Named numeric fields of one sensor (e.g. `degree`, `watermark`, `flag`)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorReading {
    fields: BTreeMap<String, f64>,
}

impl SensorReading {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field insertion
    pub fn with(mut self, field: impl Into<String>, value: f64) -> Self {
        self.fields.insert(field.into(), value);
        self
    }

    /// Value of a field, if the robot reported it in this packet
    pub fn get(&self, field: &str) -> Option<f64> {
        self.fields.get(field).copied()
    }

    /// Boolean view of a field: any non-zero value is `true`
    pub fn flag(&self, field: &str) -> Option<bool> {
        self.get(field).map(|v| v != 0.0)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, f64)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// One sensor entry of a raw packet, still keyed by protocol code
#[derive(Debug, Clone, PartialEq)]
pub struct RawSensor {
    pub code: u16,
    pub reading: SensorReading,
}

impl RawSensor {
    pub fn new(sensor: SensorId, reading: SensorReading) -> Self {
        Self {
            code: sensor.code(),
            reading,
        }
    }
}

/// A telemetry packet as pushed by the transport
#[derive(Debug, Clone, PartialEq)]
pub struct RawTelemetry {
    /// Identity of the robot that produced the packet
    pub device_id: DeviceId,
    /// Transport receive time in milliseconds since Unix epoch
    pub timestamp_ms: u64,
    /// Sensor entries; sparse sensors may be missing from any given packet
    pub sensors: Vec<RawSensor>,
}

impl RawTelemetry {
    pub fn new(device_id: impl Into<DeviceId>, sensors: Vec<RawSensor>) -> Self {
        Self {
            device_id: device_id.into(),
            timestamp_ms: crate::now_ms(),
            sensors,
        }
    }
}

/// Immutable, device-scoped view of one telemetry packet
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySnapshot {
    device_id: DeviceId,
    sequence: u64,
    timestamp_ms: u64,
    readings: BTreeMap<SensorId, SensorReading>,
}

impl TelemetrySnapshot {
    /// Convert a raw packet, dropping entries with unknown sensor codes.
    /// `sequence` counts qualifying packets for the bound device, starting at 1.
    pub fn from_raw(raw: RawTelemetry, sequence: u64) -> Self {
        let readings = raw
            .sensors
            .into_iter()
            .filter_map(|s| SensorId::from_code(s.code).map(|id| (id, s.reading)))
            .collect();

        Self {
            device_id: raw.device_id,
            sequence,
            timestamp_ms: raw.timestamp_ms,
            readings,
        }
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    pub fn reading(&self, sensor: SensorId) -> Option<&SensorReading> {
        self.readings.get(&sensor)
    }

    pub fn field(&self, sensor: SensorId, field: &str) -> Option<f64> {
        self.reading(sensor).and_then(|r| r.get(field))
    }

    pub fn sensors(&self) -> impl Iterator<Item = SensorId> + '_ {
        self.readings.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Reported head pan angle in degrees
    pub fn head_pan_degrees(&self) -> Option<f64> {
        self.field(SensorId::HeadPositionPan, "degree")
    }

    /// Reported head tilt angle in degrees
    pub fn head_tilt_degrees(&self) -> Option<f64> {
        self.field(SensorId::HeadPositionTilt, "degree")
    }

    /// `BODY_POSE.watermark`; sparse, so often absent
    pub fn pose_watermark(&self) -> Option<f64> {
        self.field(SensorId::BodyPose, "watermark")
    }

    pub fn is_sound_playing(&self) -> Option<bool> {
        self.reading(SensorId::SoundPlaying).and_then(|r| r.flag("flag"))
    }

    pub fn battery_volts(&self) -> Option<f64> {
        self.field(SensorId::Battery, "voltage")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_codes() {
        assert_eq!(SensorId::HeadPositionPan.code(), 2000);
        assert_eq!(SensorId::from_code(4003), Some(SensorId::SoundPlaying));
        assert_eq!(SensorId::from_code(9000), Some(SensorId::PingResponse));
        assert_eq!(SensorId::from_code(1234), None);
    }

    #[test]
    fn test_sensor_names() {
        assert_eq!(SensorId::BodyPose.name(), "BODY_POSE");
        assert_eq!(SensorId::StallBump.name(), "STALLBUMP");
    }

    #[test]
    fn test_snapshot_skips_unknown_codes() {
        let raw = RawTelemetry::new(
            "dash-01",
            vec![
                RawSensor::new(SensorId::HeadPositionPan, SensorReading::new().with("degree", 12.5)),
                RawSensor {
                    code: 7777,
                    reading: SensorReading::new().with("x", 1.0),
                },
            ],
        );

        let snapshot = TelemetrySnapshot::from_raw(raw, 1);
        assert_eq!(snapshot.sequence(), 1);
        assert_eq!(snapshot.head_pan_degrees(), Some(12.5));
        assert_eq!(snapshot.sensors().count(), 1);
    }

    #[test]
    fn test_snapshot_accessors() {
        let raw = RawTelemetry::new(
            "dash-01",
            vec![
                RawSensor::new(SensorId::SoundPlaying, SensorReading::new().with("flag", 1.0)),
                RawSensor::new(SensorId::BodyPose, SensorReading::new().with("watermark", 255.0)),
                RawSensor::new(SensorId::Battery, SensorReading::new().with("voltage", 4.1)),
            ],
        );

        let snapshot = TelemetrySnapshot::from_raw(raw, 3);
        assert_eq!(snapshot.is_sound_playing(), Some(true));
        assert_eq!(snapshot.pose_watermark(), Some(255.0));
        assert_eq!(snapshot.battery_volts(), Some(4.1));
        assert_eq!(snapshot.head_tilt_degrees(), None);
        assert_eq!(snapshot.device_id().as_str(), "dash-01");
    }
}
