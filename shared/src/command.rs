//! Robot Commands
//!
//! Typed commands accepted by the robot's command surface. Commands are
//! fire-and-forget: the robot never acknowledges them, so completion is
//! inferred from telemetry by the client.

use thiserror::Error;

use crate::limits;

/// Errors raised when a command's arguments cannot be sent to the robot
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error("{command}: {field} must be a finite number")]
    NonFinite {
        command: &'static str,
        field: &'static str,
    },

    #[error("Eye ring needs {expected} LED states, got {actual}")]
    EyeRingLength { expected: usize, actual: usize },

    #[error("Volume must be within 0.0..=1.0, got {0}")]
    VolumeOutOfRange(f64),

    #[error("Pose time must be positive, got {0}s")]
    NonPositivePoseTime(f64),

    #[error("Sound name must not be empty")]
    EmptySoundName,
}

/// Protocol command families with their numeric codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    EyeRing,
    LightRgbAll,
    LightRgbEye,
    LightRgbLeftEar,
    LightRgbRightEar,
    LightRgbChest,
    RgbButtonMain,
    Speaker,
    HeadPositionPan,
    HeadPositionTilt,
    BodyLinearAngular,
    BodyPose,
    BodyWheels,
}

impl CommandKind {
    /// Protocol codes touched by this command. `LightRgbAll` fans out to
    /// every RGB light.
    pub fn codes(self) -> &'static [u16] {
        match self {
            CommandKind::EyeRing => &[100],
            CommandKind::LightRgbAll => &[101, 102, 103, 104, 107],
            CommandKind::LightRgbEye => &[101],
            CommandKind::LightRgbLeftEar => &[102],
            CommandKind::LightRgbRightEar => &[103],
            CommandKind::LightRgbChest => &[104],
            CommandKind::RgbButtonMain => &[107],
            CommandKind::Speaker => &[300],
            CommandKind::HeadPositionTilt => &[202],
            CommandKind::HeadPositionPan => &[203],
            CommandKind::BodyLinearAngular => &[204],
            CommandKind::BodyPose => &[205],
            CommandKind::BodyWheels => &[211],
        }
    }
}

/// An RGB colour, one byte per channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const OFF: Rgb = Rgb { r: 0, g: 0, b: 0 };

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// A command for the robot
#[derive(Debug, Clone, PartialEq)]
pub enum RobotCommand {
    /// Eye ring LEDs (one flag per LED) at a common brightness
    EyeRing { leds: Vec<bool>, brightness: u8 },
    RgbAll(Rgb),
    RgbEye(Rgb),
    RgbLeftEar(Rgb),
    RgbRightEar(Rgb),
    RgbChest(Rgb),
    RgbButtonMain(Rgb),
    /// Play a named sound clip at `volume` in 0.0..=1.0
    Sound { name: String, volume: f64 },
    HeadPan { degrees: f64 },
    HeadTilt { degrees: f64 },
    /// Drive with a linear (cm/s) and angular (deg/s) velocity
    LinearAngular { cm_per_s: f64, deg_per_s: f64 },
    /// Move to a pose relative to the current one, over `time_s` seconds
    Pose {
        x_cm: f64,
        y_cm: f64,
        degrees: f64,
        time_s: f64,
    },
    WheelSpeeds { left_cm_s: f64, right_cm_s: f64 },
}

impl RobotCommand {
    /// Head pan, clamped to the mechanical range
    pub fn head_pan(degrees: f64) -> Self {
        RobotCommand::HeadPan {
            degrees: clamp_head_pan(degrees),
        }
    }

    /// Head tilt, clamped to the mechanical range
    pub fn head_tilt(degrees: f64) -> Self {
        RobotCommand::HeadTilt {
            degrees: clamp_head_tilt(degrees),
        }
    }

    pub fn sound(name: impl Into<String>, volume: f64) -> Self {
        RobotCommand::Sound {
            name: name.into(),
            volume,
        }
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            RobotCommand::EyeRing { .. } => CommandKind::EyeRing,
            RobotCommand::RgbAll(_) => CommandKind::LightRgbAll,
            RobotCommand::RgbEye(_) => CommandKind::LightRgbEye,
            RobotCommand::RgbLeftEar(_) => CommandKind::LightRgbLeftEar,
            RobotCommand::RgbRightEar(_) => CommandKind::LightRgbRightEar,
            RobotCommand::RgbChest(_) => CommandKind::LightRgbChest,
            RobotCommand::RgbButtonMain(_) => CommandKind::RgbButtonMain,
            RobotCommand::Sound { .. } => CommandKind::Speaker,
            RobotCommand::HeadPan { .. } => CommandKind::HeadPositionPan,
            RobotCommand::HeadTilt { .. } => CommandKind::HeadPositionTilt,
            RobotCommand::LinearAngular { .. } => CommandKind::BodyLinearAngular,
            RobotCommand::Pose { .. } => CommandKind::BodyPose,
            RobotCommand::WheelSpeeds { .. } => CommandKind::BodyWheels,
        }
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            RobotCommand::EyeRing { .. } => "eye_ring",
            RobotCommand::RgbAll(_) => "rgb_all",
            RobotCommand::RgbEye(_) => "rgb_eye",
            RobotCommand::RgbLeftEar(_) => "rgb_left_ear",
            RobotCommand::RgbRightEar(_) => "rgb_right_ear",
            RobotCommand::RgbChest(_) => "rgb_chest",
            RobotCommand::RgbButtonMain(_) => "rgb_button_main",
            RobotCommand::Sound { .. } => "sound",
            RobotCommand::HeadPan { .. } => "head_pan",
            RobotCommand::HeadTilt { .. } => "head_tilt",
            RobotCommand::LinearAngular { .. } => "linear_angular",
            RobotCommand::Pose { .. } => "pose",
            RobotCommand::WheelSpeeds { .. } => "wheel_speeds",
        }
    }

    /// Check the arguments before the command reaches the transport
    pub fn validate(&self) -> Result<(), CommandError> {
        let name = self.name();
        match self {
            RobotCommand::EyeRing { leds, .. } => {
                if leds.len() != limits::EYE_RING_LEDS {
                    return Err(CommandError::EyeRingLength {
                        expected: limits::EYE_RING_LEDS,
                        actual: leds.len(),
                    });
                }
            }
            RobotCommand::Sound { name, volume } => {
                if name.is_empty() {
                    return Err(CommandError::EmptySoundName);
                }
                finite("sound", "volume", *volume)?;
                if !(0.0..=1.0).contains(volume) {
                    return Err(CommandError::VolumeOutOfRange(*volume));
                }
            }
            RobotCommand::HeadPan { degrees } | RobotCommand::HeadTilt { degrees } => {
                finite(name, "degrees", *degrees)?;
            }
            RobotCommand::LinearAngular {
                cm_per_s,
                deg_per_s,
            } => {
                finite(name, "cm_per_s", *cm_per_s)?;
                finite(name, "deg_per_s", *deg_per_s)?;
            }
            RobotCommand::Pose {
                x_cm,
                y_cm,
                degrees,
                time_s,
            } => {
                finite(name, "x_cm", *x_cm)?;
                finite(name, "y_cm", *y_cm)?;
                finite(name, "degrees", *degrees)?;
                finite(name, "time_s", *time_s)?;
                if *time_s <= 0.0 {
                    return Err(CommandError::NonPositivePoseTime(*time_s));
                }
            }
            RobotCommand::WheelSpeeds {
                left_cm_s,
                right_cm_s,
            } => {
                finite(name, "left_cm_s", *left_cm_s)?;
                finite(name, "right_cm_s", *right_cm_s)?;
            }
            RobotCommand::RgbAll(_)
            | RobotCommand::RgbEye(_)
            | RobotCommand::RgbLeftEar(_)
            | RobotCommand::RgbRightEar(_)
            | RobotCommand::RgbChest(_)
            | RobotCommand::RgbButtonMain(_) => {}
        }
        Ok(())
    }
}

fn finite(command: &'static str, field: &'static str, value: f64) -> Result<(), CommandError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(CommandError::NonFinite { command, field })
    }
}

/// Clamp a head pan angle to the mechanical range
pub fn clamp_head_pan(degrees: f64) -> f64 {
    degrees.clamp(-limits::HEAD_PAN_MAX_DEG, limits::HEAD_PAN_MAX_DEG)
}

/// Clamp a head tilt angle to the mechanical range
pub fn clamp_head_tilt(degrees: f64) -> f64 {
    degrees.clamp(limits::HEAD_TILT_MIN_DEG, limits::HEAD_TILT_MAX_DEG)
}
