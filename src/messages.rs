// Define message types for the runtime

use serde::{Deserialize, Serialize};

use crate::drive::kinematics::WheelPowers;
use crate::drive::position::MoveRequest;

// Command from teleop/autonomous scripts -> runtime
// Tagged by "type", e.g. {"type":"straight","inches":12.0,"power":0.5}
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DriveCommand {
    /// Gyro-corrected translation + rotation; direction in radians, 0 = forward
    Drive {
        direction: f64,
        magnitude: f64,
        rotation: f64,
    },
    /// Raw gamepad axes
    Joystick { x: f64, y: f64, turn: f64 },
    /// Hold an absolute heading in degrees
    TurnToHeading { target: f64, power: f64 },
    Straight { inches: f64, power: f64 },
    Strafe { inches: f64, power: f64 },
    Turn { degrees: f64, power: f64 },
    Stop,
}

impl DriveCommand {
    /// Continuous commands are re-applied every tick and expire with the watchdog
    pub fn is_continuous(&self) -> bool {
        matches!(
            self,
            DriveCommand::Drive { .. }
                | DriveCommand::Joystick { .. }
                | DriveCommand::TurnToHeading { .. }
        )
    }

    /// The encoder move this command arms, if any
    pub fn move_request(&self) -> Option<MoveRequest> {
        match *self {
            DriveCommand::Straight { inches, power } => Some(MoveRequest::Straight { inches, power }),
            DriveCommand::Strafe { inches, power } => Some(MoveRequest::Strafe { inches, power }),
            DriveCommand::Turn { degrees, power } => Some(MoveRequest::Turn { degrees, power }),
            _ => None,
        }
    }
}

// Actuation output from runtime -> wheel drivers / telemetry
// Has default values because we don't always have an actuation to send
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct WheelActuation {
    pub front_left: f64,
    pub front_right: f64,
    pub rear_left: f64,
    pub rear_right: f64,
}

impl From<&WheelPowers> for WheelActuation {
    fn from(powers: &WheelPowers) -> Self {
        Self {
            front_left: powers.front_left,
            front_right: powers.front_right,
            rear_left: powers.rear_left,
            rear_right: powers.rear_right,
        }
    }
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    /// An encoder move is in progress
    Moving,
    CmdStale,
    /// An encoder move was aborted for taking too long
    MoveTimeout,
    /// A wheel or the IMU failed; the drivetrain was stopped
    Fault,
}
