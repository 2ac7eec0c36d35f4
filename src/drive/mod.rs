// Mecanum drivetrain control
//
// Provides:
// - Unit conversion between inches and encoder ticks
// - Mecanum inverse kinematics (motion vector / joystick -> wheel powers)
// - Gyro feedback filter and heading hold
// - Encoder position moves (straight, strafe, turn)
// - `MecanumDrive`, which composes the above over abstract hardware

pub mod controller;
pub mod gyro;
pub mod hal;
pub mod kinematics;
pub mod position;
pub mod units;

pub use controller::MecanumDrive;
pub use gyro::{GyroFilter, GyroFilterParams, GyroState};
pub use hal::{Actuator, Clock, DriveError, HeadingSensor, MonotonicClock, RunMode, Wheel};
pub use kinematics::{MotionVector, WheelPowers, WheelSet, map_joystick, map_vector};
pub use position::{EncoderTargets, MotionState, MoveRequest, PositionController};
pub use units::UnitConverter;
