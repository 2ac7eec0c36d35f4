// Mecanum drivetrain controller
//
// Owns the four wheel actuators, the heading sensor and the clock, and ties
// together kinematics, gyro feedback and encoder moves. Called once per control
// tick by an outer loop; nothing here blocks or spawns.

use tracing::{debug, info};

use super::gyro::{GyroFilter, GyroState, heading_hold_rotation};
use super::hal::{Actuator, Clock, HeadingSensor, Result, RunMode};
use super::kinematics::{
    MotionVector, WheelPowers, WheelSet, clamp_unit, map_joystick, map_vector,
};
use super::position::{
    EncoderTargets, MotionState, MoveRequest, PositionController, read_positions,
};
use crate::config::DriveConfig;

pub struct MecanumDrive<A, G, C> {
    wheels: WheelSet<A>,
    imu: G,
    clock: C,
    filter: GyroFilter,
    gyro: GyroState,
    position: PositionController,
    heading_hold_band: f64,
}

impl<A, G, C> MecanumDrive<A, G, C>
where
    A: Actuator,
    G: HeadingSensor,
    C: Clock,
{
    /// Build a controller and zero the encoders
    pub fn new(config: &DriveConfig, wheels: WheelSet<A>, imu: G, clock: C) -> Result<Self> {
        let mut drive = Self {
            wheels,
            imu,
            clock,
            filter: GyroFilter::new(config.filter_params()),
            gyro: GyroState::new(),
            position: PositionController::new(config.position_params()),
            heading_hold_band: config.heading_hold_band,
        };
        drive.reset_encoders()?;

        info!(
            "Mecanum drive ready: {:.2} ticks/in, turn radius {}",
            config.units().ticks_per_inch(),
            config.turn_radius
        );
        Ok(drive)
    }

    /// One gyro-corrected drive tick
    ///
    /// # Arguments
    /// * `motion` - Translation direction (0 = forward) and magnitude
    /// * `rotation` - Requested rotation power, clamped to [-1, 1]
    ///
    /// Returns the powers written to the wheels.
    pub fn drive(&mut self, motion: MotionVector, rotation: f64) -> Result<WheelPowers> {
        self.enter_power_control()?;

        let heading = self.imu.heading_degrees()?;
        let elapsed = self.clock.elapsed_since_last_sample();
        let rotation = clamp_unit(rotation);
        let corrected = self
            .filter
            .correct(&mut self.gyro, heading, rotation, elapsed);

        let powers = map_vector(motion.direction, motion.magnitude, corrected);
        self.write_powers(powers)
    }

    /// Drive from raw gamepad axes, without gyro correction
    ///
    /// `turn_axis` is the raw right-stick x value; it is negated before mixing
    /// so pushing the stick right turns the robot right.
    pub fn drive_joystick(&mut self, x: f64, y: f64, turn_axis: f64) -> Result<WheelPowers> {
        self.enter_power_control()?;
        self.write_powers(map_joystick(x, y, -turn_axis))
    }

    /// Proportional turn toward an absolute heading
    ///
    /// Returns the rotation command that was applied.
    pub fn turn_to_heading(&mut self, target_degrees: f64, power: f64) -> Result<f64> {
        let power = power.abs();
        let heading = self.imu.heading_degrees()?;
        let rotation =
            heading_hold_rotation(heading, target_degrees, power, self.heading_hold_band);
        debug!(
            "Heading {:.1}, target {:.1}, turn power {:.3}",
            heading, target_degrees, rotation
        );

        self.enter_power_control()?;
        self.write_powers(map_vector(0.0, 0.0, rotation))?;
        Ok(rotation)
    }

    /// Move forward (positive) or backward on encoders
    pub fn move_straight(&mut self, inches: f64, power: f64) -> Result<EncoderTargets> {
        self.arm(MoveRequest::Straight { inches, power })
    }

    /// Strafe right (positive) or left on encoders
    pub fn move_strafe(&mut self, inches: f64, power: f64) -> Result<EncoderTargets> {
        self.arm(MoveRequest::Strafe { inches, power })
    }

    /// Legacy encoder turn relative to the current wheel positions
    pub fn turn(&mut self, degrees: f64, power: f64) -> Result<EncoderTargets> {
        self.arm(MoveRequest::Turn { degrees, power })
    }

    pub fn arm(&mut self, request: MoveRequest) -> Result<EncoderTargets> {
        self.position.arm(&mut self.wheels, request)
    }

    /// True while an encoder move is still running
    pub fn is_moving(&mut self) -> Result<bool> {
        self.position.is_moving(&mut self.wheels)
    }

    /// Zero the encoders. Cancels any encoder move.
    pub fn reset_encoders(&mut self) -> Result<()> {
        self.position.reset_encoders(&mut self.wheels)
    }

    /// Cut power to all wheels. Also cancels any encoder move.
    pub fn stop(&mut self) -> Result<()> {
        info!("Stopping all wheels");
        self.position.halt();
        self.wheels.try_for_each_mut(|_, a| a.set_power(0.0))
    }

    /// Write four powers directly in power-control mode (clamped)
    pub fn raw_move(&mut self, powers: WheelPowers) -> Result<WheelPowers> {
        self.enter_power_control()?;
        self.write_powers(powers)
    }

    /// Unrounded encoder ticks for a distance in inches
    pub fn target_position(&self, inches: f64) -> f64 {
        self.position.params().units.target_position(inches)
    }

    pub fn heading(&mut self) -> Result<f64> {
        self.imu.heading_degrees()
    }

    pub fn encoder_positions(&mut self) -> Result<EncoderTargets> {
        read_positions(&mut self.wheels)
    }

    pub fn motion_state(&self) -> MotionState {
        self.position.state()
    }

    pub fn gyro_state(&self) -> &GyroState {
        &self.gyro
    }

    pub fn wheels(&self) -> &WheelSet<A> {
        &self.wheels
    }

    pub fn wheels_mut(&mut self) -> &mut WheelSet<A> {
        &mut self.wheels
    }

    pub fn imu_mut(&mut self) -> &mut G {
        &mut self.imu
    }

    /// Mutable access to wheels and IMU together, for stepping a simulation
    pub fn hardware_mut(&mut self) -> (&mut WheelSet<A>, &mut G) {
        (&mut self.wheels, &mut self.imu)
    }

    fn enter_power_control(&mut self) -> Result<()> {
        self.position.halt();
        self.wheels
            .try_for_each_mut(|_, a| a.set_run_mode(RunMode::PowerControl))
    }

    fn write_powers(&mut self, powers: WheelPowers) -> Result<WheelPowers> {
        let powers = powers.clamped();
        debug!(
            "Setting wheel powers: fl={:.3}, fr={:.3}, rl={:.3}, rr={:.3}",
            powers.front_left, powers.front_right, powers.rear_left, powers.rear_right
        );
        self.wheels
            .try_for_each_mut(|wheel, a| a.set_power(powers.get(wheel)))?;
        Ok(powers)
    }
}
