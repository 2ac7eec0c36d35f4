// Simulated drivetrain hardware
//
// Stands in for motors and the IMU when no robot is attached, and backs the
// unit tests. Wheels integrate their power into encoder ticks; the IMU
// integrates the chassis yaw rate implied by the wheel speeds.

use crate::drive::hal::{Actuator, Clock, DriveError, HeadingSensor, Result, RunMode, Wheel};
use crate::drive::kinematics::WheelSet;

/// Encoder speed of a simulated wheel at full power
pub const SIM_TICKS_PER_SECOND: f64 = 2800.0;

/// Chassis yaw rate at full rotation power, deg/s
pub const SIM_MAX_YAW_RATE: f64 = 120.0;

/// One simulated motor + encoder
#[derive(Debug, Clone)]
pub struct SimWheel {
    pub wheel: Wheel,
    pub position: i32,
    pub target: i32,
    pub power: f64,
    pub mode: RunMode,
    /// Signed speed from the last step as a fraction of full power
    pub speed: f64,
    /// When set, every call fails with this reason
    pub fault: Option<String>,
    carry: f64,
}

impl SimWheel {
    pub fn new(wheel: Wheel) -> Self {
        Self {
            wheel,
            position: 0,
            target: 0,
            power: 0.0,
            mode: RunMode::PowerControl,
            speed: 0.0,
            fault: None,
            carry: 0.0,
        }
    }

    fn check(&self) -> Result<()> {
        match &self.fault {
            Some(reason) => Err(DriveError::Actuator {
                wheel: self.wheel,
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Advance the wheel by `dt` seconds
    pub fn step(&mut self, dt: f64) {
        let speed = match self.mode {
            RunMode::PowerControl => self.power,
            RunMode::PositionControl => {
                let remaining = self.target - self.position;
                if remaining == 0 {
                    0.0
                } else {
                    self.power.abs() * f64::from(remaining.signum())
                }
            }
        };

        let mut ticks = speed * SIM_TICKS_PER_SECOND * dt + self.carry;
        if self.mode == RunMode::PositionControl {
            // Don't overshoot the target
            let remaining = f64::from(self.target - self.position);
            if ticks.abs() > remaining.abs() {
                ticks = remaining;
            }
        }

        let whole = ticks.trunc();
        self.carry = ticks - whole;
        self.position += whole as i32;
        self.speed = speed;
    }
}

impl Actuator for SimWheel {
    fn set_power(&mut self, power: f64) -> Result<()> {
        self.check()?;
        self.power = power;
        Ok(())
    }

    fn set_target_position(&mut self, ticks: i32) -> Result<()> {
        self.check()?;
        self.target = ticks;
        Ok(())
    }

    fn set_run_mode(&mut self, mode: RunMode) -> Result<()> {
        self.check()?;
        self.mode = mode;
        Ok(())
    }

    fn current_position(&mut self) -> Result<i32> {
        self.check()?;
        Ok(self.position)
    }

    fn is_busy(&mut self) -> Result<bool> {
        self.check()?;
        Ok(self.mode == RunMode::PositionControl && self.position != self.target)
    }

    fn reset_position_counter(&mut self) -> Result<()> {
        self.check()?;
        self.position = 0;
        self.target = 0;
        self.power = 0.0;
        self.mode = RunMode::PowerControl;
        self.carry = 0.0;
        Ok(())
    }
}

/// Four simulated wheels, each tagged with its position
pub fn sim_wheels() -> WheelSet<SimWheel> {
    WheelSet::new(
        SimWheel::new(Wheel::FrontLeft),
        SimWheel::new(Wheel::FrontRight),
        SimWheel::new(Wheel::RearLeft),
        SimWheel::new(Wheel::RearRight),
    )
}

/// Simulated IMU reporting yaw in [-180, 180)
#[derive(Debug, Clone, Default)]
pub struct SimImu {
    pub heading: f64,
    pub fault: Option<String>,
}

impl SimImu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self, yaw_rate_dps: f64, dt: f64) {
        self.heading = wrap_degrees(self.heading + yaw_rate_dps * dt);
    }
}

impl HeadingSensor for SimImu {
    fn heading_degrees(&mut self) -> Result<f64> {
        match &self.fault {
            Some(reason) => Err(DriveError::Sensor {
                reason: reason.clone(),
            }),
            None => Ok(self.heading),
        }
    }
}

/// Wrap an angle to [-180, 180)
pub fn wrap_degrees(degrees: f64) -> f64 {
    (degrees + 180.0).rem_euclid(360.0) - 180.0
}

/// Clock that reports the same interval on every sample
#[derive(Debug, Clone, Copy)]
pub struct FixedStepClock {
    pub step: f64,
}

impl FixedStepClock {
    pub fn new(step: f64) -> Self {
        Self { step }
    }
}

impl Clock for FixedStepClock {
    fn elapsed_since_last_sample(&mut self) -> f64 {
        self.step
    }
}

/// Step all wheels and turn the IMU by the yaw the wheel speeds produce.
///
/// Positive rotation power makes the heading fall, matching the filter's
/// previous-minus-current yaw rate.
pub fn step_drivetrain(wheels: &mut WheelSet<SimWheel>, imu: &mut SimImu, dt: f64) {
    for wheel in Wheel::ALL {
        wheels.get_mut(wheel).step(dt);
    }

    let rotation =
        (wheels.front_left.speed - wheels.front_right.speed + wheels.rear_left.speed
            - wheels.rear_right.speed)
            / 4.0;
    imu.advance(-rotation * SIM_MAX_YAW_RATE, dt);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_mode_stops_on_target() {
        let mut w = SimWheel::new(Wheel::FrontLeft);
        w.set_target_position(100).unwrap();
        w.set_run_mode(RunMode::PositionControl).unwrap();
        w.set_power(1.0).unwrap();
        assert!(w.is_busy().unwrap());

        for _ in 0..10 {
            w.step(0.02);
        }
        assert_eq!(w.position, 100);
        assert!(!w.is_busy().unwrap());
    }

    #[test]
    fn test_position_mode_ignores_power_sign() {
        let mut w = SimWheel::new(Wheel::RearLeft);
        w.set_target_position(-50).unwrap();
        w.set_run_mode(RunMode::PositionControl).unwrap();
        w.set_power(0.5).unwrap();
        for _ in 0..10 {
            w.step(0.02);
        }
        assert_eq!(w.position, -50);
    }

    #[test]
    fn test_reset_stops_the_wheel() {
        let mut w = SimWheel::new(Wheel::FrontRight);
        w.set_target_position(500).unwrap();
        w.set_run_mode(RunMode::PositionControl).unwrap();
        w.set_power(0.5).unwrap();
        w.step(0.02);
        assert!(w.position > 0);

        w.reset_position_counter().unwrap();
        assert_eq!(w.mode, RunMode::PowerControl);
        assert!(!w.is_busy().unwrap());
        w.step(0.02);
        assert_eq!(w.position, 0);
    }

    #[test]
    fn test_fault_is_reported() {
        let mut w = SimWheel::new(Wheel::RearRight);
        w.fault = Some("bus timeout".to_string());
        let err = w.set_power(0.2).unwrap_err();
        assert!(matches!(
            err,
            DriveError::Actuator {
                wheel: Wheel::RearRight,
                ..
            }
        ));
    }

    #[test]
    fn test_positive_rotation_lowers_heading() {
        let mut wheels = sim_wheels();
        let mut imu = SimImu::new();
        wheels.front_left.power = 0.5;
        wheels.rear_left.power = 0.5;
        wheels.front_right.power = -0.5;
        wheels.rear_right.power = -0.5;

        step_drivetrain(&mut wheels, &mut imu, 0.1);
        assert!((imu.heading - -6.0).abs() < 1e-9);
    }

    #[test]
    fn test_wrap_degrees() {
        assert_eq!(wrap_degrees(190.0), -170.0);
        assert_eq!(wrap_degrees(-190.0), 170.0);
        assert_eq!(wrap_degrees(180.0), -180.0);
    }
}
