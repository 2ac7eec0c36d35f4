// Hardware boundary for the drivetrain
//
// The controller only talks to motors, the IMU and a clock through these
// traits. Real drivers and the simulator in `crate::sim` both implement them.

use std::fmt;
use std::time::Instant;

/// Wheel positions on a mecanum chassis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wheel {
    FrontLeft,
    FrontRight,
    RearLeft,
    RearRight,
}

impl Wheel {
    pub const ALL: [Wheel; 4] = [
        Wheel::FrontLeft,
        Wheel::FrontRight,
        Wheel::RearLeft,
        Wheel::RearRight,
    ];
}

impl fmt::Display for Wheel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Wheel::FrontLeft => "front-left",
            Wheel::FrontRight => "front-right",
            Wheel::RearLeft => "rear-left",
            Wheel::RearRight => "rear-right",
        };
        f.write_str(name)
    }
}

/// Motor run modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Open loop: the set power is applied directly
    PowerControl,
    /// Run-to-position: the motor drives toward its target tick count
    PositionControl,
}

/// Error types for actuator and sensor access
///
/// Either variant means the drivetrain can't safely continue this tick.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DriveError {
    #[error("Actuator {wheel} unavailable: {reason}")]
    Actuator { wheel: Wheel, reason: String },

    #[error("Heading sensor unavailable: {reason}")]
    Sensor { reason: String },
}

pub type Result<T> = std::result::Result<T, DriveError>;

/// One wheel motor with an attached encoder
pub trait Actuator {
    fn set_power(&mut self, power: f64) -> Result<()>;

    fn set_target_position(&mut self, ticks: i32) -> Result<()>;

    fn set_run_mode(&mut self, mode: RunMode) -> Result<()>;

    fn current_position(&mut self) -> Result<i32>;

    /// True while a run-to-position move has not reached its target
    fn is_busy(&mut self) -> Result<bool>;

    /// Zero the encoder count. Stops the motor and leaves position control,
    /// like a stop-and-reset on real motor controllers.
    fn reset_position_counter(&mut self) -> Result<()>;
}

/// Yaw source
///
/// Headings are degrees wrapped to [-180, 180).
pub trait HeadingSensor {
    fn heading_degrees(&mut self) -> Result<f64>;
}

/// Time source for the feedback filter
pub trait Clock {
    /// Seconds since the previous call, restarting the measurement
    fn elapsed_since_last_sample(&mut self) -> f64;
}

/// Wall clock backed by `Instant`
#[derive(Debug)]
pub struct MonotonicClock {
    last: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            last: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn elapsed_since_last_sample(&mut self) -> f64 {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last).as_secs_f64();
        self.last = now;
        elapsed
    }
}
