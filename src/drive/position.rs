// Encoder-based position moves
//
// A move request is turned into per-wheel tick targets, the wheels are put in
// run-to-position mode, and the controller tracks whether the move is done.
// There is no timeout here: aborting a move that never finishes is up to the
// caller, via `MecanumDrive::stop` or an encoder reset.

use std::f64::consts::PI;

use tracing::{debug, info};

use super::hal::{Actuator, Result, RunMode};
use super::kinematics::{WheelPowers, WheelSet};
use super::units::UnitConverter;

/// Per-wheel encoder tick targets
pub type EncoderTargets = WheelSet<i32>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MotionState {
    #[default]
    Idle,
    RunningToPosition,
}

/// Geometry needed to turn distances into targets
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionParams {
    pub units: UnitConverter,
    /// Distance from chassis center to the wheels' turning circle, inches
    pub turn_radius: f64,
    /// Encoder ticks per inch of arc when turning in place. Separate from the
    /// straight-line conversion.
    pub turn_ticks_per_arc_inch: f64,
}

/// A single encoder move
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MoveRequest {
    /// Forward (positive) or backward; direction is carried by the power sign
    Straight { inches: f64, power: f64 },
    /// Right (positive) or left; direction is carried by the target signs only
    Strafe { inches: f64, power: f64 },
    /// Legacy relative turn, positive degrees turn right
    Turn { degrees: f64, power: f64 },
}

impl MoveRequest {
    /// Straight and strafe targets are absolute, so encoders are zeroed first.
    /// Turns are relative to wherever the wheels are now.
    pub fn resets_encoders(&self) -> bool {
        !matches!(self, MoveRequest::Turn { .. })
    }

    /// Compute tick targets given the wheels' current positions
    pub fn targets(&self, params: &PositionParams, current: EncoderTargets) -> EncoderTargets {
        match *self {
            MoveRequest::Straight { inches, .. } => {
                EncoderTargets::splat(params.units.ticks_rounded(inches))
            }
            MoveRequest::Strafe { inches, .. } => {
                let t = params.units.ticks(inches);
                EncoderTargets::new(t, -t, -t, t)
            }
            MoveRequest::Turn { degrees, .. } => {
                let arc_inches = degrees / 180.0 * PI * params.turn_radius;
                let delta = arc_inches * params.turn_ticks_per_arc_inch;
                let left = |pos: i32| (pos as f64 - delta) as i32;
                let right = |pos: i32| (pos as f64 + delta) as i32;

                EncoderTargets {
                    front_left: left(current.front_left),
                    front_right: right(current.front_right),
                    rear_left: left(current.rear_left),
                    rear_right: right(current.rear_right),
                }
            }
        }
    }

    /// Powers applied once the wheels are armed
    pub fn powers(&self) -> WheelPowers {
        match *self {
            MoveRequest::Straight { inches, power } => {
                let power = power.abs();
                WheelPowers::splat(if inches < 0.0 { -power } else { power })
            }
            MoveRequest::Strafe { power, .. } => WheelPowers::splat(power.abs()),
            MoveRequest::Turn { degrees, power } => {
                let power = power.abs();
                let left = if degrees > 0.0 { power } else { -power };
                WheelPowers::new(left, -left, left, -left)
            }
        }
    }
}

/// Tracks the encoder move in progress
#[derive(Debug, Clone)]
pub struct PositionController {
    params: PositionParams,
    state: MotionState,
    targets: Option<EncoderTargets>,
}

impl PositionController {
    pub fn new(params: PositionParams) -> Self {
        Self {
            params,
            state: MotionState::Idle,
            targets: None,
        }
    }

    pub fn params(&self) -> &PositionParams {
        &self.params
    }

    pub fn state(&self) -> MotionState {
        self.state
    }

    /// Targets of the most recent move
    pub fn targets(&self) -> Option<EncoderTargets> {
        self.targets
    }

    /// Zero all four position counters
    ///
    /// Also cancels any move in progress: the wheels are left in power-control
    /// mode at zero power.
    pub fn reset_encoders<A: Actuator>(&mut self, wheels: &mut WheelSet<A>) -> Result<()> {
        debug!("Resetting encoders");
        self.halt();
        wheels.try_for_each_mut(|_, a| {
            a.reset_position_counter()?;
            a.set_run_mode(RunMode::PowerControl)?;
            a.set_power(0.0)
        })
    }

    /// Arm a move: optionally reset, set targets, switch to run-to-position and
    /// apply power
    pub fn arm<A: Actuator>(
        &mut self,
        wheels: &mut WheelSet<A>,
        request: MoveRequest,
    ) -> Result<EncoderTargets> {
        if request.resets_encoders() {
            self.reset_encoders(wheels)?;
        }

        let current = read_positions(wheels)?;
        let targets = request.targets(&self.params, current);
        let powers = request.powers().clamped();

        info!("Arming {:?}: targets {:?}", request, targets.as_array());

        wheels.try_for_each_mut(|wheel, a| a.set_target_position(targets.get(wheel)))?;
        wheels.try_for_each_mut(|_, a| a.set_run_mode(RunMode::PositionControl))?;
        wheels.try_for_each_mut(|wheel, a| a.set_power(powers.get(wheel)))?;

        self.targets = Some(targets);
        self.state = MotionState::RunningToPosition;
        Ok(targets)
    }

    /// True while a move is still in progress
    ///
    /// Only front-left, rear-left and front-right are polled; rear-right is not.
    /// The move counts as finished once at most one of the three is busy.
    pub fn is_moving<A: Actuator>(&mut self, wheels: &mut WheelSet<A>) -> Result<bool> {
        if self.state == MotionState::Idle {
            return Ok(false);
        }

        let busy = [
            wheels.front_left.is_busy()?,
            wheels.rear_left.is_busy()?,
            wheels.front_right.is_busy()?,
        ]
        .into_iter()
        .filter(|&b| b)
        .count();

        if busy <= 1 {
            debug!("Position move complete ({} polled wheel(s) still busy)", busy);
            if let Some(targets) = self.targets {
                info!("Reached encoder targets {:?}", targets.as_array());
            }
            self.state = MotionState::Idle;
            return Ok(false);
        }
        Ok(true)
    }

    /// Forget the current move without touching the wheels
    pub fn halt(&mut self) {
        self.state = MotionState::Idle;
    }
}

/// Current encoder positions for all four wheels
pub fn read_positions<A: Actuator>(wheels: &mut WheelSet<A>) -> Result<EncoderTargets> {
    Ok(EncoderTargets {
        front_left: wheels.front_left.current_position()?,
        front_right: wheels.front_right.current_position()?,
        rear_left: wheels.rear_left.current_position()?,
        rear_right: wheels.rear_right.current_position()?,
    })
}
