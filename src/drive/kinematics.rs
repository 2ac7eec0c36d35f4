// Mecanum inverse kinematics for a four-wheel chassis
// Converts a translation vector plus a rotation request into four wheel powers.
//
// Outputs are NOT clamped here; `WheelPowers::clamped` is applied at the
// actuator boundary by the controller.

use std::f64::consts::FRAC_PI_4;

use super::hal::Wheel;

/// One value per wheel
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WheelSet<T> {
    pub front_left: T,
    pub front_right: T,
    pub rear_left: T,
    pub rear_right: T,
}

impl<T: Copy> WheelSet<T> {
    pub fn splat(value: T) -> Self {
        Self::new(value, value, value, value)
    }

    pub fn get(&self, wheel: Wheel) -> T {
        match wheel {
            Wheel::FrontLeft => self.front_left,
            Wheel::FrontRight => self.front_right,
            Wheel::RearLeft => self.rear_left,
            Wheel::RearRight => self.rear_right,
        }
    }

    pub fn map<U>(&self, mut f: impl FnMut(T) -> U) -> WheelSet<U> {
        WheelSet {
            front_left: f(self.front_left),
            front_right: f(self.front_right),
            rear_left: f(self.rear_left),
            rear_right: f(self.rear_right),
        }
    }

    /// Returns values as array [front_left, front_right, rear_left, rear_right]
    pub fn as_array(&self) -> [T; 4] {
        [
            self.front_left,
            self.front_right,
            self.rear_left,
            self.rear_right,
        ]
    }
}

impl<T> WheelSet<T> {
    pub fn new(front_left: T, front_right: T, rear_left: T, rear_right: T) -> Self {
        Self {
            front_left,
            front_right,
            rear_left,
            rear_right,
        }
    }

    pub fn get_mut(&mut self, wheel: Wheel) -> &mut T {
        match wheel {
            Wheel::FrontLeft => &mut self.front_left,
            Wheel::FrontRight => &mut self.front_right,
            Wheel::RearLeft => &mut self.rear_left,
            Wheel::RearRight => &mut self.rear_right,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        [
            &self.front_left,
            &self.front_right,
            &self.rear_left,
            &self.rear_right,
        ]
        .into_iter()
    }

    /// Visit every wheel in `Wheel::ALL` order, stopping at the first error
    pub fn try_for_each_mut<E>(
        &mut self,
        mut f: impl FnMut(Wheel, &mut T) -> Result<(), E>,
    ) -> Result<(), E> {
        for wheel in Wheel::ALL {
            f(wheel, self.get_mut(wheel))?;
        }
        Ok(())
    }
}

/// Wheel power commands, nominally in [-1, 1]
pub type WheelPowers = WheelSet<f64>;

impl WheelPowers {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Clamp every power into [-1, 1], replacing NaN/infinite values with 0
    pub fn clamped(&self) -> Self {
        self.map(|p| if p.is_finite() { p.clamp(-1.0, 1.0) } else { 0.0 })
    }
}

/// Normalized translation intent
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MotionVector {
    /// Direction of travel in radians, 0 is forward
    pub direction: f64,
    /// Translation speed in [-1, 1]
    pub magnitude: f64,
}

impl MotionVector {
    /// Creates a vector, clamping magnitude to [-1, 1]. A non-finite
    /// direction or a NaN magnitude becomes zero.
    pub fn new(direction: f64, magnitude: f64) -> Self {
        Self {
            direction: finite_or_zero(direction),
            magnitude: clamp_unit(magnitude),
        }
    }

    pub fn stationary() -> Self {
        Self::default()
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

/// Clamp a power-like request into [-1, 1]; NaN becomes 0, infinities saturate
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(-1.0, 1.0) }
}

/// Vector form of the mecanum mix
///
/// The direction is offset by π/4 so that direction 0 drives all four wheels
/// at equal power.
pub fn map_vector(direction: f64, magnitude: f64, rotation: f64) -> WheelPowers {
    let d = direction + FRAC_PI_4;
    let (sin_d, cos_d) = d.sin_cos();

    WheelPowers {
        front_left: magnitude * cos_d + rotation,
        front_right: magnitude * sin_d - rotation,
        rear_left: magnitude * sin_d + rotation,
        rear_right: magnitude * cos_d - rotation,
    }
}

/// Joystick form of the mecanum mix
///
/// # Arguments
/// * `x` - Stick x axis
/// * `y` - Stick y axis (negative = pushed forward)
/// * `turn` - Rotation request, clamped to [-1, 1]
pub fn map_joystick(x: f64, y: f64, turn: f64) -> WheelPowers {
    let x = finite_or_zero(x);
    let y = finite_or_zero(y);
    let turn = clamp_unit(turn);

    let magnitude = x.hypot(y);
    // atan2(-0, -0) is -π; a centered stick has no direction
    let theta = if magnitude == 0.0 { 0.0 } else { (-y).atan2(-x) };

    let plus = (theta + FRAC_PI_4).sin() * magnitude;
    let minus = (theta - FRAC_PI_4).sin() * magnitude;

    WheelPowers {
        front_left: minus + turn,
        front_right: plus - turn,
        rear_left: plus + turn,
        rear_right: minus - turn,
    }
}
