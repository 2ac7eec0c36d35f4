// Linear distance <-> encoder tick conversion

use std::f64::consts::PI;

/// Converts inches of wheel travel to encoder ticks for one chassis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitConverter {
    ticks_per_inch: f64,
}

impl UnitConverter {
    /// `ticks_per_inch = ticks_per_revolution * gear_ratio / (π * wheel_diameter)`
    pub fn new(ticks_per_revolution: f64, gear_ratio: f64, wheel_diameter: f64) -> Self {
        Self {
            ticks_per_inch: ticks_per_revolution * gear_ratio / (PI * wheel_diameter),
        }
    }

    pub fn ticks_per_inch(&self) -> f64 {
        self.ticks_per_inch
    }

    /// Exact (fractional) tick count for a distance
    pub fn target_position(&self, inches: f64) -> f64 {
        inches * self.ticks_per_inch
    }

    /// Tick count truncated toward zero, so it can fall short by up to one tick
    pub fn ticks(&self, inches: f64) -> i32 {
        self.target_position(inches) as i32
    }

    /// Tick count rounded to nearest, used for absolute position moves
    pub fn ticks_rounded(&self, inches: f64) -> i32 {
        self.target_position(inches).round() as i32
    }

    pub fn inches(&self, ticks: i32) -> f64 {
        ticks as f64 / self.ticks_per_inch
    }
}
