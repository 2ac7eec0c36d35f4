// Gyro heading feedback
//
// Two independent controllers live here:
// - `GyroFilter`: smooths the measured yaw rate and the requested rotation and
//   folds the difference back into the rotation command, holding heading while
//   translating.
// - `heading_hold_rotation`: proportional turn toward an absolute heading.
//
// Filter history is kept in `GyroState`, owned by the caller and passed in on
// every tick. It has a single writer and no internal synchronization.

/// Filter tuning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GyroFilterParams {
    /// History weight of the smoothing average; 3 means 3 parts history to 1
    /// part new sample (pole at 0.75)
    pub smoothing_weight: f64,
    /// Yaw rate in deg/s that corresponds to a rotation power of 1
    pub velocity_to_rotation_scale: f64,
}

impl Default for GyroFilterParams {
    fn default() -> Self {
        Self {
            smoothing_weight: DEFAULT_SMOOTHING_WEIGHT,
            velocity_to_rotation_scale: DEFAULT_VELOCITY_TO_ROTATION_SCALE,
        }
    }
}

pub const DEFAULT_SMOOTHING_WEIGHT: f64 = 3.0;
pub const DEFAULT_VELOCITY_TO_ROTATION_SCALE: f64 = 120.0;
pub const DEFAULT_HEADING_HOLD_BAND: f64 = 20.0;

/// Filter history carried between ticks
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GyroState {
    /// Heading seen on the previous tick; `None` until the first sample
    pub last_heading: Option<f64>,
    /// Smoothed yaw rate, deg/s (previous minus current heading)
    pub smoothed_velocity: f64,
    /// Smoothed rotation request
    pub smoothed_goal: f64,
}

impl GyroState {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GyroFilter {
    params: GyroFilterParams,
}

impl GyroFilter {
    pub fn new(params: GyroFilterParams) -> Self {
        Self { params }
    }

    /// Run one filter tick and return the corrected rotation command.
    ///
    /// The first sample, a non-positive or non-finite `elapsed_seconds`, and a
    /// non-finite heading all count as zero yaw rate. A non-finite heading is
    /// not stored.
    pub fn correct(
        &self,
        state: &mut GyroState,
        heading_degrees: f64,
        requested_rotation: f64,
        elapsed_seconds: f64,
    ) -> f64 {
        let requested = if requested_rotation.is_finite() {
            requested_rotation
        } else {
            0.0
        };

        let velocity = match state.last_heading {
            Some(last)
                if heading_degrees.is_finite()
                    && elapsed_seconds.is_finite()
                    && elapsed_seconds > 0.0 =>
            {
                heading_delta(last, heading_degrees) / elapsed_seconds
            }
            _ => 0.0,
        };

        let w = self.params.smoothing_weight;
        state.smoothed_velocity = (state.smoothed_velocity * w + velocity) / (w + 1.0);
        state.smoothed_goal = (state.smoothed_goal * w + requested) / (w + 1.0);

        if heading_degrees.is_finite() {
            state.last_heading = Some(heading_degrees);
        }

        requested
            + (state.smoothed_goal
                - state.smoothed_velocity / self.params.velocity_to_rotation_scale)
    }
}

/// Shortest signed angle from `current` to `previous` (previous - current),
/// wrapped to [-180, 180)
pub fn heading_delta(previous: f64, current: f64) -> f64 {
    (previous - current + 180.0).rem_euclid(360.0) - 180.0
}

/// Proportional heading hold
///
/// Saturates at ±`power` once the heading error exceeds ±`band` degrees.
pub fn heading_hold_rotation(current: f64, target: f64, power: f64, band: f64) -> f64 {
    power * ((current - target) / band).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    #[test]
    fn test_first_sample_has_no_velocity() {
        let filter = GyroFilter::default();
        let mut state = GyroState::new();

        let out = filter.correct(&mut state, 90.0, 0.0, 0.02);
        assert_eq!(out, 0.0);
        assert_eq!(state.last_heading, Some(90.0));
        assert_eq!(state.smoothed_velocity, 0.0);
    }

    #[test]
    fn test_zero_elapsed_is_guarded() {
        let filter = GyroFilter::default();
        let mut state = GyroState::new();
        filter.correct(&mut state, 0.0, 0.0, 0.02);

        let out = filter.correct(&mut state, 10.0, 0.0, 0.0);
        assert!(out.is_finite());
        assert_eq!(state.smoothed_velocity, 0.0);
        assert_eq!(state.last_heading, Some(10.0));
    }

    #[test]
    fn test_nan_heading_is_ignored() {
        let filter = GyroFilter::default();
        let mut state = GyroState::new();
        filter.correct(&mut state, 5.0, 0.0, 0.02);

        let out = filter.correct(&mut state, f64::NAN, 0.2, 0.02);
        assert!(out.is_finite());
        assert_eq!(state.last_heading, Some(5.0));
    }

    #[test]
    fn test_single_tick_math() {
        let filter = GyroFilter::default();
        let mut state = GyroState {
            last_heading: Some(10.0),
            ..GyroState::default()
        };

        // Heading fell 1° in 0.1 s: +10 deg/s in the previous-minus-current sense
        let out = filter.correct(&mut state, 9.0, 0.4, 0.1);

        assert_relative_eq!(state.smoothed_velocity, 2.5);
        assert_relative_eq!(state.smoothed_goal, 0.1);
        assert_relative_eq!(out, 0.4 + (0.1 - 2.5 / 120.0));
    }

    #[test]
    fn test_converges_to_zero_when_still() {
        let filter = GyroFilter::default();
        let mut state = GyroState::new();

        // Build up some history while turning
        let mut heading = 0.0;
        for _ in 0..20 {
            heading -= 2.0;
            filter.correct(&mut state, heading, 0.5, 0.02);
        }
        assert!(state.smoothed_goal > 0.4);

        let mut out = f64::MAX;
        for _ in 0..100 {
            out = filter.correct(&mut state, heading, 0.0, 0.02);
        }
        assert_abs_diff_eq!(out, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_wraparound_does_not_spike() {
        let filter = GyroFilter::default();
        let mut state = GyroState::new();
        filter.correct(&mut state, 179.0, 0.0, 0.02);
        filter.correct(&mut state, -179.0, 0.0, 0.02);

        // 2° in 20 ms, not 358°
        assert_relative_eq!(state.smoothed_velocity, -100.0 / 4.0);
    }

    #[test]
    fn test_heading_delta_wraps() {
        assert_relative_eq!(heading_delta(10.0, 5.0), 5.0);
        assert_relative_eq!(heading_delta(-179.0, 179.0), 2.0);
        assert_relative_eq!(heading_delta(179.0, -179.0), -2.0);
        assert_relative_eq!(heading_delta(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_heading_hold_saturates() {
        assert_eq!(heading_hold_rotation(45.0, 0.0, 0.6, 20.0), 0.6);
        assert_eq!(heading_hold_rotation(-45.0, 0.0, 0.6, 20.0), -0.6);
        assert_eq!(heading_hold_rotation(0.0, 21.0, 0.6, 20.0), -0.6);
        assert_relative_eq!(heading_hold_rotation(10.0, 0.0, 0.6, 20.0), 0.3);
        assert_eq!(heading_hold_rotation(12.0, 12.0, 0.6, 20.0), 0.0);
    }
}
