//! Unit conversions for the Diff-Drive Bot chassis.
//!
//! The wheel encoders deliver 360 pulses per wheel revolution, the wheels
//! are 70 mm in diameter, and the track (wheel-to-wheel) width is 140 mm.
//! Everything the control loops reason about (spin angles, straight-line
//! distances, wheel speeds) reduces to encoder steps through the
//! conversions below.
//!
//! All integer conversions truncate toward zero, matching the coarse
//! step-count comparisons in the control loops; round-tripping a value
//! through steps may lose up to one unit.

use core::f32::consts::PI;

/// Wheel-to-wheel track width of the chassis (mm).
pub const TRACK_WIDTH_MM: i32 = 140;

/// Wheel diameter (mm).
pub const WHEEL_DIAMETER_MM: i32 = 70;

/// Encoder pulses per wheel revolution.
pub const PULSES_PER_REV: i32 = 360;

/// Capture-timer frequency behind the tachometer time accumulators (Hz).
pub const CAPTURE_CLOCK_HZ: u32 = 12_000_000;

// Speed scale calibrated to the 12 MHz capture clock: steps over
// accumulated ticks comes out in 0.1 RPM units.
const RPM_SCALE: i64 = 20_000_000;

/// Convert an in-place spin angle (degrees) to the encoder steps each wheel
/// must travel about the center of the chassis.
pub fn angle_to_steps(degrees: i32) -> i32 {
    degrees * TRACK_WIDTH_MM / WHEEL_DIAMETER_MM
}

/// Inverse of [`angle_to_steps`].
pub fn steps_to_angle(steps: i32) -> i32 {
    steps * WHEEL_DIAMETER_MM / TRACK_WIDTH_MM
}

/// Convert a straight-line distance (mm) to encoder steps.
pub fn distance_to_steps(mm: i32) -> i32 {
    (mm as f32 * PULSES_PER_REV as f32 / (PI * WHEEL_DIAMETER_MM as f32)) as i32
}

/// Convert encoder steps back to a straight-line distance (mm).
pub fn steps_to_distance(steps: i32) -> i32 {
    (steps as f32 * PI * WHEEL_DIAMETER_MM as f32 / PULSES_PER_REV as f32) as i32
}

/// Starting duty-cycle estimate for a target wheel speed (0.1 RPM units).
///
/// The forward PI controller seeds its output with this guess and lets the
/// feedback terms absorb the difference.
pub fn rpm_to_duty_estimate(rpm_tenths: u16) -> i32 {
    6 * rpm_tenths as i32
}

/// Measured wheel speed (0.1 RPM units) from two step/time-accumulator
/// snapshots.
///
/// The `+ 1` in the divisor keeps a stalled accumulator from dividing by
/// zero; callers additionally gate updates on the accumulator having moved.
pub fn compute_rpm(steps: i32, prev_steps: i32, ticks: u32, prev_ticks: u32) -> i32 {
    let dsteps = (steps - prev_steps) as i64;
    let dticks = ticks.wrapping_sub(prev_ticks) as i64;
    (RPM_SCALE * dsteps / (dticks + 1)) as i32
}

/// Cosine of an angle given in degrees.
pub fn cosd(degrees: i32) -> f32 {
    libm::cosf(degrees as f32 * PI / 180.0)
}

/// Sine of an angle given in degrees.
pub fn sind(degrees: i32) -> f32 {
    libm::sinf(degrees as f32 * PI / 180.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarter_turn_in_steps() {
        // 90 degrees about the center is half a wheel revolution per side.
        assert_eq!(angle_to_steps(90), 180);
        assert_eq!(steps_to_angle(180), 90);
    }

    #[test]
    fn distance_conversion_truncates() {
        assert_eq!(distance_to_steps(1000), 1637);
        // Truncation loses a millimeter on the way back.
        assert_eq!(steps_to_distance(1637), 999);
        assert_eq!(steps_to_distance(distance_to_steps(220)), 219);
    }

    #[test]
    fn negative_values_truncate_toward_zero() {
        assert_eq!(distance_to_steps(-1000), -1637);
        assert_eq!(steps_to_angle(-180), -90);
    }

    #[test]
    fn duty_estimate_is_linear() {
        assert_eq!(rpm_to_duty_estimate(650), 3900);
        assert_eq!(rpm_to_duty_estimate(0), 0);
    }

    #[test]
    fn rpm_from_accumulator_deltas() {
        // 36 steps over 60 ms of 12 MHz ticks is 100.0 RPM.
        assert_eq!(compute_rpm(36, 0, 719_999, 0), 1000);
        // Stalled accumulator: the +1 divisor keeps this finite.
        assert_eq!(compute_rpm(5, 0, 0, 0), 100_000_000);
    }

    #[test]
    fn rpm_survives_accumulator_wrap() {
        let prev = u32::MAX - 100;
        let now = 719_899u32.wrapping_add(prev).wrapping_add(100);
        assert_eq!(compute_rpm(36, 0, now, prev), 1000);
    }

    #[test]
    fn degree_trig() {
        assert!(cosd(90).abs() < 1e-6);
        assert!((sind(90) - 1.0).abs() < 1e-6);
        assert!((cosd(0) - 1.0).abs() < 1e-6);
        assert!((sind(180)).abs() < 1e-5);
    }
}
