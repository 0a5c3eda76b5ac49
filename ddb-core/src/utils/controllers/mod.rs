//! Controller modules for the Diff-Drive Bot.
//!
//! This file exports the hardware trait seams and the device-facing
//! controllers of the navigation core:
//!
//! - `driver`: motor, range sensor, indicator, and encoder event contracts
//! - `tachometer`: interrupt-fed wheel step and time counters
//! - `distance`: power-law calibration of the three range sensors
//! - `leds`: indicator adapter for addressable LED strips
//! - `motion`: the precision movement controller (spin and forward loops)

pub mod distance;
pub mod driver;
pub mod leds;
pub mod motion;
pub mod tachometer;

use serde::{Deserialize, Serialize};

pub use distance::DistanceSensors;
pub use driver::{EncoderEventSink, Indicators, MotorDriver, RangeSensors};
pub use leds::LedIndicators;
pub use motion::{MotionConfig, MotionController};
pub use tachometer::{TachReader, Tachometer, Wheel, WheelCounters};

/// Outcome of a feedback-controlled maneuver.
///
/// There is deliberately no richer error payload: an out-of-range input and
/// a mid-maneuver sensor trigger both surface as [`Interrupted`], and the
/// caller replans rather than retrying.
///
/// [`Interrupted`]: MotionResult::Interrupted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionResult {
    /// The maneuver ran to its step target.
    ReachedTarget,
    /// The maneuver stopped early: a sensor threshold tripped, or the
    /// inputs were rejected before any motion.
    Interrupted,
}

/// A turn direction, chosen once per avoidance episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// The side the chassis swings away from during a spin, whose sensor
    /// must clear before an avoidance spin may stop.
    pub fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}
