//! Range sensor calibration for the three forward-facing distance sensors.
//!
//! Each analog channel maps to millimeters through its own fitted
//! power-law curve `distance = A * reading^B`; the sensors sit at
//! different angles on the mast, so the coefficients differ per channel.
//! Conversion is pure and stateless; an out-of-range sample produces an
//! out-of-range (but never invalid) distance.

use serde::{Deserialize, Serialize};

use super::driver::RangeSensors;

/// A fitted `A * reading^B` calibration curve.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PowerLawCurve {
    pub coefficient: f64,
    pub exponent: f64,
}

impl PowerLawCurve {
    pub const fn new(coefficient: f64, exponent: f64) -> Self {
        PowerLawCurve {
            coefficient,
            exponent,
        }
    }

    /// Millimeters for a raw analog sample, truncated toward zero.
    ///
    /// A zero sample evaluates to infinity under the negative exponent and
    /// saturates to `u32::MAX`, which reads as very far away.
    pub fn to_mm(&self, raw: u16) -> u32 {
        (self.coefficient * libm::pow(raw as f64, self.exponent)) as u32
    }
}

/// Curve fitted for the left analog channel.
pub const LEFT_CHANNEL_CURVE: PowerLawCurve = PowerLawCurve::new(3.0e6, -1.110);

/// Curve fitted for the center analog channel.
pub const CENTER_CHANNEL_CURVE: PowerLawCurve = PowerLawCurve::new(6.0e6, -1.182);

/// Curve fitted for the right analog channel.
pub const RIGHT_CHANNEL_CURVE: PowerLawCurve = PowerLawCurve::new(3.0e6, -1.116);

/// Converts the raw three-channel samples into per-side distances.
pub struct DistanceSensors<A> {
    adc: A,
    left_channel: PowerLawCurve,
    center_channel: PowerLawCurve,
    right_channel: PowerLawCurve,
}

impl<A> DistanceSensors<A>
where
    A: RangeSensors,
{
    /// Wrap an ADC with the stock calibration curves.
    pub fn new(adc: A) -> Self {
        Self::with_curves(
            adc,
            LEFT_CHANNEL_CURVE,
            CENTER_CHANNEL_CURVE,
            RIGHT_CHANNEL_CURVE,
        )
    }

    pub fn with_curves(
        adc: A,
        left_channel: PowerLawCurve,
        center_channel: PowerLawCurve,
        right_channel: PowerLawCurve,
    ) -> Self {
        DistanceSensors {
            adc,
            left_channel,
            center_channel,
            right_channel,
        }
    }

    /// Sample all three sensors and return `(left, center, right)`
    /// distances in millimeters.
    ///
    /// The left and right analog channels arrive crosswise from the
    /// sensor mast wiring, so each converted reading is reported on the
    /// side it actually faces: the left result comes from the right
    /// channel and vice versa. Which mapping is authoritative has never
    /// been pinned down on hardware; this preserves the behavior the rest
    /// of the stack was tuned against.
    pub fn distances_mm(&mut self) -> (u32, u32, u32) {
        let (left_raw, center_raw, right_raw) = self.adc.read_raw();
        let left = self.right_channel.to_mm(right_raw);
        let center = self.center_channel.to_mm(center_raw);
        let right = self.left_channel.to_mm(left_raw);
        (left, center, right)
    }
}
