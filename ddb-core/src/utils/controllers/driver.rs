//! Hardware trait seams for the navigation core.
//!
//! Each trait is the narrow contract of one external collaborator: the
//! motor driver, the three-channel range ADC, the chassis indicator
//! lights, and the encoder capture peripheral. The core never touches a
//! register; a target board implements these over its peripherals, and the
//! mock rig implements them over a software chassis.
//!
//! The contracts are infallible: these are thin I/O wrappers with no
//! internal state machine, and the control loops have no error channel
//! beyond [`MotionResult`](super::MotionResult).

use super::tachometer::Wheel;

/// Motor driver primitive: per-wheel duty in `0..=14998` plus a drive
/// sense.
///
/// `spin_left` runs the left wheel in reverse and the right wheel forward;
/// `spin_right` is the mirror image. Implementations must treat each call
/// as a complete command; the previous duty state is overwritten.
pub trait MotorDriver {
    fn forward(&mut self, left_duty: u16, right_duty: u16);
    fn backward(&mut self, left_duty: u16, right_duty: u16);
    fn spin_left(&mut self, left_duty: u16, right_duty: u16);
    fn spin_right(&mut self, left_duty: u16, right_duty: u16);
    /// Cut drive on both wheels.
    fn stop(&mut self);
}

/// Polling read of the three forward-facing analog range channels, in
/// `(left, center, right)` order as wired at the ADC.
pub trait RangeSensors {
    fn read_raw(&mut self) -> (u16, u16, u16);
}

/// Front/back indicator lights. Side effect only, never blocking.
pub trait Indicators {
    fn front(&mut self, on: bool);
    fn back(&mut self, on: bool);
}

/// Callback contract the tachometer registers with the capture-timer
/// peripheral.
///
/// Invoked once per qualifying rising edge of a wheel's "A" encoder
/// channel, at interrupt priority, with the 16-bit capture-timer value at
/// the edge. Implementations must complete in bounded, short time: no
/// floating point, no I/O beyond the shared counters.
pub trait EncoderEventSink {
    fn encoder_edge(&mut self, wheel: Wheel, timestamp: u16);
}
