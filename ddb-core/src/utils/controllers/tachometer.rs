//! Interrupt-fed wheel step and time counters.
//!
//! Each wheel's quadrature encoder raises a capture interrupt on every
//! rising edge of its "A" channel; the level of the paired "B" channel at
//! that instant classifies the edge as a forward or reverse step. The
//! handler side of this module adjusts a signed step counter by one and
//! accumulates the time since the previous edge, and the control loops
//! read instantaneous snapshots of both.
//!
//! Ownership is split at the type level to document the concurrency
//! discipline: exactly one [`Tachometer`] (the writer, owned by the
//! interrupt source) and any number of [`TachReader`] snapshots (the
//! readers, owned by the control loops). The counters are relaxed atomics,
//! so no locking is needed and reads can never tear.

use core::sync::atomic::{AtomicI32, AtomicU32, Ordering};

use embedded_hal::digital::InputPin;

use super::driver::EncoderEventSink;

/// One of the two drive wheels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wheel {
    Left,
    Right,
}

/// The shared per-wheel counters: signed step counts and unsigned
/// inter-edge time accumulators (capture-timer ticks).
///
/// Step counts are monotonic within a single maneuver and effectively
/// unbounded 32-bit over any realistic mission. They are never reset;
/// control loops measure progress against their own entry snapshots.
pub struct WheelCounters {
    left_steps: AtomicI32,
    right_steps: AtomicI32,
    left_ticks: AtomicU32,
    right_ticks: AtomicU32,
}

impl WheelCounters {
    pub const fn new() -> Self {
        WheelCounters {
            left_steps: AtomicI32::new(0),
            right_steps: AtomicI32::new(0),
            left_ticks: AtomicU32::new(0),
            right_ticks: AtomicU32::new(0),
        }
    }

    /// A read-only snapshot handle for the control loops.
    pub fn reader(&self) -> TachReader<'_> {
        TachReader { counters: self }
    }
}

impl Default for WheelCounters {
    fn default() -> Self {
        WheelCounters::new()
    }
}

/// Writer handle: classifies encoder edges and updates the shared
/// counters. Owned by whatever dispatches the capture interrupts.
///
/// `BL` and `BR` are the quadrature "B" input pins for the left and right
/// encoders.
pub struct Tachometer<'a, BL, BR> {
    counters: &'a WheelCounters,
    left_b: BL,
    right_b: BR,
    last_left_time: u16,
    last_right_time: u16,
}

impl<'a, BL, BR> Tachometer<'a, BL, BR>
where
    BL: InputPin,
    BR: InputPin,
{
    pub fn new(counters: &'a WheelCounters, left_b: BL, right_b: BR) -> Self {
        Tachometer {
            counters,
            left_b,
            right_b,
            last_left_time: 0,
            last_right_time: 0,
        }
    }
}

impl<'a, BL, BR> EncoderEventSink for Tachometer<'a, BL, BR>
where
    BL: InputPin,
    BR: InputPin,
{
    fn encoder_edge(&mut self, wheel: Wheel, timestamp: u16) {
        match wheel {
            Wheel::Left => {
                let diff = timestamp.wrapping_sub(self.last_left_time);
                self.last_left_time = timestamp;
                self.counters
                    .left_ticks
                    .fetch_add(diff as u32, Ordering::Relaxed);
                // B high at the A edge is a forward step. The pins are
                // plain GPIO; a failed read counts as forward.
                let delta = if self.left_b.is_high().unwrap_or(true) {
                    1
                } else {
                    -1
                };
                self.counters.left_steps.fetch_add(delta, Ordering::Relaxed);
            }
            Wheel::Right => {
                let diff = timestamp.wrapping_sub(self.last_right_time);
                self.last_right_time = timestamp;
                self.counters
                    .right_ticks
                    .fetch_add(diff as u32, Ordering::Relaxed);
                let delta = if self.right_b.is_high().unwrap_or(true) {
                    1
                } else {
                    -1
                };
                self.counters
                    .right_steps
                    .fetch_add(delta, Ordering::Relaxed);
            }
        }
    }
}

/// Read-only snapshot handle over the shared counters.
#[derive(Clone, Copy)]
pub struct TachReader<'a> {
    counters: &'a WheelCounters,
}

impl<'a> TachReader<'a> {
    /// Instantaneous `(left, right)` step counts.
    pub fn steps(&self) -> (i32, i32) {
        (
            self.counters.left_steps.load(Ordering::Relaxed),
            self.counters.right_steps.load(Ordering::Relaxed),
        )
    }

    /// Instantaneous `(left steps, right steps, left ticks, right ticks)`.
    pub fn space_time(&self) -> (i32, i32, u32, u32) {
        let (left, right) = self.steps();
        (
            left,
            right,
            self.counters.left_ticks.load(Ordering::Relaxed),
            self.counters.right_ticks.load(Ordering::Relaxed),
        )
    }
}

#[cfg(test)]
mod tests {
    use core::convert::Infallible;

    use super::*;

    /// Quadrature "B" pin with a settable level.
    struct LevelPin(bool);

    impl embedded_hal::digital::ErrorType for LevelPin {
        type Error = Infallible;
    }

    impl InputPin for LevelPin {
        fn is_high(&mut self) -> Result<bool, Self::Error> {
            Ok(self.0)
        }

        fn is_low(&mut self) -> Result<bool, Self::Error> {
            Ok(!self.0)
        }
    }

    #[test]
    fn forward_and_reverse_edges() {
        let counters = WheelCounters::new();
        let mut tach = Tachometer::new(&counters, LevelPin(true), LevelPin(false));
        let reader = counters.reader();

        tach.encoder_edge(Wheel::Left, 100);
        tach.encoder_edge(Wheel::Left, 200);
        tach.encoder_edge(Wheel::Right, 150);

        // Left B is high (forward), right B is low (reverse).
        assert_eq!(reader.steps(), (2, -1));
    }

    #[test]
    fn time_accumulates_per_wheel() {
        let counters = WheelCounters::new();
        let mut tach = Tachometer::new(&counters, LevelPin(true), LevelPin(true));
        let reader = counters.reader();

        tach.encoder_edge(Wheel::Left, 1000);
        tach.encoder_edge(Wheel::Left, 1400);
        tach.encoder_edge(Wheel::Right, 50);

        let (_, _, left_ticks, right_ticks) = reader.space_time();
        assert_eq!(left_ticks, 1000 + 400);
        assert_eq!(right_ticks, 50);
    }

    #[test]
    fn edge_interval_survives_timer_wrap() {
        let counters = WheelCounters::new();
        let mut tach = Tachometer::new(&counters, LevelPin(true), LevelPin(true));
        let reader = counters.reader();

        tach.encoder_edge(Wheel::Left, u16::MAX - 10);
        tach.encoder_edge(Wheel::Left, 20);

        let (_, _, left_ticks, _) = reader.space_time();
        assert_eq!(left_ticks, (u16::MAX - 10) as u32 + 31);
    }

    #[test]
    fn readers_share_one_set_of_counters() {
        let counters = WheelCounters::new();
        let mut tach = Tachometer::new(&counters, LevelPin(true), LevelPin(true));
        let a = counters.reader();
        let b = a;

        tach.encoder_edge(Wheel::Right, 1);
        assert_eq!(a.steps(), b.steps());
    }
}
