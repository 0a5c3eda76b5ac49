//! Indicator adapter for addressable LED strips.
//!
//! The chassis carries two headlight LEDs and two tail LEDs on a single
//! addressable chain. This module maps the core's on/off indicator
//! contract onto any [`SmartLedsWrite`] driver: headlights render white,
//! tail lights red, everything else black.

use smart_leds_trait::{SmartLedsWrite, RGB8};

use super::driver::Indicators;

const FRONT_COLOR: RGB8 = RGB8 {
    r: 255,
    g: 255,
    b: 255,
};
const BACK_COLOR: RGB8 = RGB8 { r: 255, g: 0, b: 0 };
const OFF: RGB8 = RGB8 { r: 0, g: 0, b: 0 };

/// Drives the four-LED chain (front pair first, then rear pair) from the
/// front/back indicator state.
pub struct LedIndicators<Driver> {
    driver: Driver,
    front_on: bool,
    back_on: bool,
}

impl<Driver, E> LedIndicators<Driver>
where
    Driver: SmartLedsWrite<Color = RGB8, Error = E>,
    E: core::fmt::Debug,
{
    /// Create the adapter with both banks dark.
    pub fn new(driver: Driver) -> Self {
        LedIndicators {
            driver,
            front_on: false,
            back_on: false,
        }
    }

    fn refresh(&mut self) -> Result<(), E> {
        let front = if self.front_on { FRONT_COLOR } else { OFF };
        let back = if self.back_on { BACK_COLOR } else { OFF };
        self.driver.write([front, front, back, back].into_iter())
    }
}

impl<Driver, E> Indicators for LedIndicators<Driver>
where
    Driver: SmartLedsWrite<Color = RGB8, Error = E>,
    E: core::fmt::Debug,
{
    fn front(&mut self, on: bool) {
        self.front_on = on;
        if let Err(e) = self.refresh() {
            tracing::warn!("indicator write failed: {:?}", e);
        }
    }

    fn back(&mut self, on: bool) {
        self.back_on = on;
        if let Err(e) = self.refresh() {
            tracing::warn!("indicator write failed: {:?}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use core::convert::Infallible;

    use super::*;

    /// Records the last frame written to the chain.
    struct FrameDriver {
        last: [RGB8; 4],
    }

    impl SmartLedsWrite for FrameDriver {
        type Color = RGB8;
        type Error = Infallible;

        fn write<T, I>(&mut self, iterator: T) -> Result<(), Self::Error>
        where
            T: IntoIterator<Item = I>,
            I: Into<Self::Color>,
        {
            for (slot, color) in self.last.iter_mut().zip(iterator) {
                *slot = color.into();
            }
            Ok(())
        }
    }

    #[test]
    fn front_and_back_banks_are_independent() {
        let mut leds = LedIndicators::new(FrameDriver { last: [OFF; 4] });

        leds.front(true);
        assert_eq!(leds.driver.last, [FRONT_COLOR, FRONT_COLOR, OFF, OFF]);

        leds.back(true);
        assert_eq!(
            leds.driver.last,
            [FRONT_COLOR, FRONT_COLOR, BACK_COLOR, BACK_COLOR]
        );

        leds.front(false);
        assert_eq!(leds.driver.last, [OFF, OFF, BACK_COLOR, BACK_COLOR]);
    }
}
