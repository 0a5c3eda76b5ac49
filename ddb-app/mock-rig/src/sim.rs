//! Software chassis for the mock rig.
//!
//! Implements the core's hardware traits over a small 2D physics model:
//! duty commands become wheel travel, wheel travel becomes encoder edges
//! fed through the real tachometer, and the three range channels ray-cast
//! against circular obstacles, then run backward through the calibration
//! curves so the core sees plausible raw ADC samples. Simulated time only
//! moves inside the delay primitive, mirroring the target's control
//! cadence, so scenarios run as fast as the host allows.

use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::f64::consts::PI;
use std::rc::Rc;

use ddb_core::utils::controllers::{
    EncoderEventSink, MotorDriver, RangeSensors, Tachometer, Wheel, WheelCounters,
};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::InputPin;
use serde::{Deserialize, Serialize};
use smart_leds_trait::{SmartLedsWrite, RGB8};
use tracing::debug;

/// Capture-timer ticks per simulated millisecond (12 MHz clock).
const TICKS_PER_MS: f64 = 12_000.0;

/// Millimeters of wheel travel per encoder step.
const MM_PER_STEP: f64 = PI * 70.0 / 360.0;

/// Wheel-to-wheel track width (mm).
const TRACK_WIDTH_MM: f64 = 140.0;

/// Bearing of the side range sensors off the chassis centerline (deg).
const SIDE_SENSOR_ANGLE_DEG: f64 = 30.0;

/// Reported distance when a ray hits nothing (mm).
const MAX_RANGE_MM: f64 = 1500.0;

/// A circular obstacle on the floor plane.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Obstacle {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Drive {
    Forward,
    Backward,
    SpinLeft,
    SpinRight,
    Stop,
}

/// Ground truth the trait implementations share.
pub struct World {
    drive: Drive,
    left_duty: u16,
    right_duty: u16,
    left_pos: f64,
    right_pos: f64,
    left_emitted: i64,
    right_emitted: i64,
    ticks: u64,
    x_mm: f64,
    y_mm: f64,
    heading_deg: f64,
    obstacles: Vec<Obstacle>,
}

impl World {
    fn new(x_mm: f64, y_mm: f64, heading_deg: f64, obstacles: Vec<Obstacle>) -> Self {
        World {
            drive: Drive::Stop,
            left_duty: 0,
            right_duty: 0,
            left_pos: 0.0,
            right_pos: 0.0,
            left_emitted: 0,
            right_emitted: 0,
            ticks: 0,
            x_mm,
            y_mm,
            heading_deg,
            obstacles,
        }
    }

    /// Signed wheel rates in steps per millisecond. Duty maps linearly to
    /// wheel speed as the inverse of the controller's duty estimate:
    /// duty 6000 is 100.0 RPM is 0.6 steps/ms.
    fn rates(&self) -> (f64, f64) {
        let left = self.left_duty as f64 / 10_000.0;
        let right = self.right_duty as f64 / 10_000.0;
        match self.drive {
            Drive::Forward => (left, right),
            Drive::Backward => (-left, -right),
            Drive::SpinLeft => (-left, right),
            Drive::SpinRight => (left, -right),
            Drive::Stop => (0.0, 0.0),
        }
    }

    /// Integrate the differential-drive pose over `ms` milliseconds.
    fn integrate(&mut self, ms: f64) {
        let (left_rate, right_rate) = self.rates();
        // 1 ms slices keep the heading integration honest through turns.
        let mut remaining = ms;
        while remaining > 0.0 {
            let dt = remaining.min(1.0);
            let d_left = left_rate * dt;
            let d_right = right_rate * dt;
            self.left_pos += d_left;
            self.right_pos += d_right;

            let forward_mm = (d_left + d_right) / 2.0 * MM_PER_STEP;
            let turn_rad = (d_right - d_left) * MM_PER_STEP / TRACK_WIDTH_MM;
            let heading_rad = self.heading_deg.to_radians();
            self.x_mm += forward_mm * heading_rad.cos();
            self.y_mm += forward_mm * heading_rad.sin();
            self.heading_deg = (self.heading_deg + turn_rad.to_degrees()).rem_euclid(360.0);

            remaining -= dt;
        }
        self.ticks += (ms * TICKS_PER_MS) as u64;
    }

    /// Distance (mm) a range sensor pointing `offset_deg` off the
    /// centerline reads against the obstacle field.
    fn ray_distance(&self, offset_deg: f64) -> f64 {
        let angle = (self.heading_deg + offset_deg).to_radians();
        let (dx, dy) = (angle.cos(), angle.sin());

        let mut nearest = MAX_RANGE_MM;
        for obstacle in &self.obstacles {
            let ox = obstacle.x - self.x_mm;
            let oy = obstacle.y - self.y_mm;
            let along = ox * dx + oy * dy;
            if along < 0.0 {
                continue;
            }
            let lateral_sq = ox * ox + oy * oy - along * along;
            let r_sq = obstacle.radius * obstacle.radius;
            if lateral_sq > r_sq {
                continue;
            }
            let hit = along - (r_sq - lateral_sq).sqrt();
            if hit >= 0.0 && hit < nearest {
                nearest = hit;
            }
        }
        nearest
    }

    pub fn true_pose(&self) -> (f64, f64, f64) {
        (self.x_mm, self.y_mm, self.heading_deg)
    }
}

/// Number of whole steps the wheel crossed since the last drain.
fn drain_edges(pos: f64, emitted: &mut i64) -> u64 {
    let mut edges = 0;
    while pos - *emitted as f64 >= 1.0 {
        *emitted += 1;
        edges += 1;
    }
    while pos - *emitted as f64 <= -1.0 {
        *emitted -= 1;
        edges += 1;
    }
    edges
}

/// Raw sample that the given calibration curve converts back to `mm`.
fn raw_for(mm: f64, coefficient: f64, exponent: f64) -> u16 {
    libm::pow(mm / coefficient, 1.0 / exponent) as u16
}

pub struct SimMotor {
    world: Rc<RefCell<World>>,
    left_b: Rc<Cell<bool>>,
    right_b: Rc<Cell<bool>>,
}

impl SimMotor {
    fn set(&mut self, drive: Drive, left_duty: u16, right_duty: u16) {
        let mut world = self.world.borrow_mut();
        world.drive = drive;
        world.left_duty = left_duty;
        world.right_duty = right_duty;
        let (left_rate, right_rate) = world.rates();
        // Quadrature B level: high while the wheel rolls forward.
        self.left_b.set(left_rate >= 0.0);
        self.right_b.set(right_rate >= 0.0);
        debug!(?drive, left_duty, right_duty, "motor command");
    }
}

impl MotorDriver for SimMotor {
    fn forward(&mut self, left_duty: u16, right_duty: u16) {
        self.set(Drive::Forward, left_duty, right_duty);
    }

    fn backward(&mut self, left_duty: u16, right_duty: u16) {
        self.set(Drive::Backward, left_duty, right_duty);
    }

    fn spin_left(&mut self, left_duty: u16, right_duty: u16) {
        self.set(Drive::SpinLeft, left_duty, right_duty);
    }

    fn spin_right(&mut self, left_duty: u16, right_duty: u16) {
        self.set(Drive::SpinRight, left_duty, right_duty);
    }

    fn stop(&mut self) {
        self.set(Drive::Stop, 0, 0);
    }
}

/// The analog range channels. The side channels are wired crosswise on
/// the mast, so the ray cast for the reported left side lands on the
/// right channel and vice versa.
pub struct SimAdc(Rc<RefCell<World>>);

impl RangeSensors for SimAdc {
    fn read_raw(&mut self) -> (u16, u16, u16) {
        let world = self.0.borrow();
        let left_mm = world.ray_distance(SIDE_SENSOR_ANGLE_DEG);
        let center_mm = world.ray_distance(0.0);
        let right_mm = world.ray_distance(-SIDE_SENSOR_ANGLE_DEG);
        (
            raw_for(right_mm, 3.0e6, -1.110),
            raw_for(center_mm, 6.0e6, -1.182),
            raw_for(left_mm, 3.0e6, -1.116),
        )
    }
}

/// LED driver that narrates the indicator chain to the console.
pub struct ConsoleLedDriver;

impl SmartLedsWrite for ConsoleLedDriver {
    type Color = RGB8;
    type Error = Infallible;

    fn write<T, I>(&mut self, iterator: T) -> Result<(), Self::Error>
    where
        T: IntoIterator<Item = I>,
        I: Into<Self::Color>,
    {
        for (index, color) in iterator.into_iter().enumerate() {
            let color: RGB8 = color.into();
            debug!(index, r = color.r, g = color.g, b = color.b, "led");
        }
        Ok(())
    }
}

pub struct SimPin(Rc<Cell<bool>>);

impl embedded_hal::digital::ErrorType for SimPin {
    type Error = Infallible;
}

impl InputPin for SimPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.0.get())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.0.get())
    }
}

/// The tick primitive: each delay advances the physics and delivers the
/// encoder edges the motion produced.
pub struct SimDelay {
    world: Rc<RefCell<World>>,
    tach: Tachometer<'static, SimPin, SimPin>,
}

impl SimDelay {
    fn advance(&mut self, ms: f64) {
        let (ticks_start, chunk_ticks, left_edges, right_edges) = {
            let mut world = self.world.borrow_mut();
            let ticks_start = world.ticks;
            world.integrate(ms);
            let chunk_ticks = world.ticks - ticks_start;
            let left_edges = drain_edges(world.left_pos, &mut world.left_emitted);
            let right_edges = drain_edges(world.right_pos, &mut world.right_emitted);
            (ticks_start, chunk_ticks, left_edges, right_edges)
        };

        // Spread each wheel's edges across the chunk so consecutive edge
        // intervals stay under one 16-bit timer wrap.
        for i in 0..left_edges {
            let ts = ticks_start + chunk_ticks * (i + 1) / (left_edges + 1);
            self.tach.encoder_edge(Wheel::Left, (ts & 0xFFFF) as u16);
        }
        for i in 0..right_edges {
            let ts = ticks_start + chunk_ticks * (i + 1) / (right_edges + 1);
            self.tach.encoder_edge(Wheel::Right, (ts & 0xFFFF) as u16);
        }
    }
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.advance(ns as f64 / 1_000_000.0);
    }
}

/// Everything a scenario needs: the trait implementations wired to one
/// shared world, plus a tachometer read handle.
pub struct Rig {
    pub world: Rc<RefCell<World>>,
    pub motor: SimMotor,
    pub adc: SimAdc,
    pub delay: SimDelay,
    pub counters: &'static WheelCounters,
}

impl Rig {
    pub fn new(x_mm: f64, y_mm: f64, heading_deg: f64, obstacles: Vec<Obstacle>) -> Self {
        let world = Rc::new(RefCell::new(World::new(x_mm, y_mm, heading_deg, obstacles)));
        let left_b = Rc::new(Cell::new(true));
        let right_b = Rc::new(Cell::new(true));

        let counters: &'static WheelCounters = Box::leak(Box::new(WheelCounters::new()));
        let tach = Tachometer::new(counters, SimPin(left_b.clone()), SimPin(right_b.clone()));

        Rig {
            world: world.clone(),
            motor: SimMotor {
                world: world.clone(),
                left_b,
                right_b,
            },
            adc: SimAdc(world.clone()),
            delay: SimDelay { world, tach },
            counters,
        }
    }
}
