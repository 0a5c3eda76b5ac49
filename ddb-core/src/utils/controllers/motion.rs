//! Precision movement controller.
//!
//! Two feedback primitives built on the tachometer counters, plus the
//! figure maneuvers layered on top of them:
//!
//! - [`MotionController::spin`] rotates in place under a proportional
//!   balance controller that keeps both wheels covering the same arc.
//! - [`MotionController::forward_rpm`] drives forward while a per-wheel
//!   proportional-integral loop holds each wheel at its own target speed.
//!
//! Both sample sensors and encoders strictly inside the loop body; cadence
//! comes from a fixed post-iteration delay, not a timer interrupt. Every
//! exit path (target reached, sensor trigger, rejected input) leaves the
//! motors actively braked and then stopped, with the indicators dark. That
//! stopped state is a guaranteed post-condition, not best effort.

use embedded_hal::delay::DelayNs;
use tracing::{info, trace};

use super::{
    distance::DistanceSensors,
    driver::{Indicators, MotorDriver, RangeSensors},
    tachometer::TachReader,
    MotionResult, Side,
};
use crate::utils::math::units;

// Figure-maneuver limits: the circle degenerates below one half track
// width of radius, and the star needs room to spin between segments.
const MIN_CIRCLE_RADIUS_CM: u16 = (units::TRACK_WIDTH_MM / 20) as u16;
const MIN_CIRCLE_SPEED: u16 = 350;
const MIN_STAR_SIDE_CM: u16 = 20;
const MIN_STAR_SPEED: u16 = 400;
const STAR_POINTS: u32 = 5;
const STAR_SPIN_DUTY: i32 = 3000;
const STAR_INTERIOR_ANGLE: i32 = 36;
const STAR_EXTERIOR_ANGLE: i32 = 108;
const STAR_PAUSE_MS: u32 = 250;

// Object-follow behavior tuning.
const FOLLOW_RANGE_MM: u32 = 200;
const FOLLOW_DISTANCE_MM: u32 = 100;
const FOLLOW_BAND_MM: u32 = 20;
const FOLLOW_FORWARD_DUTY: i32 = 2000;
const FOLLOW_BACKWARD_DUTY: i32 = 2000;
const FOLLOW_PIVOT_DUTY: u16 = 3000;
const FOLLOW_DUTY_CAP: i32 = 6000;
const FOLLOW_DELAY_MS: u32 = 10;

/// Tunables for both feedback loops.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct MotionConfig {
    /// Lowest commandable duty.
    pub min_duty: i32,
    /// Highest commandable duty.
    pub max_duty: i32,
    /// Proportional gain of the spin balance controller.
    pub kp_spin: i32,
    /// The forward loop integrates `error / integral_divisor` per update.
    pub integral_divisor: i32,
    /// Windup bound: the integral term stays in `±integral_limit`.
    pub integral_limit: i32,
    /// Delay between spin controller iterations (ms).
    pub spin_delay_ms: u32,
    /// Delay between forward controller iterations (ms).
    pub forward_delay_ms: u32,
    /// Duration of the active-braking pulse on exit (ms).
    pub braking_delay_ms: u32,
    /// Forward drive aborts when the center sensor reads under this (mm);
    /// the side sensors trip at half of it.
    pub min_clearance_mm: u32,
    /// A sensor reading beyond this counts as open air during a spin (mm).
    pub open_threshold_mm: u32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        MotionConfig {
            min_duty: 0,
            max_duty: 14998,
            kp_spin: 20,
            integral_divisor: 5,
            integral_limit: 200,
            spin_delay_ms: 20,
            forward_delay_ms: 60,
            braking_delay_ms: 60,
            min_clearance_mm: 150,
            open_threshold_mm: 200,
        }
    }
}

/// Rebalanced spin duty pair for a balance error, before clamping the
/// halves to the duty range. The pair always sums to `2 * speed`.
fn spin_duties(config: &MotionConfig, speed: i32, error: i32) -> (i32, i32) {
    (
        speed - config.kp_spin * error,
        speed + config.kp_spin * error,
    )
}

/// One PI update: fold `error` into the clamped integral, then into the
/// clamped duty. Returns `(duty, integral)`.
fn pi_step(config: &MotionConfig, duty: i32, integral: i32, error: i32) -> (i32, i32) {
    let integral = (integral + error / config.integral_divisor)
        .clamp(-config.integral_limit, config.integral_limit);
    let duty = (duty + error + integral).clamp(config.min_duty, config.max_duty);
    (duty, integral)
}

/// Owns the motor driver, calibrated range sensors, indicator lights, the
/// tick delay, and a tachometer read handle.
pub struct MotionController<'a, M, A, L, D> {
    motor: M,
    sensors: DistanceSensors<A>,
    lights: L,
    delay: D,
    tach: TachReader<'a>,
    config: MotionConfig,
}

impl<'a, M, A, L, D> MotionController<'a, M, A, L, D>
where
    M: MotorDriver,
    A: RangeSensors,
    L: Indicators,
    D: DelayNs,
{
    pub fn new(
        motor: M,
        sensors: DistanceSensors<A>,
        lights: L,
        delay: D,
        tach: TachReader<'a>,
    ) -> Self {
        Self::with_config(motor, sensors, lights, delay, tach, MotionConfig::default())
    }

    pub fn with_config(
        motor: M,
        sensors: DistanceSensors<A>,
        lights: L,
        delay: D,
        tach: TachReader<'a>,
        config: MotionConfig,
    ) -> Self {
        MotionController {
            motor,
            sensors,
            lights,
            delay,
            tach,
            config,
        }
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    /// Current `(left, right)` wheel step counts.
    pub fn steps(&self) -> (i32, i32) {
        self.tach.steps()
    }

    /// Calibrated `(left, center, right)` distances in millimeters.
    pub fn distances_mm(&mut self) -> (u32, u32, u32) {
        self.sensors.distances_mm()
    }

    /// Block for `ms` milliseconds on the tick primitive.
    pub fn wait_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }

    /// Spin in place until both wheels have covered `target_steps`.
    ///
    /// Both wheels run at the common base `speed` duty in opposite
    /// directions; a proportional term (gain [`MotionConfig::kp_spin`])
    /// rebalances the pair whenever one wheel gets ahead of the other.
    /// With `interrupt_on_open` set, the spin also stops as soon as the
    /// sensor on the far side from the turn *and* the center sensor both
    /// read open air, the signal that an obstacle has been cleared.
    ///
    /// A `speed` outside the duty range is rejected before any motion.
    pub fn spin(
        &mut self,
        direction: Side,
        speed: i32,
        target_steps: i32,
        interrupt_on_open: bool,
    ) -> MotionResult {
        if speed < self.config.min_duty || speed > self.config.max_duty {
            return MotionResult::Interrupted;
        }

        let mut result = MotionResult::ReachedTarget;
        let (left_init, right_init) = self.tach.steps();
        let (mut left_steps, mut right_steps) = (left_init, right_init);
        let mut left_duty = speed;
        let mut right_duty = speed;

        self.lights.front(true);
        info!(?direction, speed, target_steps, "spin start");

        loop {
            // Per-wheel progress along the spin, positive in the commanded
            // rotational sense.
            let (lead, trail) = match direction {
                Side::Right => (left_steps - left_init, right_init - right_steps),
                Side::Left => (right_steps - right_init, left_init - left_steps),
            };
            if lead >= target_steps || trail >= target_steps {
                break;
            }

            if interrupt_on_open {
                let (left_mm, center_mm, right_mm) = self.sensors.distances_mm();
                let far_mm = match direction {
                    Side::Right => left_mm,
                    Side::Left => right_mm,
                };
                if far_mm > self.config.open_threshold_mm
                    && center_mm > self.config.open_threshold_mm
                {
                    result = MotionResult::Interrupted;
                    break;
                }
            }

            let snapshot = self.tach.steps();
            left_steps = snapshot.0;
            right_steps = snapshot.1;

            let error = match direction {
                Side::Right => (left_steps - left_init) - (right_init - right_steps),
                Side::Left => (left_init - left_steps) - (right_steps - right_init),
            };
            let (left, right) = spin_duties(&self.config, speed, error);
            left_duty = left.clamp(self.config.min_duty, self.config.max_duty);
            right_duty = right.clamp(self.config.min_duty, self.config.max_duty);
            trace!(error, left_duty, right_duty, "spin rebalance");

            match direction {
                Side::Right => self.motor.spin_right(left_duty as u16, right_duty as u16),
                Side::Left => self.motor.spin_left(left_duty as u16, right_duty as u16),
            }
            self.delay.delay_ms(self.config.spin_delay_ms);
        }

        // Active braking: a short pulse in the reverse rotational sense,
        // then cut drive.
        match direction {
            Side::Right => self.motor.spin_left(left_duty as u16, right_duty as u16),
            Side::Left => self.motor.spin_right(left_duty as u16, right_duty as u16),
        }
        self.delay.delay_ms(self.config.braking_delay_ms);
        self.motor.stop();
        self.lights.front(false);

        info!(?result, "spin done");
        result
    }

    /// Drive forward, independently regulating each wheel toward its
    /// target speed (0.1 RPM units), until either wheel reaches its step
    /// target.
    ///
    /// A wheel's PI update only fires once its time accumulator has moved
    /// since the previous sample (or unconditionally for a zero target),
    /// so the speed estimate never divides a stale interval. With
    /// `obstacle_abort` set, any sensor reading under the minimum
    /// clearance (half of it for the side sensors) ends the drive early.
    pub fn forward_rpm(
        &mut self,
        left_rpm: u16,
        right_rpm: u16,
        left_target_steps: i32,
        right_target_steps: i32,
        obstacle_abort: bool,
    ) -> MotionResult {
        let mut result = MotionResult::ReachedTarget;

        let (left_init, right_init, left_init_ticks, right_init_ticks) = self.tach.space_time();
        let (mut left_steps, mut right_steps) = (left_init, right_init);
        let mut prev_left_steps = left_init;
        let mut prev_right_steps = right_init;
        let mut prev_left_ticks = left_init_ticks;
        let mut prev_right_ticks = right_init_ticks;

        let mut left_integral = 0;
        let mut right_integral = 0;
        let mut left_duty = units::rpm_to_duty_estimate(left_rpm);
        let mut right_duty = units::rpm_to_duty_estimate(right_rpm);

        self.lights.front(true);
        info!(
            left_rpm,
            right_rpm, left_target_steps, right_target_steps, "forward start"
        );

        while (left_steps - left_init) < left_target_steps
            && (right_steps - right_init) < right_target_steps
        {
            if obstacle_abort {
                let (left_mm, center_mm, right_mm) = self.sensors.distances_mm();
                let min = self.config.min_clearance_mm;
                if left_mm < min / 2 || center_mm < min || right_mm < min / 2 {
                    result = MotionResult::Interrupted;
                    break;
                }
            }

            let (ls, rs, left_ticks, right_ticks) = self.tach.space_time();
            left_steps = ls;
            right_steps = rs;

            if left_ticks != prev_left_ticks || left_rpm == 0 {
                let measured = units::compute_rpm(
                    left_steps,
                    prev_left_steps,
                    left_ticks,
                    prev_left_ticks,
                );
                let error = left_rpm as i32 - measured;
                let (duty, integral) = pi_step(&self.config, left_duty, left_integral, error);
                left_duty = duty;
                left_integral = integral;
                prev_left_steps = left_steps;
                prev_left_ticks = left_ticks;
                trace!(measured, error, left_duty, "left wheel update");
            }

            if right_ticks != prev_right_ticks || right_rpm == 0 {
                let measured = units::compute_rpm(
                    right_steps,
                    prev_right_steps,
                    right_ticks,
                    prev_right_ticks,
                );
                let error = right_rpm as i32 - measured;
                let (duty, integral) = pi_step(&self.config, right_duty, right_integral, error);
                right_duty = duty;
                right_integral = integral;
                prev_right_steps = right_steps;
                prev_right_ticks = right_ticks;
                trace!(measured, error, right_duty, "right wheel update");
            }

            self.motor.forward(left_duty as u16, right_duty as u16);
            self.delay.delay_ms(self.config.forward_delay_ms);
        }

        // Active braking with the tail lights up.
        self.motor.backward(left_duty as u16, right_duty as u16);
        self.lights.front(false);
        self.lights.back(true);
        self.delay.delay_ms(self.config.braking_delay_ms);
        self.motor.stop();
        self.lights.back(false);

        info!(?result, "forward done");
        result
    }

    /// Drive a full circle of `radius_cm` about a center on the given
    /// side, at `speed` (0.1 RPM) for the chassis midpoint.
    ///
    /// The inner and outer wheels get speeds and step targets scaled by
    /// their respective turn radii. Inputs under the minimum radius or
    /// speed are rejected without motion.
    pub fn circle(&mut self, turn: Side, speed: u16, radius_cm: u16) -> MotionResult {
        if radius_cm < MIN_CIRCLE_RADIUS_CM || speed < MIN_CIRCLE_SPEED {
            return MotionResult::Interrupted;
        }

        let radius = radius_cm as i32 * 10;
        let inner = radius - units::TRACK_WIDTH_MM / 2;
        let outer = radius + units::TRACK_WIDTH_MM / 2;
        let circumference = 2.0 * core::f32::consts::PI * radius as f32;

        let mut inner_steps =
            units::distance_to_steps((circumference * inner as f32 / radius as f32) as i32);
        let outer_steps =
            units::distance_to_steps((circumference * outer as f32 / radius as f32) as i32);
        // A pivot about one wheel would otherwise finish instantly.
        if inner_steps == 0 {
            inner_steps = outer_steps;
        }

        let inner_rpm = (speed as i32 * inner / radius) as u16;
        let outer_rpm = (speed as i32 * outer / radius) as u16;

        match turn {
            Side::Left => self.forward_rpm(inner_rpm, outer_rpm, inner_steps, outer_steps, false),
            Side::Right => self.forward_rpm(outer_rpm, inner_rpm, outer_steps, inner_steps, false),
        }
    }

    /// Trace a five-pointed star with sides of `side_cm`, alternating
    /// straight segments with point and corner turns.
    pub fn star(&mut self, speed: u16, side_cm: u16) -> MotionResult {
        if side_cm < MIN_STAR_SIDE_CM || speed < MIN_STAR_SPEED {
            return MotionResult::Interrupted;
        }

        let segment_steps = units::distance_to_steps(side_cm as i32 * 10);
        for _ in 0..STAR_POINTS {
            self.forward_rpm(speed, speed, segment_steps, segment_steps, false);
            self.delay.delay_ms(STAR_PAUSE_MS);
            self.spin(
                Side::Left,
                STAR_SPIN_DUTY,
                units::angle_to_steps(180 - STAR_INTERIOR_ANGLE),
                false,
            );
            self.delay.delay_ms(STAR_PAUSE_MS);
            self.forward_rpm(speed, speed, segment_steps, segment_steps, false);
            self.delay.delay_ms(STAR_PAUSE_MS);
            self.spin(
                Side::Right,
                STAR_SPIN_DUTY,
                units::angle_to_steps(180 - STAR_EXTERIOR_ANGLE),
                false,
            );
            self.delay.delay_ms(STAR_PAUSE_MS);
        }
        MotionResult::ReachedTarget
    }

    /// Track the nearest object in range for `cycles` control iterations:
    /// hold station behind a centered object, pivot toward a nearer side
    /// object, stop when nothing is within range.
    ///
    /// Forward/backward duty grows proportionally with the station-keeping
    /// error, capped well under full drive. The motors are stopped when
    /// the cycle budget runs out.
    pub fn follow(&mut self, cycles: u32) {
        info!(cycles, "follow start");
        for _ in 0..cycles {
            let (left_mm, center_mm, right_mm) = self.sensors.distances_mm();
            let left_near = left_mm < FOLLOW_RANGE_MM;
            let center_near = center_mm < FOLLOW_RANGE_MM;
            let right_near = right_mm < FOLLOW_RANGE_MM;

            if center_near && center_mm <= left_mm && center_mm <= right_mm {
                if center_mm <= FOLLOW_DISTANCE_MM - FOLLOW_BAND_MM {
                    let duty = (FOLLOW_BACKWARD_DUTY
                        + FOLLOW_BACKWARD_DUTY * (FOLLOW_DISTANCE_MM - center_mm) as i32 / 30)
                        .clamp(self.config.min_duty, FOLLOW_DUTY_CAP);
                    self.motor.backward(duty as u16, duty as u16);
                    self.lights.front(false);
                    self.lights.back(true);
                } else if center_mm >= FOLLOW_DISTANCE_MM + FOLLOW_BAND_MM {
                    let duty = (FOLLOW_FORWARD_DUTY
                        + FOLLOW_FORWARD_DUTY * (center_mm - FOLLOW_DISTANCE_MM) as i32 / 50)
                        .clamp(self.config.min_duty, FOLLOW_DUTY_CAP);
                    self.motor.forward(duty as u16, duty as u16);
                    self.lights.front(true);
                    self.lights.back(false);
                } else {
                    self.motor.stop();
                    self.lights.front(false);
                    self.lights.back(false);
                }
            } else if left_near && left_mm < center_mm && left_mm < right_mm {
                self.motor.spin_left(FOLLOW_PIVOT_DUTY, FOLLOW_PIVOT_DUTY);
            } else if right_near && right_mm < left_mm && right_mm < center_mm {
                self.motor.spin_right(FOLLOW_PIVOT_DUTY, FOLLOW_PIVOT_DUTY);
            } else {
                self.motor.stop();
                self.lights.front(false);
                self.lights.back(false);
            }

            self.delay.delay_ms(FOLLOW_DELAY_MS);
        }

        self.motor.stop();
        self.lights.front(false);
        self.lights.back(false);
        info!("follow done");
    }
}

#[cfg(test)]
mod tests {
    use embedded_hal_mock::eh1::delay::NoopDelay;

    use super::*;
    use crate::utils::controllers::tachometer::WheelCounters;

    #[test]
    fn spin_duty_pair_sums_to_twice_speed() {
        let config = MotionConfig::default();
        for error in [-40, -3, 0, 1, 17] {
            let (left, right) = spin_duties(&config, 2500, error);
            assert_eq!(left + right, 2 * 2500);
        }
    }

    #[test]
    fn spin_duties_clamp_into_range() {
        let config = MotionConfig::default();
        let (left, right) = spin_duties(&config, 2500, 1000);
        assert_eq!(left.clamp(config.min_duty, config.max_duty), 0);
        assert_eq!(right.clamp(config.min_duty, config.max_duty), 14998);
    }

    #[test]
    fn integral_term_stays_bounded() {
        let config = MotionConfig::default();
        let mut duty = 3900;
        let mut integral = 0;
        for _ in 0..100 {
            let (d, i) = pi_step(&config, duty, integral, 1000);
            duty = d;
            integral = i;
            assert!(integral.abs() <= config.integral_limit);
        }
        assert_eq!(integral, config.integral_limit);
        assert_eq!(duty, config.max_duty);

        for _ in 0..100 {
            let (d, i) = pi_step(&config, duty, integral, -1000);
            duty = d;
            integral = i;
            assert!(integral.abs() <= config.integral_limit);
        }
        assert_eq!(integral, -config.integral_limit);
        assert_eq!(duty, config.min_duty);
    }

    /// Motor mock that counts calls and remembers the call order.
    #[derive(Default)]
    struct CountingMotor {
        forward: u32,
        backward: u32,
        spin_left: u32,
        spin_right: u32,
        stop: u32,
        last: Option<&'static str>,
    }

    impl MotorDriver for CountingMotor {
        fn forward(&mut self, _left: u16, _right: u16) {
            self.forward += 1;
            self.last = Some("forward");
        }

        fn backward(&mut self, _left: u16, _right: u16) {
            self.backward += 1;
            self.last = Some("backward");
        }

        fn spin_left(&mut self, _left: u16, _right: u16) {
            self.spin_left += 1;
            self.last = Some("spin_left");
        }

        fn spin_right(&mut self, _left: u16, _right: u16) {
            self.spin_right += 1;
            self.last = Some("spin_right");
        }

        fn stop(&mut self) {
            self.stop += 1;
            self.last = Some("stop");
        }
    }

    struct FarAdc;

    impl RangeSensors for FarAdc {
        fn read_raw(&mut self) -> (u16, u16, u16) {
            (100, 100, 100)
        }
    }

    #[derive(Default)]
    struct NullLights {
        front_events: u32,
        back_events: u32,
    }

    impl Indicators for NullLights {
        fn front(&mut self, _on: bool) {
            self.front_events += 1;
        }

        fn back(&mut self, _on: bool) {
            self.back_events += 1;
        }
    }

    fn controller(
        counters: &WheelCounters,
    ) -> MotionController<'_, CountingMotor, FarAdc, NullLights, NoopDelay> {
        MotionController::new(
            CountingMotor::default(),
            DistanceSensors::new(FarAdc),
            NullLights::default(),
            NoopDelay::new(),
            counters.reader(),
        )
    }

    #[test]
    fn out_of_range_spin_speed_is_rejected_without_motion() {
        let counters = WheelCounters::new();
        let mut ctrl = controller(&counters);

        assert_eq!(
            ctrl.spin(Side::Left, 15_000, 100, false),
            MotionResult::Interrupted
        );
        assert_eq!(
            ctrl.spin(Side::Right, -1, 100, false),
            MotionResult::Interrupted
        );
        assert_eq!(ctrl.motor.stop, 0);
        assert_eq!(ctrl.lights.front_events, 0);
        assert!(ctrl.motor.last.is_none());
    }

    #[test]
    fn zero_step_spin_still_brakes_and_stops() {
        let counters = WheelCounters::new();
        let mut ctrl = controller(&counters);

        assert_eq!(
            ctrl.spin(Side::Right, 2500, 0, false),
            MotionResult::ReachedTarget
        );
        // The braking pulse reverses the rotational sense before the stop.
        assert_eq!(ctrl.motor.spin_right, 0);
        assert_eq!(ctrl.motor.spin_left, 1);
        assert_eq!(ctrl.motor.stop, 1);
        assert_eq!(ctrl.motor.last, Some("stop"));
    }

    #[test]
    fn zero_step_forward_still_brakes_and_stops() {
        let counters = WheelCounters::new();
        let mut ctrl = controller(&counters);

        assert_eq!(
            ctrl.forward_rpm(650, 650, 0, 0, false),
            MotionResult::ReachedTarget
        );
        assert_eq!(ctrl.motor.forward, 0);
        assert_eq!(ctrl.motor.backward, 1);
        assert_eq!(ctrl.motor.stop, 1);
        assert_eq!(ctrl.motor.last, Some("stop"));
    }

    #[test]
    fn degenerate_circle_inputs_are_rejected() {
        let counters = WheelCounters::new();
        let mut ctrl = controller(&counters);

        assert_eq!(
            ctrl.circle(Side::Left, 650, MIN_CIRCLE_RADIUS_CM - 1),
            MotionResult::Interrupted
        );
        assert_eq!(
            ctrl.circle(Side::Right, MIN_CIRCLE_SPEED - 1, 40),
            MotionResult::Interrupted
        );
        assert!(ctrl.motor.last.is_none());
    }
}
