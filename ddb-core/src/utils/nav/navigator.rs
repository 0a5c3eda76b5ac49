//! Maneuver primitives and the seek/avoid navigation loop.

use embedded_hal::delay::DelayNs;
use tracing::info;

use super::odometry::{calculate_bearing, Point, Pose};
use crate::utils::{
    controllers::{Indicators, MotionController, MotionResult, MotorDriver, RangeSensors, Side},
    math::units,
};

/// What to do when an obstacle blocks the path and neither side sensor
/// reads open air.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvoidancePolicy {
    /// Turn toward the goal bearing anyway.
    PreferGoalBearing,
    /// Turn toward whichever side currently reads the larger distance,
    /// minimizing the spin.
    PreferLargerClearance,
}

/// Navigator tunables.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct NavConfig {
    /// Left wheel target speed when driving (0.1 RPM).
    pub left_rpm: u16,
    /// Right wheel target speed when driving (0.1 RPM).
    pub right_rpm: u16,
    /// Base duty for all spins.
    pub spin_duty: i32,
    /// A side sensor at or beyond this distance counts as open (mm).
    pub open_threshold_mm: u32,
    /// Clearance distance driven after an avoidance spin (mm).
    pub advance_mm: i32,
    /// Cap on a single avoidance spin (degrees).
    pub max_avoid_degrees: i32,
    /// Settling delay between navigation steps (ms).
    pub step_delay_ms: u32,
    /// Tick of the terminal idle loop (ms).
    pub idle_delay_ms: u32,
    pub policy: AvoidancePolicy,
}

impl Default for NavConfig {
    fn default() -> Self {
        NavConfig {
            left_rpm: 650,
            right_rpm: 650,
            spin_duty: 2500,
            open_threshold_mm: 300,
            advance_mm: 400,
            max_avoid_degrees: 90,
            step_delay_ms: 250,
            idle_delay_ms: 1000,
            policy: AvoidancePolicy::PreferGoalBearing,
        }
    }
}

/// Owns the pose and sequences the motion controller toward a
/// destination, detouring around whatever the range sensors flag.
pub struct Navigator<'a, M, A, L, D> {
    motion: MotionController<'a, M, A, L, D>,
    pose: Pose,
    config: NavConfig,
}

impl<'a, M, A, L, D> Navigator<'a, M, A, L, D>
where
    M: MotorDriver,
    A: RangeSensors,
    L: Indicators,
    D: DelayNs,
{
    pub fn new(motion: MotionController<'a, M, A, L, D>, pose: Pose) -> Self {
        Self::with_config(motion, pose, NavConfig::default())
    }

    pub fn with_config(
        motion: MotionController<'a, M, A, L, D>,
        pose: Pose,
        config: NavConfig,
    ) -> Self {
        Navigator {
            motion,
            pose,
            config,
        }
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn config(&self) -> &NavConfig {
        &self.config
    }

    /// Direct access to the motion controller, for callers exercising the
    /// movement primitives outside the navigation loop.
    pub fn motion(&mut self) -> &mut MotionController<'a, M, A, L, D> {
        &mut self.motion
    }

    /// Signed turn from the current heading to `dest`.
    pub fn bearing_to(&self, dest: Point) -> i32 {
        calculate_bearing(&self.pose, dest)
    }

    /// Spin until the chassis faces `dest`, then fold the turn actually
    /// realized (measured from the wheel step deltas, not the commanded
    /// angle) into the heading.
    pub fn correct_heading(&mut self, dest: Point) {
        let alpha = calculate_bearing(&self.pose, dest);
        let direction = if alpha > 0 {
            Side::Left
        } else if alpha < 0 {
            Side::Right
        } else {
            return;
        };

        info!(alpha, "correcting heading");
        let (left_init, right_init) = self.motion.steps();
        self.motion.spin(
            direction,
            self.config.spin_duty,
            units::angle_to_steps(alpha.abs()),
            false,
        );
        self.apply_realized_turn(direction, left_init, right_init);
    }

    /// Drive straight at `dest` with obstacle abort armed; dead-reckon the
    /// pose forward by the lesser wheel's realized travel.
    pub fn drive_forward(&mut self, dest: Point) -> MotionResult {
        let dy = (dest.y - self.pose.y) as f32;
        let dx = (dest.x - self.pose.x) as f32;
        let distance = libm::sqrtf(dy * dy + dx * dx) as i32;
        let target_steps = units::distance_to_steps(distance);

        let (left_init, right_init) = self.motion.steps();
        let result = self.motion.forward_rpm(
            self.config.left_rpm,
            self.config.right_rpm,
            target_steps,
            target_steps,
            true,
        );
        self.apply_realized_travel(left_init, right_init);
        info!(pose = ?self.pose, ?result, "drive forward");
        result
    }

    /// Choose which way to detour around the obstacle ahead.
    pub fn pick_avoidance_side(&mut self, dest: Point) -> Side {
        let (left_mm, _center_mm, right_mm) = self.motion.distances_mm();
        let left_open = left_mm >= self.config.open_threshold_mm;
        let right_open = right_mm >= self.config.open_threshold_mm;

        match (left_open, right_open) {
            (true, false) => Side::Left,
            (false, true) => Side::Right,
            // Both open: swing toward the goal.
            (true, true) => self.toward_goal(dest),
            (false, false) => match self.config.policy {
                AvoidancePolicy::PreferGoalBearing => self.toward_goal(dest),
                AvoidancePolicy::PreferLargerClearance => {
                    if left_mm >= right_mm {
                        Side::Left
                    } else {
                        Side::Right
                    }
                }
            },
        }
    }

    /// Spin toward `side` until the far-side and center sensors both read
    /// open air, capped at `max_degrees`; fold the realized turn into the
    /// heading.
    pub fn spin_avoid(&mut self, side: Side, max_degrees: i32) {
        info!(?side, max_degrees, "avoidance spin");
        let (left_init, right_init) = self.motion.steps();
        self.motion.spin(
            side,
            self.config.spin_duty,
            units::angle_to_steps(max_degrees),
            true,
        );
        self.apply_realized_turn(side, left_init, right_init);
    }

    /// Drive the fixed clearance distance past an obstacle, without the
    /// obstacle abort, and dead-reckon the pose forward.
    pub fn advance_clear(&mut self) {
        let target_steps = units::distance_to_steps(self.config.advance_mm);
        let (left_init, right_init) = self.motion.steps();
        self.motion.forward_rpm(
            self.config.left_rpm,
            self.config.right_rpm,
            target_steps,
            target_steps,
            false,
        );
        self.apply_realized_travel(left_init, right_init);
    }

    /// On `ReachedTarget`, park in a terminal idle loop: the mission is
    /// complete and there is nothing left to replan. Returns immediately
    /// otherwise.
    pub fn check_finished(&mut self, result: MotionResult) {
        if result == MotionResult::ReachedTarget {
            info!(pose = ?self.pose, "destination reached, idling");
            loop {
                self.motion.wait_ms(self.config.idle_delay_ms);
            }
        }
    }

    /// One macro-cycle of the navigation loop: face the destination and
    /// drive; if the drive was interrupted, pick a side, spin past the
    /// obstacle, and advance clear of it.
    pub fn seek(&mut self, dest: Point) -> MotionResult {
        self.correct_heading(dest);
        self.motion.wait_ms(self.config.step_delay_ms);

        let result = self.drive_forward(dest);
        self.motion.wait_ms(self.config.step_delay_ms);

        if result == MotionResult::Interrupted {
            let side = self.pick_avoidance_side(dest);
            self.spin_avoid(side, self.config.max_avoid_degrees);
            self.motion.wait_ms(self.config.step_delay_ms);
            self.advance_clear();
            self.motion.wait_ms(self.config.step_delay_ms);
        }
        result
    }

    /// Seek until the destination is reached, then idle forever.
    pub fn run(&mut self, dest: Point) -> ! {
        loop {
            let result = self.seek(dest);
            self.check_finished(result);
        }
    }

    fn toward_goal(&self, dest: Point) -> Side {
        if calculate_bearing(&self.pose, dest) >= 0 {
            Side::Left
        } else {
            Side::Right
        }
    }

    /// Heading update shared by both spin maneuvers: the realized angle
    /// comes from the forward-rolling wheel's step delta, negated for
    /// right turns.
    fn apply_realized_turn(&mut self, direction: Side, left_init: i32, right_init: i32) {
        let (left, right) = self.motion.steps();
        let traveled = (left - left_init).max(right - right_init);
        let mut angle = units::steps_to_angle(traveled);
        if direction == Side::Right {
            angle = -angle;
        }
        self.pose.rotate(angle);
    }

    /// Pose update shared by both forward maneuvers: advance by the lesser
    /// wheel's realized travel, projected along the current heading.
    fn apply_realized_travel(&mut self, left_init: i32, right_init: i32) {
        let (left, right) = self.motion.steps();
        let traveled = (left - left_init).min(right - right_init);
        self.pose.advance(units::steps_to_distance(traveled));
    }
}

#[cfg(test)]
mod tests {
    use embedded_hal_mock::eh1::delay::NoopDelay;

    use super::*;
    use crate::utils::controllers::{DistanceSensors, WheelCounters};

    /// Static chassis: commands are accepted, nothing moves.
    #[derive(Default)]
    struct ParkedMotor;

    impl MotorDriver for ParkedMotor {
        fn forward(&mut self, _left: u16, _right: u16) {}
        fn backward(&mut self, _left: u16, _right: u16) {}
        fn spin_left(&mut self, _left: u16, _right: u16) {}
        fn spin_right(&mut self, _left: u16, _right: u16) {}
        fn stop(&mut self) {}
    }

    struct ScriptedAdc {
        raw: (u16, u16, u16),
    }

    impl RangeSensors for ScriptedAdc {
        fn read_raw(&mut self) -> (u16, u16, u16) {
            self.raw
        }
    }

    #[derive(Default)]
    struct NullLights;

    impl Indicators for NullLights {
        fn front(&mut self, _on: bool) {}
        fn back(&mut self, _on: bool) {}
    }

    /// Raw sample whose power-law conversion reports roughly `mm` on the
    /// named output side. The side channels are wired crosswise, so a
    /// reading destined for the left output is planted on the right
    /// channel and vice versa.
    fn raw_for(mm: f64, coefficient: f64, exponent: f64) -> u16 {
        libm::pow(mm / coefficient, 1.0 / exponent) as u16
    }

    fn scripted(left_mm: f64, center_mm: f64, right_mm: f64) -> ScriptedAdc {
        ScriptedAdc {
            raw: (
                raw_for(right_mm, 3.0e6, -1.110),
                raw_for(center_mm, 6.0e6, -1.182),
                raw_for(left_mm, 3.0e6, -1.116),
            ),
        }
    }

    fn navigator(
        counters: &WheelCounters,
        adc: ScriptedAdc,
        policy: AvoidancePolicy,
    ) -> Navigator<'_, ParkedMotor, ScriptedAdc, NullLights, NoopDelay> {
        let motion = MotionController::new(
            ParkedMotor,
            DistanceSensors::new(adc),
            NullLights,
            NoopDelay::new(),
            counters.reader(),
        );
        let mut config = NavConfig::default();
        config.policy = policy;
        Navigator::with_config(motion, Pose::new(0, 0, 0), config)
    }

    #[test]
    fn single_open_side_wins() {
        let counters = WheelCounters::new();
        let goal = Point { x: 1000, y: 0 };

        let mut nav = navigator(
            &counters,
            scripted(800.0, 120.0, 120.0),
            AvoidancePolicy::PreferGoalBearing,
        );
        assert_eq!(nav.pick_avoidance_side(goal), Side::Left);

        let mut nav = navigator(
            &counters,
            scripted(120.0, 120.0, 800.0),
            AvoidancePolicy::PreferGoalBearing,
        );
        assert_eq!(nav.pick_avoidance_side(goal), Side::Right);
    }

    #[test]
    fn both_sides_open_turns_toward_goal() {
        let counters = WheelCounters::new();
        let mut nav = navigator(
            &counters,
            scripted(800.0, 120.0, 800.0),
            AvoidancePolicy::PreferGoalBearing,
        );

        // Goal up and to the left: positive bearing, spin left.
        assert_eq!(
            nav.pick_avoidance_side(Point { x: -500, y: 500 }),
            Side::Left
        );
        // Goal down and to the right: negative bearing, spin right.
        assert_eq!(
            nav.pick_avoidance_side(Point { x: 500, y: -500 }),
            Side::Right
        );
    }

    #[test]
    fn boxed_in_follows_the_configured_policy() {
        let counters = WheelCounters::new();

        // Goal to the right, but the left side reads farther.
        let goal = Point { x: 500, y: -500 };

        let mut nav = navigator(
            &counters,
            scripted(250.0, 120.0, 150.0),
            AvoidancePolicy::PreferGoalBearing,
        );
        assert_eq!(nav.pick_avoidance_side(goal), Side::Right);

        let mut nav = navigator(
            &counters,
            scripted(250.0, 120.0, 150.0),
            AvoidancePolicy::PreferLargerClearance,
        );
        assert_eq!(nav.pick_avoidance_side(goal), Side::Left);
    }

    #[test]
    fn aligned_heading_needs_no_spin() {
        let counters = WheelCounters::new();
        let mut nav = navigator(
            &counters,
            scripted(800.0, 800.0, 800.0),
            AvoidancePolicy::PreferGoalBearing,
        );
        // Facing +x already; the wheels never move, so the heading must
        // come through untouched.
        nav.correct_heading(Point { x: 1000, y: 0 });
        assert_eq!(nav.pose().heading, 0);
    }
}
