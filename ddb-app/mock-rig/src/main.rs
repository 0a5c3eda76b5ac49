//! Host simulation rig for the Diff-Drive Bot navigation core.
//!
//! Wires the real control loops to the software chassis in [`sim`] and
//! exposes one subcommand per scenario: the full navigate/avoid mission,
//! open-loop tests of each movement primitive, and the object-follow
//! behavior. Pose telemetry is emitted as JSON lines on stdout; set
//! `RUST_LOG` for controller logs.

mod sim;

use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use ddb_core::utils::controllers::{
    DistanceSensors, LedIndicators, MotionController, MotionResult, Side,
};
use ddb_core::utils::math::units;
use ddb_core::utils::nav::{AvoidancePolicy, NavConfig, Navigator, Point, Pose};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use sim::{ConsoleLedDriver, Obstacle, Rig};

#[derive(Parser)]
#[clap(version = "1.0", about = "Host simulation rig for the Diff-Drive Bot core")]
struct Opts {
    #[clap(subcommand)]
    scenario: Scenario,
}

#[derive(Subcommand)]
enum Scenario {
    /// Seek a destination, detouring around anything the sensors flag.
    Navigate {
        /// Destination x (mm).
        #[clap(long, default_value_t = 0)]
        x: i32,
        /// Destination y (mm).
        #[clap(long, default_value_t = 1820)]
        y: i32,
        /// JSON course file with start pose, destination, and obstacles.
        #[clap(long)]
        course: Option<PathBuf>,
        /// Tie-break when neither side reads open.
        #[clap(long, value_enum, default_value_t = Policy::Goal)]
        policy: Policy,
        /// Give up after this many seek cycles.
        #[clap(long, default_value_t = 50)]
        max_cycles: u32,
    },
    /// Open-loop test of the forward PI controller.
    Forward {
        /// Per-wheel target speed (0.1 RPM).
        #[clap(long, default_value_t = 650)]
        rpm: u16,
        /// Distance to cover (mm).
        #[clap(long, default_value_t = 500)]
        mm: i32,
    },
    /// Open-loop test of the spin balance controller.
    Spin {
        #[clap(long, value_enum, default_value_t = Turn::Left)]
        side: Turn,
        #[clap(long, default_value_t = 90)]
        degrees: i32,
        #[clap(long, default_value_t = 2500)]
        duty: i32,
    },
    /// Drive a full circle.
    Circle {
        #[clap(long, value_enum, default_value_t = Turn::Left)]
        side: Turn,
        /// Midpoint speed (0.1 RPM).
        #[clap(long, default_value_t = 650)]
        speed: u16,
        #[clap(long, default_value_t = 40)]
        radius_cm: u16,
    },
    /// Trace a five-pointed star.
    Star {
        #[clap(long, default_value_t = 650)]
        speed: u16,
        #[clap(long, default_value_t = 20)]
        side_cm: u16,
    },
    /// Track the nearest object in range.
    Follow {
        #[clap(long, default_value_t = 2000)]
        cycles: u32,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Policy {
    Goal,
    Clearance,
}

impl From<Policy> for AvoidancePolicy {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::Goal => AvoidancePolicy::PreferGoalBearing,
            Policy::Clearance => AvoidancePolicy::PreferLargerClearance,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Turn {
    Left,
    Right,
}

impl From<Turn> for Side {
    fn from(turn: Turn) -> Self {
        match turn {
            Turn::Left => Side::Left,
            Turn::Right => Side::Right,
        }
    }
}

/// A navigate course: where the robot starts, where it is going, and what
/// is in the way.
#[derive(Serialize, Deserialize)]
struct Course {
    start: Pose,
    destination: Point,
    #[serde(default)]
    obstacles: Vec<Obstacle>,
}

/// One JSON telemetry line per seek cycle.
#[derive(Serialize)]
struct Telemetry {
    cycle: u32,
    pose: Pose,
    result: MotionResult,
}

/// Settling delay before any scenario starts moving (ms).
const START_DELAY_MS: u32 = 1000;

type RigMotion = MotionController<
    'static,
    sim::SimMotor,
    sim::SimAdc,
    LedIndicators<ConsoleLedDriver>,
    sim::SimDelay,
>;

fn motion_for(rig: Rig) -> (std::rc::Rc<std::cell::RefCell<sim::World>>, RigMotion) {
    let Rig {
        world,
        motor,
        adc,
        delay,
        counters,
    } = rig;
    let motion = MotionController::new(
        motor,
        DistanceSensors::new(adc),
        LedIndicators::new(ConsoleLedDriver),
        delay,
        counters.reader(),
    );
    (world, motion)
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();
    match opts.scenario {
        Scenario::Navigate {
            x,
            y,
            course,
            policy,
            max_cycles,
        } => navigate(x, y, course, policy, max_cycles),
        Scenario::Forward { rpm, mm } => {
            let (world, mut motion) = motion_for(Rig::new(0.0, 0.0, 0.0, Vec::new()));
            motion.wait_ms(START_DELAY_MS);
            let steps = units::distance_to_steps(mm);
            let result = motion.forward_rpm(rpm, rpm, steps, steps, false);
            let (left, right) = motion.steps();
            info!(?result, left, right, "forward test complete");
            report_truth(&world);
            Ok(())
        }
        Scenario::Spin {
            side,
            degrees,
            duty,
        } => {
            let (world, mut motion) = motion_for(Rig::new(0.0, 0.0, 0.0, Vec::new()));
            motion.wait_ms(START_DELAY_MS);
            let result = motion.spin(side.into(), duty, units::angle_to_steps(degrees), false);
            info!(?result, "spin test complete");
            report_truth(&world);
            Ok(())
        }
        Scenario::Circle {
            side,
            speed,
            radius_cm,
        } => {
            let (world, mut motion) = motion_for(Rig::new(0.0, 0.0, 0.0, Vec::new()));
            motion.wait_ms(START_DELAY_MS);
            let result = motion.circle(side.into(), speed, radius_cm);
            info!(?result, "circle complete");
            report_truth(&world);
            Ok(())
        }
        Scenario::Star { speed, side_cm } => {
            let (world, mut motion) = motion_for(Rig::new(0.0, 0.0, 0.0, Vec::new()));
            motion.wait_ms(START_DELAY_MS);
            let result = motion.star(speed, side_cm);
            info!(?result, "star complete");
            report_truth(&world);
            Ok(())
        }
        Scenario::Follow { cycles } => {
            // One target straight ahead, just inside tracking range.
            let target = Obstacle {
                x: 0.0,
                y: 230.0,
                radius: 50.0,
            };
            let (world, mut motion) = motion_for(Rig::new(0.0, 0.0, 90.0, vec![target]));
            motion.wait_ms(START_DELAY_MS);
            motion.follow(cycles);
            report_truth(&world);
            Ok(())
        }
    }
}

fn navigate(
    x: i32,
    y: i32,
    course: Option<PathBuf>,
    policy: Policy,
    max_cycles: u32,
) -> Result<(), Box<dyn Error>> {
    let course = match course {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => Course {
            start: Pose::new(0, 0, 90),
            destination: Point { x, y },
            obstacles: Vec::new(),
        },
    };

    let rig = Rig::new(
        course.start.x as f64,
        course.start.y as f64,
        course.start.heading as f64,
        course.obstacles.clone(),
    );
    let (world, motion) = motion_for(rig);

    let mut config = NavConfig::default();
    config.policy = policy.into();
    let mut nav = Navigator::with_config(motion, course.start, config);

    info!(dest = ?course.destination, "navigate start");
    nav.motion().wait_ms(START_DELAY_MS);

    let mut reached = false;
    for cycle in 0..max_cycles {
        let result = nav.seek(course.destination);
        let line = serde_json::to_string(&Telemetry {
            cycle,
            pose: nav.pose(),
            result,
        })?;
        println!("{line}");
        if result == MotionResult::ReachedTarget {
            reached = true;
            break;
        }
    }

    if !reached {
        warn!("cycle budget exhausted before reaching the destination");
    }
    report_truth(&world);
    Ok(())
}

fn report_truth(world: &std::rc::Rc<std::cell::RefCell<sim::World>>) {
    let (x, y, heading) = world.borrow().true_pose();
    info!(x, y, heading, "simulated ground truth");
}
