//! Dead-reckoned navigation for the Diff-Drive Bot.
//!
//! - `odometry`: the pose record and bearing geometry
//! - `navigator`: the maneuver primitives and the seek/avoid loop
//!
//! The navigator owns the pose exclusively; every maneuver primitive
//! updates it in place from the wheel travel actually realized, never from
//! the commanded amount.

pub mod navigator;
pub mod odometry;

pub use navigator::{AvoidancePolicy, NavConfig, Navigator};
pub use odometry::{calculate_bearing, Point, Pose};
