//! Pose record and bearing geometry.

use serde::{Deserialize, Serialize};

use crate::utils::math::units;

/// Degrees in a full revolution.
pub const DEGREES_PER_REV: i32 = 360;

/// A destination on the floor plane, millimeters from the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// Dead-reckoned position and heading: millimeters from the origin, and
/// degrees counterclockwise from the +x axis, always in `[0, 360)` after
/// an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pose {
    pub x: i32,
    pub y: i32,
    pub heading: i32,
}

impl Pose {
    pub fn new(x: i32, y: i32, heading: i32) -> Self {
        Pose {
            x,
            y,
            heading: heading.rem_euclid(DEGREES_PER_REV),
        }
    }

    /// Project a realized travel distance along the current heading.
    pub(crate) fn advance(&mut self, distance_mm: i32) {
        self.x += (distance_mm as f32 * units::cosd(self.heading)) as i32;
        self.y += (distance_mm as f32 * units::sind(self.heading)) as i32;
    }

    /// Fold a realized turn into the heading, renormalizing to `[0, 360)`.
    pub(crate) fn rotate(&mut self, angle: i32) {
        self.heading = (self.heading + angle).rem_euclid(DEGREES_PER_REV);
    }
}

/// Signed turn (degrees) from the pose's heading to the direction of
/// `dest`; positive means turn left.
///
/// The result is a truncated remainder in `(-360, 360)`: a destination
/// dead astern in the third quadrant comes back as -135, not 225.
pub fn calculate_bearing(pose: &Pose, dest: Point) -> i32 {
    let dy = dest.y - pose.y;
    let dx = dest.x - pose.x;

    let mut angle = if dx == 0 {
        // Straight up or down the y axis; skip the division entirely.
        if dy >= 0 {
            90
        } else {
            -90
        }
    } else {
        libm::round(libm::atan2(dy as f64, dx as f64).to_degrees()) as i32
    };

    // Fold quadrants two and three back into range for this sign
    // convention.
    if angle > 0 && dx < 0 && dy < 0 {
        angle += 180;
    } else if angle < 0 && dy > 0 && dx < 0 {
        angle += 180;
    }

    (angle - pose.heading) % DEGREES_PER_REV
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearing_in_each_quadrant() {
        let origin = Pose::new(0, 0, 0);
        assert_eq!(calculate_bearing(&origin, Point { x: 100, y: 100 }), 45);
        assert_eq!(calculate_bearing(&origin, Point { x: -100, y: 100 }), 135);
        assert_eq!(
            calculate_bearing(&origin, Point { x: -100, y: -100 }),
            -135
        );
        assert_eq!(calculate_bearing(&origin, Point { x: 100, y: -100 }), -45);
    }

    #[test]
    fn bearing_on_the_y_axis() {
        let origin = Pose::new(0, 0, 0);
        assert_eq!(calculate_bearing(&origin, Point { x: 0, y: 100 }), 90);
        assert_eq!(calculate_bearing(&origin, Point { x: 0, y: -100 }), -90);
    }

    #[test]
    fn bearing_subtracts_current_heading() {
        let pose = Pose::new(0, 0, 90);
        assert_eq!(calculate_bearing(&pose, Point { x: 0, y: 1000 }), 0);
        assert_eq!(calculate_bearing(&pose, Point { x: 100, y: 100 }), -45);
    }

    #[test]
    fn heading_stays_normalized() {
        let mut pose = Pose::new(0, 0, 350);
        pose.rotate(20);
        assert_eq!(pose.heading, 10);
        pose.rotate(-30);
        assert_eq!(pose.heading, 340);
        pose.rotate(-700);
        assert!((0..360).contains(&pose.heading));
    }

    #[test]
    fn advance_projects_along_heading() {
        let mut pose = Pose::new(0, 0, 90);
        pose.advance(100);
        assert_eq!((pose.x, pose.y), (0, 100));

        let mut pose = Pose::new(10, 20, 0);
        pose.advance(50);
        assert_eq!((pose.x, pose.y), (60, 20));
    }
}
