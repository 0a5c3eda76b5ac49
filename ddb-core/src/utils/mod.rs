//! Utility re-exports for the Diff-Drive Bot core.
//!
//! This module groups the building blocks of the navigation stack:
//!
//! - `controllers`: hardware trait seams, tachometer, distance sensing, and
//!   the precision movement controller
//! - `math`: chassis unit conversions
//! - `nav`: dead-reckoned pose tracking and the seek/avoid navigation loop

pub mod controllers;
pub mod math;
pub mod nav;

pub use controllers::motion::MotionController;
pub use nav::Navigator;
