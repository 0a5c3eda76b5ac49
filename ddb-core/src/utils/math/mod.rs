//! Math utilities for the Diff-Drive Bot.
//!
//! This module provides the chassis unit conversions shared by the motion
//! controller and the navigator.

pub mod units;
