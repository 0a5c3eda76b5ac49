//! Navigation and precision motion control core for the Diff-Drive Bot on
//! no-std embedded platforms.
//!
//! For a runnable host simulation, see the `ddb-app/mock-rig` crate.
#![no_std]

pub mod utils;
