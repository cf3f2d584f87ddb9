//! Runtime layer for the PSP tracker.
//!
//! Loads workbooks under a time budget and holds the interactive selection
//! state that front ends drive.

pub mod loader;
pub mod session;

pub use tracker_core as core;
pub use tracker_data as data;
