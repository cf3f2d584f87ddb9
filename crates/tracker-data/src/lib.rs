//! Data layer for the PSP tracker.
//!
//! Reads workbooks into raw rows, turns them into canonical records with
//! attached shares, and provides the filtering, grouping, pivoting and
//! cascade logic the front ends call per interaction.

pub mod aggregator;
pub mod analysis;
pub mod cascade;
pub mod ingest;
pub mod reader;
pub mod shares;

pub use tracker_core as core;
