//! Shared domain types for the PSP tracker.
//!
//! Canonical records, selections and share bases, the heuristic schema
//! resolver, cell normalizers, CLI settings and text formatting helpers.

pub mod error;
pub mod formatting;
pub mod models;
pub mod normalize;
pub mod schema;
pub mod settings;
