//! Per-subject clinical event timelines.
//!
//! Sparse dosing, adverse-event, conmed and measurement records are
//! normalized to subject-relative days and folded into contiguous,
//! non-overlapping segments ready for rendering.

pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod logging;
pub mod timeline;

pub use error::{Result, TimelineError};
