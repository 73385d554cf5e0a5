//! Error types for loading data and building timelines.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the loader boundary and the orchestrator.
///
/// The interval engine itself never fails: missing reference dates and
/// empty inputs propagate as `None` or empty collections instead.
#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("invalid timestamp {value:?} in {context}")]
    InvalidTimestamp { value: String, context: String },

    #[error("unknown day-zero selector: {0}")]
    UnknownDayZero(String),

    #[error("unknown max-dose scope: {0}")]
    UnknownDoseScope(String),

    #[error("unknown event domain: {0}")]
    UnknownDomain(String),

    #[error("unknown timeline view: {0}")]
    UnknownView(String),

    #[error("dataset not found at {}", .0.display())]
    DatasetNotFound(PathBuf),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("table export failed: {0}")]
    Export(#[from] polars::prelude::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("subject task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Result type for timeline operations.
pub type Result<T> = std::result::Result<T, TimelineError>;
