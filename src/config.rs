//! Runtime configuration utilities for subject-timeline.

use std::{
    env,
    path::{Path, PathBuf},
};

use anyhow::Context;
use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::{
    data::csv_source::parse_timestamp,
    timeline::{DayZero, MaxDoseScope},
};

/// Application configuration resolved from `.env` and defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Root folder holding one sub-directory per dataset.
    pub data_dir: PathBuf,
    /// Root folder for exported timeline tables.
    pub outputs_dir: PathBuf,
    /// Reference date anchoring day zero.
    pub day_zero: DayZero,
    /// Population the reference maximum dose is taken over.
    pub max_dose_scope: MaxDoseScope,
    /// Dataset cutoff; derived from the data when unset.
    pub cutoff: Option<NaiveDateTime>,
    /// Subjects processed concurrently.
    pub concurrency: usize,
}

impl Settings {
    /// Load configuration from environment with reasonable defaults.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let data_dir = env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));
        let outputs_dir = env::var("OUTPUTS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./outputs"));
        let day_zero = match env::var("DAY_ZERO") {
            Ok(value) => value.parse().context("parsing DAY_ZERO")?,
            Err(_) => DayZero::default(),
        };
        let max_dose_scope = match env::var("MAX_DOSE_SCOPE") {
            Ok(value) => value.parse().context("parsing MAX_DOSE_SCOPE")?,
            Err(_) => MaxDoseScope::default(),
        };
        let cutoff = match env::var("DATA_CUTOFF") {
            Ok(value) => parse_timestamp(&value, "DATA_CUTOFF")?,
            Err(_) => None,
        };
        let concurrency = env::var("TIMELINE_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(4);

        Ok(Self {
            data_dir,
            outputs_dir,
            day_zero,
            max_dose_scope,
            cutoff,
            concurrency,
        })
    }

    /// Convenience helper for derived output path segments.
    pub fn join_output<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.outputs_dir.join(path)
    }
}
