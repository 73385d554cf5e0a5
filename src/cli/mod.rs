//! Command-line interface wiring for subject-timeline.

use anyhow::Result;
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};

use crate::{
    config::Settings,
    data::{csv_source::parse_timestamp, EntityFilter, PopulationFilter},
    timeline::{DayZero, MaxDoseScope, TimelineRequest, ViewKind},
};

pub mod export;
pub mod timeline;

/// Top-level CLI definition.
#[derive(Debug, Parser)]
#[command(author, version, about = "Per-subject clinical event timelines", long_about = None)]
pub struct Cli {
    /// Default log level when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Parse CLI arguments from the environment.
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Dispatch the selected sub-command.
    pub async fn dispatch(self, settings: Settings) -> Result<()> {
        match self.command {
            Commands::Timeline(args) => timeline::run(args, settings).await,
            Commands::Export(args) => export::run(args, settings).await,
        }
    }
}

/// Supported sub-commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Build timelines for a dataset and print them as JSON.
    Timeline(timeline::Args),
    /// Flatten timelines into a parquet or CSV table.
    Export(export::Args),
}

/// Table format for `export`.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ExportFormat {
    Parquet,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Parquet => "parquet",
            Self::Csv => "csv",
        }
    }
}

/// Dataset, filters and anchoring shared by every command.
#[derive(Debug, Clone, ClapArgs)]
pub struct RequestArgs {
    /// Dataset directory name under DATA_DIR.
    #[arg(long)]
    pub dataset: String,
    /// Views to build; all when omitted.
    #[arg(long, value_delimiter = ',')]
    pub views: Vec<ViewKind>,
    /// Restrict to these subject ids.
    #[arg(long, value_delimiter = ',')]
    pub subjects: Vec<String>,
    /// Restrict to these drugs, terms, classes or measurement names.
    #[arg(long, value_delimiter = ',')]
    pub entities: Vec<String>,
    /// Day-zero selector: first-dose, randomization or first-dose:<drug>.
    #[arg(long)]
    pub day_zero: Option<DayZero>,
    /// Scope of the reference maximum dose: per-study or per-subject.
    #[arg(long)]
    pub max_dose_scope: Option<MaxDoseScope>,
    /// Dataset cutoff date (YYYY-MM-DD).
    #[arg(long)]
    pub cutoff: Option<String>,
}

impl RequestArgs {
    /// Merge flags over configured defaults.
    pub fn to_request(&self, settings: &Settings) -> Result<TimelineRequest> {
        let cutoff = match &self.cutoff {
            Some(value) => parse_timestamp(value, "--cutoff")?,
            None => settings.cutoff,
        };
        let mut request = TimelineRequest::new(self.dataset.clone());
        if !self.views.is_empty() {
            request.views = self.views.clone();
        }
        request.population_filter = PopulationFilter::only(&self.subjects);
        request.entity_filter = EntityFilter::only(&self.entities);
        request.day_zero = self
            .day_zero
            .clone()
            .unwrap_or_else(|| settings.day_zero.clone());
        request.max_dose_scope = self.max_dose_scope.unwrap_or(settings.max_dose_scope);
        request.cutoff = cutoff;
        Ok(request)
    }
}
