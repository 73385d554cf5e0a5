//! CLI entry-point for building timeline reports.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use tracing::{info, instrument};

use crate::{config::Settings, data::csv_source::CsvSource, timeline::Orchestrator};

use super::RequestArgs;

/// Args for the `timeline` command.
#[derive(Debug, Clone, ClapArgs)]
pub struct Args {
    #[command(flatten)]
    pub request: RequestArgs,
    /// Write the JSON report to this file instead of stdout.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[instrument(skip(settings))]
pub async fn run(args: Args, settings: Settings) -> Result<()> {
    let request = args.request.to_request(&settings)?;
    let orchestrator = Orchestrator::new(CsvSource::new(&settings.data_dir), settings.concurrency);
    let report = orchestrator
        .build(&request)
        .await
        .with_context(|| format!("building timelines for {}", request.dataset))?;
    let json = serde_json::to_string_pretty(&report)?;

    match args.out {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, json).with_context(|| format!("write {}", path.display()))?;
            info!(path = %path.display(), subjects = report.subjects.len(), "wrote timeline report");
        }
        None => println!("{json}"),
    }
    Ok(())
}
