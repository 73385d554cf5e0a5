//! CLI entry-point for exporting flattened timeline tables.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use tracing::instrument;

use crate::{
    config::Settings,
    data::{csv_source::CsvSource, export},
    timeline::Orchestrator,
};

use super::{ExportFormat, RequestArgs};

/// Args for the `export` command.
#[derive(Debug, Clone, ClapArgs)]
pub struct Args {
    #[command(flatten)]
    pub request: RequestArgs,
    /// Output table format.
    #[arg(long, default_value = "parquet", value_enum)]
    pub format: ExportFormat,
    /// Output path; defaults to OUTPUTS_DIR/<dataset>_timeline.<ext>.
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

    let rows = export::flatten(&report);
    let path = args.out.unwrap_or_else(|| {
        settings.join_output(format!(
            "{}_timeline.{}",
            request.dataset,
            args.format.extension()
        ))
    });
    match args.format {
        ExportFormat::Parquet => export::write_parquet(&rows, &path),
        ExportFormat::Csv => export::write_csv(&rows, &path),
    }
    .with_context(|| format!("export {}", path.display()))
}
