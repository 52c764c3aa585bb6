//! Run the full pipeline and write every output table

use std::path::PathBuf;

use chrono::NaiveDate;
use tracing::info;

use crate::aggregate::Segment;
use crate::error::{Error, Result};
use crate::io::{read_raw_tables, write_outputs};
use crate::model::ProcessingContext;
use crate::pipeline::{self, PipelineOutput};

/// Resolved settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub processing_date: NaiveDate,
    pub segment: Option<Segment>,
    /// Skip writing output files.
    pub dry_run: bool,
}

/// Load, process and (unless `dry_run`) write. Blocking.
pub fn execute(config: &RunConfig) -> Result<PipelineOutput> {
    let raw = read_raw_tables(&config.data_dir)?;
    let ctx = ProcessingContext::new(config.processing_date);
    let output = pipeline::run(&raw, &ctx, config.segment);

    if !config.dry_run {
        let written = write_outputs(&config.output_dir, &output)?;
        for path in &written {
            info!(path = %path.display(), "Wrote output");
        }
    }
    Ok(output)
}

/// Run the pipeline on the blocking pool and print a short summary.
pub async fn run(config: RunConfig) -> Result<PipelineOutput> {
    let output = tokio::task::spawn_blocking(move || {
        let output = execute(&config)?;
        if !config.dry_run {
            println!("📁 Outputs written to {}", config.output_dir.display());
        }
        Ok::<_, Error>(output)
    })
    .await
    .map_err(|e| Error::Unknown(format!("Pipeline task failed: {}", e)))??;

    let significant = output
        .comparisons
        .iter()
        .filter(|c| c.verdict.is_significant())
        .count();
    println!(
        "✅ {} canonical leads, {} comparisons, {} significant at 5%",
        output.lead_metrics.len(),
        output.comparisons.len(),
        significant
    );
    Ok(output)
}
