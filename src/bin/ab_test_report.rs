//! A/B test report CLI.
//!
//! Usage:
//!   cargo run --bin ab_test_report -- --results output/results.json --significant-only

use anyhow::Result;
use clap::Parser;
use dotenvy::dotenv;
use std::path::PathBuf;

use abxplore::commands::report;
use abxplore::io::RESULTS_FILE;

#[derive(Parser, Debug)]
#[command(name = "ab_test_report")]
#[command(about = "A/B test report for a finished pipeline run")]
struct Args {
    /// Output directory of the run
    #[arg(long, env = "ABXPLORE_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Explicit path to results.json (overrides --output-dir)
    #[arg(long)]
    results: Option<PathBuf>,

    /// Show only significant comparisons
    #[arg(long, default_value_t = false)]
    significant_only: bool,
}

fn main() -> Result<()> {
    dotenv().ok();

    let args = Args::parse();
    let path = args
        .results
        .unwrap_or_else(|| args.output_dir.join(RESULTS_FILE));

    if let Err(e) = report::run(&path, args.significant_only) {
        eprintln!("No results found at {}. Run `abxplore run` first.", path.display());
        return Err(e.into());
    }
    Ok(())
}
