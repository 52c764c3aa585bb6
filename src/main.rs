//! ABXplore CLI - main entry point
//!
//! Runs the lead-onboarding A/B pipeline and prints its reports.

use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use abxplore::commands::{self, RunConfig};
use abxplore::config::{parse_processing_date, parse_segment, Config};
use abxplore::io::RESULTS_FILE;
use abxplore::metrics;
use chrono::NaiveDate;
use tracing::warn;

#[derive(Parser)]
#[command(name = "abxplore")]
#[command(about = "CRM lead-onboarding A/B test pipeline", long_about = None)]
#[command(version)]
struct Cli {
    /// Address to expose Prometheus metrics (e.g., 0.0.0.0:9898)
    #[arg(long, env = "METRICS_ADDR")]
    metrics_addr: Option<String>,

    /// Config file (defaults to ./config.yml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Debug)]
struct PipelineArgs {
    /// Directory holding leads.csv, contact_events.csv, funnel_stages.csv, outcomes.csv
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Directory for cleaned tables and results
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Processing date (YYYY-MM-DD); today (UTC) when not set anywhere
    #[arg(long, value_parser = parse_date_arg)]
    processing_date: Option<NaiveDate>,

    /// Segment dimension: industry | region | company_size | source_channel
    #[arg(long)]
    segment: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean, deduplicate, sequence, aggregate, test and write all outputs
    Run {
        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Run everything but write no files
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },

    /// Print the data quality summary without writing files
    Quality {
        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Print the A/B report from a saved results.json
    Report {
        /// Path to results.json (defaults to <output_dir>/results.json)
        #[arg(long)]
        results: Option<PathBuf>,

        /// Show only significant comparisons
        #[arg(long, default_value_t = false)]
        significant_only: bool,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Run { .. } => "run",
            Commands::Quality { .. } => "quality",
            Commands::Report { .. } => "report",
        }
    }
}

fn parse_date_arg(value: &str) -> Result<NaiveDate, String> {
    parse_processing_date(value).map_err(|e| e.to_string())
}

fn resolve_run_config(config: &Config, args: PipelineArgs, dry_run: bool) -> anyhow::Result<RunConfig> {
    let segment = match args.segment.as_deref() {
        Some(value) => Some(parse_segment(value)?),
        None => config.segment,
    };
    let ctx = config.processing_context(args.processing_date);

    Ok(RunConfig {
        data_dir: args.data_dir.unwrap_or_else(|| config.data_dir.clone()),
        output_dir: args.output_dir.unwrap_or_else(|| config.output_dir.clone()),
        processing_date: ctx.processing_date,
        segment,
        dry_run,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env for local development
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("abxplore=info".parse()?))
        .init();

    let cli = Cli::parse();

    let config = match cli.config.as_deref() {
        Some(path) => Config::load_from_file(path)?,
        None => Config::load()?,
    };

    let metrics_addr = match cli.metrics_addr.as_deref() {
        Some(addr) => match addr.parse::<SocketAddr>() {
            Ok(socket) => Some(socket),
            Err(err) => {
                warn!(%addr, "Invalid metrics address: {}", err);
                None
            }
        },
        None => config.metrics_addr,
    };
    if let Some(socket) = metrics_addr {
        metrics::spawn_metrics_server(socket);
    }

    let timer = metrics::CommandTimer::start(cli.command.name());
    let result = execute_command(cli.command, &config).await;
    timer.finish(result.is_ok());

    result
}

async fn execute_command(command: Commands, config: &Config) -> anyhow::Result<()> {
    match command {
        Commands::Run { pipeline, dry_run } => {
            let run_config = resolve_run_config(config, pipeline, dry_run)?;
            commands::pipeline_run(run_config).await?;
        }
        Commands::Quality { pipeline } => {
            let run_config = resolve_run_config(config, pipeline, true)?;
            commands::quality_run(run_config).await?;
        }
        Commands::Report {
            results,
            significant_only,
        } => {
            let path = results.unwrap_or_else(|| config.output_dir.join(RESULTS_FILE));
            commands::report_run(&path, significant_only)?;
        }
    }

    Ok(())
}
