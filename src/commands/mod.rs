//! Command implementations
//!
//! Each module corresponds to a subcommand in the CLI.

pub mod quality;
pub mod report;
pub mod run;

// Re-export commonly used types
pub use quality::{render_quality, run as quality_run};
pub use report::{print_report, render_report, run as report_run};
pub use run::{execute, run as pipeline_run, RunConfig};
