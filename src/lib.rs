//! ABXplore: CRM lead-onboarding A/B pipeline
//!
//! This library provides tools to:
//! - Clean the four raw CRM tables (leads, contact events, funnel stages, outcomes)
//!   and flag every data quality issue found
//! - Collapse duplicate leads to one canonical record per contact email
//! - Sequence each lead's funnel stages chronologically
//! - Build a per-lead metric table and group it by experiment arm and segment
//! - Test treatment against control for conversion, time to close,
//!   responsiveness and revenue per lead

pub mod aggregate;
pub mod cleaning;
pub mod config;
pub mod dedup;
pub mod error;
pub mod funnel;
pub mod io;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod stats;

// Re-export common types
pub use aggregate::{LeadMetrics, Metric, Segment};
pub use config::Config;
pub use error::{Error, Result};
pub use model::{Arm, Cleaned, DropReason, ProcessingContext};
pub use pipeline::{PipelineOutput, RawTables, ResultsDocument};
pub use stats::{MetricComparison, Verdict};

// Commands module uses re-exported types, so it must be declared after the re-exports
pub mod commands;
