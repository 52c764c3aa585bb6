//! Pipeline configuration
//!
//! Loads configuration from config.yml file. Values written as `${VAR}` are
//! read from the environment, and the `ABXPLORE_*` variables override the file.
//! A `.env` file is loaded first when present.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::aggregate::Segment;
use crate::error::{Error, Result};
use crate::model::{ProcessingContext, DATE_FORMAT};

/// Default constants (fallback if config.yml not found)
pub const CONFIG_FILE: &str = "config.yml";
pub const DEFAULT_DATA_DIR: &str = "raw_data";
pub const DEFAULT_OUTPUT_DIR: &str = "output";

pub const ENV_DATA_DIR: &str = "ABXPLORE_DATA_DIR";
pub const ENV_OUTPUT_DIR: &str = "ABXPLORE_OUTPUT_DIR";
pub const ENV_PROCESSING_DATE: &str = "ABXPLORE_PROCESSING_DATE";
pub const ENV_SEGMENT: &str = "ABXPLORE_SEGMENT";
pub const ENV_METRICS_ADDR: &str = "ABXPLORE_METRICS_ADDR";

/// YAML config structures
#[derive(Debug, Default, Deserialize)]
struct YamlConfig {
    pipeline: Option<PipelineConfig>,
    metrics: Option<MetricsConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct PipelineConfig {
    data_dir: Option<String>,
    output_dir: Option<String>,
    #[serde(default, deserialize_with = "deserialize_string_or_date")]
    processing_date: Option<String>,
    segment: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MetricsConfig {
    addr: Option<String>,
}

/// YAML parses an unquoted `2024-12-31` as a string already; numbers are
/// rejected here so a typo like `20241231` surfaces as a config error later.
fn deserialize_string_or_date<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let value: Option<serde_yaml::Value> = Option::deserialize(deserializer)?;
    match value {
        None | Some(serde_yaml::Value::Null) => Ok(None),
        Some(serde_yaml::Value::String(s)) => Ok(Some(s)),
        Some(serde_yaml::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected a date string, got {:?}",
            other
        ))),
    }
}

/// Main configuration struct
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Fixed processing date; today (UTC) when unset.
    pub processing_date: Option<NaiveDate>,
    pub segment: Option<Segment>,
    pub metrics_addr: Option<SocketAddr>,
}

impl Config {
    /// Load configuration from config.yml, falling back to defaults when no
    /// file exists. A file that exists but does not parse is an error.
    pub fn load() -> Result<Self> {
        for candidate in [CONFIG_FILE, "../config.yml"] {
            if Path::new(candidate).exists() {
                return Self::load_from_file(candidate);
            }
        }
        Self::defaults()
    }

    /// Resolve a value: prefer env var if config value looks like ${VAR},
    /// then an explicit env override, then the literal value.
    fn resolve_env_string(value: Option<String>, env_key: &str) -> Option<String> {
        let mut resolved = value;
        if let Some(v) = resolved.as_deref() {
            if v.starts_with("${") && v.ends_with('}') {
                let var_name = &v[2..v.len() - 1];
                resolved = std::env::var(var_name).ok();
            }
        }
        if let Ok(env_val) = std::env::var(env_key) {
            return Some(env_val);
        }
        resolved.filter(|v| !v.trim().is_empty())
    }

    /// Load .env file into environment variables using dotenvy
    fn load_dotenv() {
        if dotenvy::dotenv().is_err() {
            let _ = dotenvy::from_filename("../.env");
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_dotenv();

        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let yaml: YamlConfig = serde_yaml::from_str(&content)?;
        Self::from_yaml(yaml)
    }

    /// Defaults with environment overrides applied.
    pub fn defaults() -> Result<Self> {
        Self::load_dotenv();
        Self::from_yaml(YamlConfig::default())
    }

    fn from_yaml(yaml: YamlConfig) -> Result<Self> {
        let pipeline = yaml.pipeline.unwrap_or_default();
        let metrics = yaml.metrics.unwrap_or_default();

        let data_dir = Self::resolve_env_string(pipeline.data_dir, ENV_DATA_DIR)
            .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());
        let output_dir = Self::resolve_env_string(pipeline.output_dir, ENV_OUTPUT_DIR)
            .unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string());

        let processing_date =
            Self::resolve_env_string(pipeline.processing_date, ENV_PROCESSING_DATE)
                .map(|v| parse_processing_date(&v))
                .transpose()?;

        let segment = Self::resolve_env_string(pipeline.segment, ENV_SEGMENT)
            .map(|v| parse_segment(&v))
            .transpose()?;

        let metrics_addr = Self::resolve_env_string(metrics.addr, ENV_METRICS_ADDR)
            .map(|v| {
                v.parse::<SocketAddr>().map_err(|e| {
                    Error::ConfigError(format!("Invalid metrics address '{}': {}", v, e))
                })
            })
            .transpose()?;

        Ok(Self {
            data_dir: PathBuf::from(data_dir),
            output_dir: PathBuf::from(output_dir),
            processing_date,
            segment,
            metrics_addr,
        })
    }

    /// Processing context for a run. An explicit date wins over the configured
    /// one; with neither, today's UTC date is used.
    pub fn processing_context(&self, explicit: Option<NaiveDate>) -> ProcessingContext {
        let date = explicit
            .or(self.processing_date)
            .unwrap_or_else(|| Utc::now().date_naive());
        ProcessingContext::new(date)
    }
}

/// Parse a `YYYY-MM-DD` processing date.
pub fn parse_processing_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|e| {
        Error::ConfigError(format!("Invalid processing date '{}': {}", value, e))
    })
}

/// Parse a segment dimension name.
pub fn parse_segment(value: &str) -> Result<Segment> {
    Segment::parse(value).ok_or_else(|| {
        Error::ConfigError(format!(
            "Unknown segment '{}' (expected industry, region, company_size or source_channel)",
            value
        ))
    })
}
