//! Monitoring glue for flowtrace: subscriber setup with flow-aware
//! formatting, plus HTTP request middleware.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub mod logging;

#[cfg(feature = "axum")]
pub mod middleware;

pub use logging::{init_logging, init_test_tracing, FlowIdFormat, JsonFlowIdFormat, LogExt};

/// Output format for the stdout log layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line human-readable output
    #[default]
    Pretty,
    /// Single-line human-readable output
    Compact,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => bail!("Unknown log format: '{}'", other),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogFormat::Pretty => "pretty",
            LogFormat::Compact => "compact",
            LogFormat::Json => "json",
        })
    }
}

/// Configuration for initializing logging
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Service name recorded at startup
    pub service_name: String,
    /// Log level filter (e.g., "info,flowtrace=debug"); `RUST_LOG` wins when set
    pub log_filter: String,
    /// Stdout format
    pub log_format: LogFormat,
    /// Optional log file, rotated daily and written as JSON
    pub log_file: Option<PathBuf>,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            service_name: "flowtrace".to_string(),
            log_filter: "info".to_string(),
            log_format: LogFormat::Pretty,
            log_file: None,
        }
    }
}

impl MonitoringConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(service_name) = env::var("FLOWTRACE_SERVICE_NAME") {
            config.service_name = service_name;
        }

        if let Ok(log_filter) = env::var("FLOWTRACE_LOG") {
            config.log_filter = log_filter;
        }

        if let Ok(log_format) = env::var("FLOWTRACE_LOG_FORMAT") {
            config.log_format = log_format.parse()?;
        }

        if let Ok(log_file) = env::var("FLOWTRACE_LOG_FILE") {
            if !log_file.is_empty() {
                config.log_file = Some(PathBuf::from(log_file));
            }
        }

        Ok(config)
    }
}
