//! Flowtrace - follow logically related work through threads, tasks and
//! queues with a single correlation ID.
//!
//! Re-exports the core API and wires up logging and backend selection in
//! one call.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub use flowtrace_core::*;

/// Logging setup and request glue
pub mod monitoring {
    pub use flowtrace_monitoring::*;
}

use anyhow::Context;
use flowtrace_monitoring::MonitoringConfig;
use tracing::info;

/// Initialize logging and the tracing backend from the environment.
///
/// Reads `FLOWTRACE_LOG`, `FLOWTRACE_LOG_FORMAT`, `FLOWTRACE_LOG_FILE`,
/// `FLOWTRACE_SERVICE_NAME` and `FLOWTRACE_BACKEND`.
pub fn init() -> anyhow::Result<()> {
    let monitoring = MonitoringConfig::from_env()?;
    init_with(&monitoring, FlowtraceConfig::from_env()?)
}

/// Initialize logging and the tracing backend from explicit configuration
pub fn init_with(monitoring: &MonitoringConfig, config: FlowtraceConfig) -> anyhow::Result<()> {
    flowtrace_monitoring::init_logging(monitoring)?;
    config.apply().context("Failed to configure tracing backend")?;

    info!(backend = get_backend().name(), "flowtrace initialized");
    Ok(())
}
