//! Structured logging module using tracing.
//!
//! Text output is prefixed with the active flow's correlation ID, and JSON
//! output carries it as a top-level `flow_id` field, so log lines from one
//! flow instance can be grepped together.

use anyhow::Context;
use flowtrace_core::current_correlation_id;
use std::fmt;
use std::path::Path;
use tracing::{info, Event, Subscriber};
use tracing_subscriber::fmt::format::{self, FormatEvent, FormatFields};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry::{LookupSpan, Registry};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as tfmt, layer::Layered, EnvFilter};

use crate::{LogFormat, MonitoringConfig};

type Filtered = Layered<EnvFilter, Registry>;
type BoxedLayer = Box<dyn Layer<Filtered> + Send + Sync>;

/// Event formatter that prefixes `flow_id=<id> ` while a flow is active
#[derive(Debug, Clone, Default)]
pub struct FlowIdFormat<F> {
    inner: F,
}

impl<F> FlowIdFormat<F> {
    /// Wrap an existing event formatter
    pub fn new(inner: F) -> Self {
        Self { inner }
    }
}

impl<S, N, F> FormatEvent<S, N> for FlowIdFormat<F>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
    F: FormatEvent<S, N>,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        if let Some(flow_id) = current_correlation_id() {
            write!(writer, "flow_id={} ", flow_id)?;
        }
        self.inner.format_event(ctx, writer, event)
    }
}

/// JSON event formatter that adds a top-level `flow_id` field while a flow
/// is active
#[derive(Debug, Clone, Default)]
pub struct JsonFlowIdFormat<F> {
    inner: F,
}

impl<F> JsonFlowIdFormat<F> {
    /// Wrap a JSON event formatter
    pub fn new(inner: F) -> Self {
        Self { inner }
    }
}

impl<S, N, F> FormatEvent<S, N> for JsonFlowIdFormat<F>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
    F: FormatEvent<S, N>,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let flow_id = match current_correlation_id() {
            Some(flow_id) => flow_id,
            None => return self.inner.format_event(ctx, writer, event),
        };

        let mut line = String::new();
        self.inner
            .format_event(ctx, format::Writer::new(&mut line), event)?;

        match line.strip_prefix('{') {
            Some(rest) => {
                let flow_id = serde_json::to_string(&flow_id).map_err(|_| fmt::Error)?;
                write!(writer, "{{\"flow_id\":{},{}", flow_id, rest)
            }
            None => writer.write_str(&line),
        }
    }
}

fn stdout_layer(log_format: LogFormat) -> BoxedLayer {
    match log_format {
        // JSON logs for production
        LogFormat::Json => tfmt::layer()
            .json()
            .with_current_span(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .map_event_format(JsonFlowIdFormat::new)
            .boxed(),
        LogFormat::Compact => tfmt::layer()
            .compact()
            .with_target(true)
            .map_event_format(FlowIdFormat::new)
            .boxed(),
        // Pretty logs for development
        LogFormat::Pretty => tfmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(true)
            .map_event_format(FlowIdFormat::new)
            .boxed(),
    }
}

fn file_layer(log_file: &Path) -> anyhow::Result<BoxedLayer> {
    let directory = log_file
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let prefix = log_file
        .file_name()
        .with_context(|| format!("Log file path has no file name: {}", log_file.display()))?;

    let file_appender = tracing_appender::rolling::daily(directory, prefix);

    Ok(tfmt::layer()
        .json()
        .with_current_span(true)
        .with_ansi(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(file_appender)
        .map_event_format(JsonFlowIdFormat::new)
        .boxed())
}

/// Initialize structured logging
pub fn init_logging(config: &MonitoringConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .with_context(|| format!("Invalid log filter: {}", config.log_filter))?;

    let mut layers: Vec<BoxedLayer> = vec![stdout_layer(config.log_format)];

    // Add file logging if configured
    if let Some(log_file) = &config.log_file {
        layers.push(file_layer(log_file)?);
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()
        .context("Failed to set global default subscriber")?;

    info!(
        service_name = %config.service_name,
        log_format = %config.log_format,
        log_file = ?config.log_file,
        "Logging initialized"
    );

    Ok(())
}

/// Trait to add log context to results
pub trait LogExt<T, E> {
    /// Log error with additional context before returning
    fn log_err(self, message: &str) -> Result<T, E>;

    /// Log success with additional context before returning
    fn log_ok(self, message: &str) -> Result<T, E>;
}

impl<T, E: fmt::Display> LogExt<T, E> for Result<T, E> {
    fn log_err(self, message: &str) -> Result<T, E> {
        if let Err(ref e) = self {
            match current_correlation_id() {
                Some(flow_id) => tracing::error!(flow_id = %flow_id, "{}: {}", message, e),
                None => tracing::error!("{}: {}", message, e),
            }
        }
        self
    }

    fn log_ok(self, message: &str) -> Result<T, E> {
        if self.is_ok() {
            tracing::info!("{}", message);
        }
        self
    }
}

/// Initializes tracing for tests. Safe to call more than once.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_target(false)
        .with_test_writer()
        .map_event_format(FlowIdFormat::new)
        .try_init();
}
