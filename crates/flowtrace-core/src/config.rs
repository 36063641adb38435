//! Process-wide tracing backend selection.

use crate::backend::{LoggingBackend, TracingBackend};
use crate::error::{FlowError, Result};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// Environment variable read by [`FlowtraceConfig::from_env`]
pub const BACKEND_ENV_VAR: &str = "FLOWTRACE_BACKEND";

static BACKEND: Lazy<RwLock<Option<Arc<dyn TracingBackend>>>> = Lazy::new(|| RwLock::new(None));

/// Which tracing backend to use
#[derive(Clone, Default)]
pub enum BackendChoice {
    /// OpenTelemetry when compiled in, logging otherwise
    #[default]
    Auto,
    /// [`LoggingBackend`]
    Logging,
    /// OpenTelemetry backend (requires the `otel` feature)
    Otel,
    /// A caller-supplied backend
    Custom(Arc<dyn TracingBackend>),
}

impl fmt::Debug for BackendChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendChoice::Auto => f.write_str("Auto"),
            BackendChoice::Logging => f.write_str("Logging"),
            BackendChoice::Otel => f.write_str("Otel"),
            BackendChoice::Custom(backend) => write!(f, "Custom({})", backend.name()),
        }
    }
}

impl FromStr for BackendChoice {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auto" => Ok(BackendChoice::Auto),
            "logging" => Ok(BackendChoice::Logging),
            "otel" => Ok(BackendChoice::Otel),
            other => Err(FlowError::UnknownBackend(other.to_string())),
        }
    }
}

impl From<Arc<dyn TracingBackend>> for BackendChoice {
    fn from(backend: Arc<dyn TracingBackend>) -> Self {
        BackendChoice::Custom(backend)
    }
}

#[cfg(feature = "otel")]
fn otel_backend() -> Result<Arc<dyn TracingBackend>> {
    Ok(Arc::new(crate::backend::OtelBackend::new()))
}

#[cfg(not(feature = "otel"))]
fn otel_backend() -> Result<Arc<dyn TracingBackend>> {
    Err(FlowError::BackendUnavailable("otel".to_string()))
}

fn auto_detect() -> Arc<dyn TracingBackend> {
    otel_backend().unwrap_or_else(|_| Arc::new(LoggingBackend::new()))
}

fn resolve(choice: BackendChoice) -> Result<Arc<dyn TracingBackend>> {
    match choice {
        BackendChoice::Auto => Ok(auto_detect()),
        BackendChoice::Logging => Ok(Arc::new(LoggingBackend::new())),
        BackendChoice::Otel => otel_backend(),
        BackendChoice::Custom(backend) => Ok(backend),
    }
}

/// Set the global tracing backend.
///
/// On error the previous configuration is left untouched.
pub fn configure(choice: impl Into<BackendChoice>) -> Result<()> {
    let backend = resolve(choice.into())?;
    info!(backend = backend.name(), "configured tracing backend");
    *BACKEND.write() = Some(backend);
    Ok(())
}

/// Return the configured backend, auto-detecting on first call
pub fn get_backend() -> Arc<dyn TracingBackend> {
    if let Some(backend) = BACKEND.read().as_ref() {
        return Arc::clone(backend);
    }

    let mut slot = BACKEND.write();
    let backend = slot.get_or_insert_with(|| {
        let backend = auto_detect();
        debug!(backend = backend.name(), "auto-detected tracing backend");
        backend
    });
    Arc::clone(backend)
}

/// Reset to the unconfigured state. Intended for tests.
pub fn reset() {
    *BACKEND.write() = None;
}

/// Environment-driven configuration
#[derive(Debug, Clone, Default)]
pub struct FlowtraceConfig {
    /// Backend to install
    pub backend: BackendChoice,
}

impl FlowtraceConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(backend) = env::var(BACKEND_ENV_VAR) {
            config.backend = backend.trim().to_lowercase().parse()?;
        }

        Ok(config)
    }

    /// Install this configuration globally
    pub fn apply(self) -> Result<()> {
        configure(self.backend)
    }
}
