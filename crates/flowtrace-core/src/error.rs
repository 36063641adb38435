use std::fmt;
use thiserror::Error;

/// Core error type for flowtrace
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    /// Flow was never registered
    #[error("Flow '{0}' not found")]
    FlowNotFound(String),

    /// Metadata key absent from the flow context
    #[error("Metadata key '{0}' not found in flow context")]
    MetadataKeyNotFound(String),

    /// Step re-registered with different metadata
    #[error("Conflicting registration for step '{step}' in flow '{flow}'")]
    ConflictingRegistration {
        /// Flow the step belongs to
        flow: String,
        /// Step that was redeclared
        step: String,
    },

    /// One or more `after` references do not resolve within the flow
    #[error("{}", InvalidReferencesFormat { flow, violations })]
    InvalidReferences {
        /// Flow that failed validation
        flow: String,
        /// Every offending reference, one message each
        violations: Vec<String>,
    },

    /// Step invoked without an active flow context
    #[error("Step '{step}' called outside of a flow context; run an entrypoint first")]
    NoActiveContext {
        /// Step that was invoked
        step: String,
    },

    /// Requested DAG format is not supported
    #[error("Unsupported format: '{0}'")]
    UnsupportedFormat(String),

    /// Backend name not recognised
    #[error("Unknown backend: '{0}'")]
    UnknownBackend(String),

    /// Backend recognised but not compiled into this build
    #[error("Backend '{0}' is not available in this build")]
    BackendUnavailable(String),

    /// Input/output error
    #[error("Input/output error: {0}")]
    Io(String),
}

// Helper struct to format validation violations
struct InvalidReferencesFormat<'a> {
    flow: &'a str,
    violations: &'a [String],
}

impl fmt::Display for InvalidReferencesFormat<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Flow '{}' has invalid references:", self.flow)?;
        for violation in self.violations {
            write!(f, "\n  - {}", violation)?;
        }
        Ok(())
    }
}

impl FlowError {
    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            FlowError::FlowNotFound(_) => "ERR_FLOW_NOT_FOUND",
            FlowError::MetadataKeyNotFound(_) => "ERR_METADATA_KEY_NOT_FOUND",
            FlowError::ConflictingRegistration { .. } => "ERR_STEP_CONFLICT",
            FlowError::InvalidReferences { .. } => "ERR_FLOW_INVALID_REFERENCES",
            FlowError::NoActiveContext { .. } => "ERR_NO_ACTIVE_CONTEXT",
            FlowError::UnsupportedFormat(_) => "ERR_UNSUPPORTED_FORMAT",
            FlowError::UnknownBackend(_) => "ERR_UNKNOWN_BACKEND",
            FlowError::BackendUnavailable(_) => "ERR_BACKEND_UNAVAILABLE",
            FlowError::Io(_) => "ERR_IO",
        }
    }

    /// True for the not-found family (unknown flow, unknown metadata key)
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            FlowError::FlowNotFound(_) | FlowError::MetadataKeyNotFound(_)
        )
    }
}

impl From<std::io::Error> for FlowError {
    fn from(err: std::io::Error) -> Self {
        FlowError::Io(err.to_string())
    }
}

/// Result alias used throughout flowtrace
pub type Result<T> = std::result::Result<T, FlowError>;
