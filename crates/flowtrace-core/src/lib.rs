//!
//! Flowtrace Core - flow context propagation and step tracing
//!
//! This crate carries a correlation ID through logically related work,
//! records which steps make up each flow, renders flows as diagrams and
//! emits a span around every step through a pluggable backend.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Error types
pub mod error;

/// Flow context carrier
pub mod context;

/// Current-context slot for threads and tasks
pub mod scope;

/// Step and flow metadata
pub mod types;

/// Flow registry
pub mod registry;

/// DAG rendering
pub mod dag;

/// Tracing backends
pub mod backend;

/// Backend configuration
pub mod config;

/// Step declaration and execution
pub mod step;

/// Correlation header handoff
pub mod handoff;

// Re-export key types
pub use error::{FlowError, Result};
pub use context::{generate_correlation_id, ContextSnapshot, FlowContext, Metadata};
pub use scope::{
    clear_context, current_context, current_correlation_id, enter, get_flow_context_value,
    get_or_create_context, propagate, propagate_forked, scope, scope_async, set_context,
    set_flow_context_value, ContextGuard,
};
pub use types::{FlowInfo, StepInfo};
pub use registry::{registry, FlowRegistry};

// DAG surface
pub use dag::{generate_dag, render_mermaid, write_dag, DagFormat};

// Backends and configuration
pub use backend::{
    ActiveSpan, Attributes, LoggingBackend, SpanOutcome, SpanRecorder, StepSpan, TracingBackend,
};
#[cfg(feature = "otel")]
pub use backend::OtelBackend;
pub use config::{configure, get_backend, BackendChoice, FlowtraceConfig};

// Step declaration
pub use step::{Flow, StepBuilder, StepHandle};
pub use handoff::{
    context_from_headers, inject_headers, outgoing_headers, run_with_headers,
    run_with_headers_async, Headers, CORRELATION_HEADER,
};
