//! Backend that reports step spans as structured `tracing` events.

use super::{Attributes, SpanOutcome, SpanRecorder, StepSpan, TracingBackend};
use std::time::Instant;
use tracing::{info, info_span, warn, Span};

/// Event target used for all step events
pub const LOG_TARGET: &str = "flowtrace";

/// Emits `step.start` / `step.end` events for each step span
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingBackend;

impl LoggingBackend {
    /// Create a new logging backend
    pub fn new() -> Self {
        Self
    }
}

impl TracingBackend for LoggingBackend {
    fn span(&self, step_name: &str, flow_name: &str, attributes: &Attributes) -> StepSpan {
        let correlation_id = self.correlation_id();
        let attributes = serde_json::to_string(attributes).unwrap_or_default();

        let span = info_span!(
            target: LOG_TARGET,
            "step",
            flow = %flow_name,
            step = %step_name,
            correlation_id = %correlation_id,
        );

        info!(
            target: LOG_TARGET,
            flow = %flow_name,
            step = %step_name,
            correlation_id = %correlation_id,
            attributes = %attributes,
            "step.start"
        );

        StepSpan::new(LoggedStep {
            span,
            flow: flow_name.to_string(),
            step: step_name.to_string(),
            correlation_id,
            attributes,
            started: Instant::now(),
        })
    }

    fn name(&self) -> &'static str {
        "logging"
    }
}

struct LoggedStep {
    span: Span,
    flow: String,
    step: String,
    correlation_id: String,
    attributes: String,
    started: Instant,
}

impl SpanRecorder for LoggedStep {
    fn tracing_span(&self) -> Span {
        self.span.clone()
    }

    fn close(self: Box<Self>, outcome: SpanOutcome) {
        let duration_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let status = outcome.status();

        match outcome {
            SpanOutcome::Failed(error) => warn!(
                target: LOG_TARGET,
                flow = %self.flow,
                step = %self.step,
                correlation_id = %self.correlation_id,
                attributes = %self.attributes,
                duration_ms,
                status,
                error = %error,
                "step.end"
            ),
            _ => info!(
                target: LOG_TARGET,
                flow = %self.flow,
                step = %self.step,
                correlation_id = %self.correlation_id,
                attributes = %self.attributes,
                duration_ms,
                status,
                "step.end"
            ),
        }
    }
}
