//! OpenTelemetry backend. Spans go to whatever tracer provider the
//! application installed globally.
//!
//! A step span is the active OTel context while its logic runs, so steps
//! called from inside another step become its children.

use super::{ActiveSpan, Attributes, SpanOutcome, SpanRecorder, StepSpan, TracingBackend};
use opentelemetry::global::{self, BoxedTracer};
use opentelemetry::trace::{Status, TraceContextExt, Tracer};
use opentelemetry::{Context, KeyValue};
use serde_json::Value;

/// Default instrumentation scope name
pub const TRACER_NAME: &str = "flowtrace";

/// Emits one OpenTelemetry span per step
pub struct OtelBackend {
    tracer: BoxedTracer,
}

impl OtelBackend {
    /// Create a backend using the global tracer provider
    pub fn new() -> Self {
        Self::with_tracer_name(TRACER_NAME)
    }

    /// Create a backend with a custom instrumentation scope name
    pub fn with_tracer_name(name: &'static str) -> Self {
        Self::with_tracer(global::tracer(name))
    }

    /// Create a backend that sends spans to `tracer`, bypassing the global
    /// provider
    pub fn with_tracer(tracer: BoxedTracer) -> Self {
        Self { tracer }
    }
}

impl Default for OtelBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for OtelBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OtelBackend").finish_non_exhaustive()
    }
}

fn to_otel_value(value: &Value) -> opentelemetry::Value {
    match value {
        Value::String(s) => s.clone().into(),
        Value::Bool(b) => (*b).into(),
        Value::Number(n) => match n.as_i64() {
            Some(i) => i.into(),
            None => n.as_f64().unwrap_or_default().into(),
        },
        other => other.to_string().into(),
    }
}

impl TracingBackend for OtelBackend {
    fn span(&self, step_name: &str, flow_name: &str, attributes: &Attributes) -> StepSpan {
        let mut kvs = vec![
            KeyValue::new("flowtrace.flow", flow_name.to_string()),
            KeyValue::new("flowtrace.correlation_id", self.correlation_id()),
        ];
        kvs.extend(
            attributes
                .iter()
                .map(|(key, value)| KeyValue::new(key.clone(), to_otel_value(value))),
        );

        let parent = Context::current();
        let span = self
            .tracer
            .span_builder(step_name.to_string())
            .with_attributes(kvs)
            .start_with_context(&self.tracer, &parent);

        StepSpan::new(OtelStep {
            cx: parent.with_span(span),
        })
    }

    fn name(&self) -> &'static str {
        "otel"
    }
}

struct OtelStep {
    // Parent context with the step span installed
    cx: Context,
}

impl SpanRecorder for OtelStep {
    fn activate(&self) -> Option<ActiveSpan> {
        Some(ActiveSpan::new(self.cx.clone().attach()))
    }

    fn close(self: Box<Self>, outcome: SpanOutcome) {
        let span = self.cx.span();
        span.set_attribute(KeyValue::new("flowtrace.status", outcome.status()));
        match outcome {
            SpanOutcome::Completed => span.set_status(Status::Ok),
            SpanOutcome::Failed(error) => span.set_status(Status::error(error)),
            SpanOutcome::Abandoned => span.set_status(Status::error("abandoned")),
        }
        span.end();
    }
}
