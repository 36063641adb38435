//! Span emission contract and the built-in tracing backends.

use crate::scope;
use serde_json::Value;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

pub mod logging;
#[cfg(feature = "otel")]
pub mod otel;

pub use logging::LoggingBackend;
#[cfg(feature = "otel")]
pub use otel::OtelBackend;

/// Extra key/value pairs attached to a step span
pub type Attributes = BTreeMap<String, Value>;

/// How a step span ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanOutcome {
    /// The wrapped logic returned normally
    Completed,
    /// The wrapped logic returned an error
    Failed(String),
    /// The span was dropped without an outcome (panic or cancelled future)
    Abandoned,
}

impl SpanOutcome {
    /// Short status label used in log fields and span attributes
    pub fn status(&self) -> &'static str {
        match self {
            SpanOutcome::Completed => "ok",
            SpanOutcome::Failed(_) => "error",
            SpanOutcome::Abandoned => "abandoned",
        }
    }
}

/// Backend-specific state of an open span
pub trait SpanRecorder: Send {
    /// The `tracing` span the wrapped logic should run inside
    fn tracing_span(&self) -> tracing::Span {
        tracing::Span::none()
    }

    /// Make this span the parent of spans opened on the calling strand
    /// until the returned guard drops
    fn activate(&self) -> Option<ActiveSpan> {
        None
    }

    /// Record the end of the span
    fn close(self: Box<Self>, outcome: SpanOutcome);
}

/// Keeps a backend span active until dropped. Must be dropped on the
/// strand that created it.
#[must_use = "the span stops being active as soon as the guard is dropped"]
pub struct ActiveSpan {
    _guard: Box<dyn Any>,
}

impl ActiveSpan {
    /// Wrap a backend-specific activation guard
    pub fn new(guard: impl Any) -> Self {
        Self {
            _guard: Box::new(guard),
        }
    }
}

impl fmt::Debug for ActiveSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveSpan").finish_non_exhaustive()
    }
}

/// Interface that all tracing backends implement
#[cfg_attr(test, mockall::automock)]
pub trait TracingBackend: Send + Sync {
    /// Open a span for the duration of a step
    fn span(&self, step_name: &str, flow_name: &str, attributes: &Attributes) -> StepSpan;

    /// Return the current correlation ID, creating a flow context if needed
    fn correlation_id(&self) -> String {
        scope::get_or_create_context().correlation_id().to_string()
    }

    /// Backend name, for diagnostics
    fn name(&self) -> &'static str;
}

/// Scoped handle for an open step span.
///
/// Closing is guaranteed: [`StepSpan::complete`] and [`StepSpan::fail`]
/// close it with an outcome, and dropping it otherwise closes it as
/// [`SpanOutcome::Abandoned`].
#[must_use = "the span closes as soon as it is dropped"]
pub struct StepSpan {
    recorder: Option<Box<dyn SpanRecorder>>,
    outcome: SpanOutcome,
}

impl StepSpan {
    /// Wrap a backend recorder
    pub fn new(recorder: impl SpanRecorder + 'static) -> Self {
        Self {
            recorder: Some(Box::new(recorder)),
            outcome: SpanOutcome::Abandoned,
        }
    }

    /// A span that records nothing
    pub fn noop() -> Self {
        Self {
            recorder: None,
            outcome: SpanOutcome::Abandoned,
        }
    }

    /// The `tracing` span nested events should be attached to
    pub fn tracing_span(&self) -> tracing::Span {
        self.recorder
            .as_ref()
            .map(|recorder| recorder.tracing_span())
            .unwrap_or_else(tracing::Span::none)
    }

    /// Make the span active on the calling strand until the guard drops
    pub fn activate(&self) -> Option<ActiveSpan> {
        self.recorder.as_ref().and_then(|recorder| recorder.activate())
    }

    /// Run `f` with the span active and its `tracing` span entered
    pub fn in_scope<R>(&self, f: impl FnOnce() -> R) -> R {
        let _active = self.activate();
        self.tracing_span().in_scope(f)
    }

    /// Drive `future` with the span active on every poll.
    ///
    /// The span is handed back alongside the output so the caller can close
    /// it with an outcome.
    pub fn instrument<F: Future>(self, future: F) -> Instrumented<F> {
        let tracing_span = self.tracing_span();
        Instrumented {
            future: Box::pin(tracing::Instrument::instrument(future, tracing_span)),
            span: Some(self),
        }
    }

    /// Close the span as completed
    pub fn complete(mut self) {
        self.outcome = SpanOutcome::Completed;
    }

    /// Close the span as failed
    pub fn fail(mut self, error: impl fmt::Display) {
        self.outcome = SpanOutcome::Failed(error.to_string());
    }
}

impl Drop for StepSpan {
    fn drop(&mut self) {
        if let Some(recorder) = self.recorder.take() {
            let outcome = std::mem::replace(&mut self.outcome, SpanOutcome::Abandoned);
            recorder.close(outcome);
        }
    }
}

/// Future returned by [`StepSpan::instrument`]
pub struct Instrumented<F> {
    future: Pin<Box<tracing::instrument::Instrumented<F>>>,
    span: Option<StepSpan>,
}

impl<F: Future> Future for Instrumented<F> {
    type Output = (F::Output, StepSpan);

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let poll = {
            let _active = this.span.as_ref().and_then(StepSpan::activate);
            this.future.as_mut().poll(cx)
        };

        match poll {
            Poll::Ready(output) => match this.span.take() {
                Some(span) => Poll::Ready((output, span)),
                // Polled again after completion
                None => Poll::Pending,
            },
            Poll::Pending => Poll::Pending,
        }
    }
}

impl fmt::Debug for StepSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepSpan")
            .field("recording", &self.recorder.is_some())
            .field("outcome", &self.outcome)
            .finish()
    }
}
