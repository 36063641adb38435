// Shared helpers for the flowtrace integration tests.

use flowtrace_core::{Attributes, SpanOutcome, SpanRecorder, StepSpan, TracingBackend};
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;

/// One closed span as seen by [`RecordingBackend`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSpan {
    /// Step name
    pub step: String,
    /// Flow name
    pub flow: String,
    /// Correlation ID active when the span opened
    pub correlation_id: String,
    /// Attributes passed by the step
    pub attributes: Attributes,
    /// How the span ended
    pub outcome: SpanOutcome,
}

/// Backend that keeps every closed span in memory
#[derive(Debug, Clone, Default)]
pub struct RecordingBackend {
    spans: Arc<Mutex<Vec<RecordedSpan>>>,
}

impl RecordingBackend {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Closed spans, in closing order
    pub fn spans(&self) -> Vec<RecordedSpan> {
        self.spans.lock().clone()
    }

    /// Shareable handle for `StepBuilder::backend`
    pub fn shared(&self) -> Arc<dyn TracingBackend> {
        Arc::new(self.clone())
    }
}

struct Recording {
    span: RecordedSpan,
    sink: Arc<Mutex<Vec<RecordedSpan>>>,
}

impl SpanRecorder for Recording {
    fn close(self: Box<Self>, outcome: SpanOutcome) {
        let mut span = self.span;
        span.outcome = outcome;
        self.sink.lock().push(span);
    }
}

impl TracingBackend for RecordingBackend {
    fn span(&self, step_name: &str, flow_name: &str, attributes: &Attributes) -> StepSpan {
        StepSpan::new(Recording {
            span: RecordedSpan {
                step: step_name.to_string(),
                flow: flow_name.to_string(),
                correlation_id: self.correlation_id(),
                attributes: attributes.clone(),
                outcome: SpanOutcome::Abandoned,
            },
            sink: Arc::clone(&self.spans),
        })
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// In-memory writer for `tracing_subscriber::fmt`
#[derive(Debug, Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Captured output split into lines
    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock())
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Run `f` with a thread-local subscriber writing into this buffer
    pub fn capture<R>(&self, f: impl FnOnce() -> R) -> R {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .without_time()
            .map_event_format(flowtrace_monitoring::FlowIdFormat::new)
            .finish();

        tracing::subscriber::with_default(subscriber, f)
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
